//! Pathfinding
//!
//! Flow-field generation (multi-source BFS over the obstacle grid,
//! rebuilt on a cooldown) and the A* fallback used when a zombie stands
//! on a cell the field does not cover. Both are fully deterministic:
//! neighbor order is fixed, seeds are sorted, and the A* open list breaks
//! ties on (f, x, y).

use std::collections::{BTreeMap, VecDeque};

use crate::core::fixed::Fix64;
use crate::core::vec2::FixVec2;
use crate::ecs::entity::Entity;
use crate::ecs::world::World;
use crate::game::components::{FlowField, GridCell, GridMap, Player, Transform2D};

/// Neighbor offsets, fixed order: right, left, up, down.
const NEIGHBORS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Stage 4: tick flow-field cooldowns and rebuild expired fields toward
/// the current player cells.
pub fn update_pathing(world: &mut World, rebuild_interval: u32) {
    // Target cells: every living player's cell, sorted for determinism.
    let map_entities: Vec<Entity> = world.grid_maps.entities();
    for map_entity in map_entities {
        let Some(field) = world.get::<FlowField>(map_entity) else {
            continue;
        };
        if field.cooldown > 0 {
            world
                .get_mut::<FlowField>(map_entity)
                .expect("field checked above")
                .cooldown -= 1;
            continue;
        }

        let map = world
            .get::<GridMap>(map_entity)
            .expect("map entity has a grid")
            .clone();
        let mut targets: Vec<GridCell> = world
            .iter2::<Player, Transform2D>()
            .iter()
            .map(|(_, _, t)| map.cell_of(t.position))
            .filter(|c| map.in_bounds(*c))
            .collect();
        targets.sort_unstable();
        targets.dedup();

        let field = world
            .get_mut::<FlowField>(map_entity)
            .expect("field checked above");
        rebuild_flow_field(&map, field, &targets);
        field.cooldown = rebuild_interval;
    }
}

/// Multi-source BFS from the target cells; each reachable cell's gradient
/// points at its BFS parent (one step closer to the nearest target).
/// Target cells and unreachable cells get a zero gradient.
pub fn rebuild_flow_field(map: &GridMap, field: &mut FlowField, targets: &[GridCell]) {
    let w = map.width;
    let h = map.height;
    field.width = w;
    field.height = h;
    field.gradient = vec![FixVec2::ZERO; (w * h) as usize];
    if targets.is_empty() {
        return;
    }

    let idx = |c: GridCell| (c.1 * w + c.0) as usize;
    let mut dist: Vec<u32> = vec![u32::MAX; (w * h) as usize];
    let mut queue: VecDeque<GridCell> = VecDeque::new();

    for &t in targets {
        if map.in_bounds(t) && !map.is_blocked(t) {
            dist[idx(t)] = 0;
            queue.push_back(t);
        }
    }

    while let Some(cell) = queue.pop_front() {
        let d = dist[idx(cell)];
        for (dx, dy) in NEIGHBORS {
            let next = (cell.0 + dx, cell.1 + dy);
            if map.is_blocked(next) || dist[idx(next)] != u32::MAX {
                continue;
            }
            dist[idx(next)] = d + 1;
            // Gradient points back toward the cell we came from.
            field.set(
                next,
                FixVec2::new(Fix64::from_int(-dx), Fix64::from_int(-dy)),
            );
            queue.push_back(next);
        }
    }
}

/// A* over the obstacle grid with an insertion-ordered open list.
///
/// The expanded node is the open entry minimizing `(f, x, y)`; neighbor
/// order is fixed. Returns the cell path from `start` to `goal`
/// inclusive, or None when unreachable.
pub fn astar(map: &GridMap, start: GridCell, goal: GridCell) -> Option<Vec<GridCell>> {
    if map.is_blocked(start) || map.is_blocked(goal) {
        return None;
    }
    if start == goal {
        return Some(vec![start]);
    }

    let heuristic = |c: GridCell| ((c.0 - goal.0).abs() + (c.1 - goal.1).abs()) as u32;

    // Open list keeps insertion order; selection scans for the minimum
    // (f, x, y). Grids are small, so the linear scan beats fighting an
    // unstable binary heap for determinism.
    let mut open: Vec<GridCell> = vec![start];
    let mut g: BTreeMap<GridCell, u32> = BTreeMap::new();
    let mut came_from: BTreeMap<GridCell, GridCell> = BTreeMap::new();
    g.insert(start, 0);

    while !open.is_empty() {
        let mut best = 0;
        let mut best_key = (u32::MAX, i32::MAX, i32::MAX);
        for (i, cell) in open.iter().enumerate() {
            let f = g[cell] + heuristic(*cell);
            let key = (f, cell.0, cell.1);
            if key < best_key {
                best_key = key;
                best = i;
            }
        }
        let current = open.remove(best);
        if current == goal {
            let mut path = vec![goal];
            let mut cursor = goal;
            while let Some(&prev) = came_from.get(&cursor) {
                path.push(prev);
                cursor = prev;
            }
            path.reverse();
            return Some(path);
        }

        let current_g = g[&current];
        for (dx, dy) in NEIGHBORS {
            let next = (current.0 + dx, current.1 + dy);
            if map.is_blocked(next) {
                continue;
            }
            let tentative = current_g + 1;
            if tentative < g.get(&next).copied().unwrap_or(u32::MAX) {
                g.insert(next, tentative);
                came_from.insert(next, current);
                if !open.contains(&next) {
                    open.push(next);
                }
            }
        }
    }
    None
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn open_map(w: i32, h: i32) -> GridMap {
        GridMap::new(w, h, Fix64::ONE, FixVec2::ZERO)
    }

    #[test]
    fn test_flow_field_points_toward_target() {
        let map = open_map(5, 5);
        let mut field = FlowField::new(5, 5);
        rebuild_flow_field(&map, &mut field, &[(2, 2)]);

        // Target cell has no gradient
        assert_eq!(field.at((2, 2)), FixVec2::ZERO);
        // Cell right of the target points left
        assert_eq!(field.at((3, 2)), FixVec2::LEFT);
        assert_eq!(field.at((1, 2)), FixVec2::RIGHT);
        assert_eq!(field.at((2, 3)), FixVec2::DOWN);
        assert_eq!(field.at((2, 1)), FixVec2::UP);
    }

    #[test]
    fn test_flow_field_routes_around_walls() {
        let mut map = open_map(5, 3);
        // Vertical wall at x=2 with no gaps in rows 0..2
        map.obstacles.insert((2, 0));
        map.obstacles.insert((2, 1));
        let mut field = FlowField::new(5, 3);
        rebuild_flow_field(&map, &mut field, &[(0, 0)]);

        // Right of the wall, the path detours through the open row 2
        assert_ne!(field.at((3, 0)), FixVec2::ZERO);
        assert_eq!(field.at((3, 0)), FixVec2::UP);
        // Blocked cells carry no gradient
        assert_eq!(field.at((2, 0)), FixVec2::ZERO);
    }

    #[test]
    fn test_flow_field_unreachable_is_zero() {
        let mut map = open_map(5, 1);
        map.obstacles.insert((2, 0));
        let mut field = FlowField::new(5, 1);
        rebuild_flow_field(&map, &mut field, &[(0, 0)]);
        // Cells beyond the wall are unreachable
        assert_eq!(field.at((3, 0)), FixVec2::ZERO);
        assert_eq!(field.at((4, 0)), FixVec2::ZERO);
        assert_eq!(field.at((1, 0)), FixVec2::RIGHT);
    }

    #[test]
    fn test_astar_straight_line() {
        let map = open_map(5, 5);
        let path = astar(&map, (0, 0), (3, 0)).unwrap();
        assert_eq!(path, vec![(0, 0), (1, 0), (2, 0), (3, 0)]);
    }

    #[test]
    fn test_astar_detours() {
        let mut map = open_map(5, 5);
        for y in 0..4 {
            map.obstacles.insert((2, y));
        }
        let path = astar(&map, (0, 0), (4, 0)).unwrap();
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(4, 0)));
        // Detour goes through the open row y=4
        assert!(path.contains(&(2, 4)));
        assert!(path.iter().all(|c| !map.is_blocked(*c)));
    }

    #[test]
    fn test_astar_unreachable() {
        let mut map = open_map(5, 5);
        for y in 0..5 {
            map.obstacles.insert((2, y));
        }
        assert!(astar(&map, (0, 0), (4, 0)).is_none());
    }

    #[test]
    fn test_astar_trivial_and_blocked() {
        let map = open_map(3, 3);
        assert_eq!(astar(&map, (1, 1), (1, 1)), Some(vec![(1, 1)]));
        let mut blocked = open_map(3, 3);
        blocked.obstacles.insert((0, 0));
        assert!(astar(&blocked, (0, 0), (2, 2)).is_none());
    }

    #[test]
    fn test_astar_deterministic() {
        let mut map = open_map(12, 12);
        for i in 0..10 {
            map.obstacles.insert((i, 5));
        }
        let a = astar(&map, (0, 0), (11, 11));
        let b = astar(&map, (0, 0), (11, 11));
        assert_eq!(a, b);
    }
}
