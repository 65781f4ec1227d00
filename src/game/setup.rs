//! Room Bootstrap
//!
//! Builds the initial world for a room from `(seed, ordered player ids)`.
//! Every client that receives the same GAME_START builds a bit-identical
//! world: all randomness flows through the world's seeded RNG, and every
//! spawn happens in a fixed order.

use crate::core::fixed::Fix64;
use crate::core::vec2::FixVec2;
use crate::ecs::world::World;
use crate::game::components::{
    layers, Barrel, Collision, CollisionShape, FlowField, GridMap, Hp, Intent, PhysicsBody,
    Player, Transform2D, Velocity, ZombieAi,
};
use crate::game::step::{SimConfig, Simulation};
use crate::physics::layers::LayerMatrix;
use crate::physics::shape::Shape;
use crate::spatial::aabb::Aabb2;

/// The layer pairs the game never collides, installed at boot on top of
/// any configured extras.
pub fn default_layers() -> LayerMatrix {
    let mut m = LayerMatrix::new();
    m.set_ignored(layers::BULLET, layers::BULLET);
    m.set_ignored(layers::TRIGGER, layers::TRIGGER);
    m.set_ignored(layers::BULLET, layers::TRIGGER);
    m
}

/// Build a playable room: arena border, obstacle grid, one pawn per
/// player id (spawn slots shuffled by the seed), and the seeded zombie
/// and barrel population.
pub fn bootstrap_room(config: SimConfig, seed: i64, player_ids: &[u32]) -> Simulation {
    let mut sim = Simulation::new(config, default_layers(), seed);
    let bounds = config.physics.world_bounds;

    spawn_arena(&mut sim.world, bounds);
    spawn_players(&mut sim.world, bounds, player_ids, &config);
    spawn_zombies(&mut sim.world, bounds, &config);
    spawn_barrels(&mut sim.world, bounds, &config);

    sim
}

/// Border walls plus the map entity (grid + flow field). Border cells are
/// marked as obstacles so pathfinding never routes through the walls.
fn spawn_arena(world: &mut World, bounds: Aabb2) {
    let cell = Fix64::ONE;
    let width = (bounds.max.x - bounds.min.x) / cell;
    let height = (bounds.max.y - bounds.min.y) / cell;
    let (w, h) = (width.floor_int() as i32, height.floor_int() as i32);

    let mut map = GridMap::new(w, h, cell, bounds.min);
    for x in 0..w {
        map.obstacles.insert((x, 0));
        map.obstacles.insert((x, h - 1));
    }
    for y in 0..h {
        map.obstacles.insert((0, y));
        map.obstacles.insert((w - 1, y));
    }
    let field = FlowField::new(w, h);

    let map_entity = world.create_entity();
    world.add(map_entity, map);
    world.add(map_entity, field);

    // Four border slabs.
    let size = bounds.max - bounds.min;
    let slabs = [
        // bottom, top
        (
            FixVec2::new(bounds.center().x, bounds.min.y + Fix64::HALF),
            size.x,
            Fix64::ONE,
        ),
        (
            FixVec2::new(bounds.center().x, bounds.max.y - Fix64::HALF),
            size.x,
            Fix64::ONE,
        ),
        // left, right
        (
            FixVec2::new(bounds.min.x + Fix64::HALF, bounds.center().y),
            Fix64::ONE,
            size.y,
        ),
        (
            FixVec2::new(bounds.max.x - Fix64::HALF, bounds.center().y),
            Fix64::ONE,
            size.y,
        ),
    ];
    for (at, slab_w, slab_h) in slabs {
        let e = world.create_entity();
        world.add(e, Transform2D::at(at));
        world.add(e, PhysicsBody::fixed(layers::WALL));
        world.add(e, CollisionShape::new(Shape::rect(slab_w, slab_h)));
        world.add(e, Collision::default());
    }
}

/// One pawn per player, placed on a shuffled ring of spawn slots.
fn spawn_players(world: &mut World, bounds: Aabb2, player_ids: &[u32], config: &SimConfig) {
    let center = bounds.center();
    let half = bounds.half_extents();
    let offset = FixVec2::new(half.x * Fix64::HALF, half.y * Fix64::HALF);

    let mut slots = [
        center + FixVec2::new(-offset.x, -offset.y),
        center + FixVec2::new(offset.x, -offset.y),
        center + FixVec2::new(-offset.x, offset.y),
        center + FixVec2::new(offset.x, offset.y),
        center + FixVec2::new(-offset.x, Fix64::ZERO),
        center + FixVec2::new(offset.x, Fix64::ZERO),
        center + FixVec2::new(Fix64::ZERO, -offset.y),
        center + FixVec2::new(Fix64::ZERO, offset.y),
    ];
    world.rng.shuffle(&mut slots);

    for (i, &pid) in player_ids.iter().enumerate() {
        let at = slots[i % slots.len()];
        let e = world.create_entity();
        world.add(e, Transform2D::at(at));
        world.add(e, Velocity::default());
        world.add(e, Player::new(pid, config.player_move_speed));
        world.add(e, Intent::default());
        let mut body = PhysicsBody::dynamic(Fix64::ONE, layers::PLAYER);
        body.restitution = Fix64::ZERO;
        body.friction = Fix64::from_ratio(1, 2);
        world.add(e, body);
        world.add(
            e,
            CollisionShape::new(Shape::circle(config.player_radius)),
        );
        world.add(e, Collision::default());
        world.add(e, Hp::full(config.player_hp));
    }
}

fn spawn_zombies(world: &mut World, bounds: Aabb2, config: &SimConfig) {
    // Keep spawns off the border walls.
    let inner = bounds.scaled(Fix64::from_ratio(3, 4));
    for _ in 0..config.zombie_count {
        let at = world.rng.next_in_rect(inner);
        let e = world.create_entity();
        world.add(e, Transform2D::at(at));
        world.add(e, Velocity::default());
        world.add(
            e,
            ZombieAi::new(
                config.zombie_attack_range,
                config.zombie_attack_damage,
                config.zombie_move_speed,
            ),
        );
        let mut body = PhysicsBody::dynamic(Fix64::ONE, layers::ZOMBIE);
        body.friction = Fix64::from_ratio(1, 2);
        world.add(e, body);
        world.add(
            e,
            CollisionShape::new(Shape::circle(config.player_radius)),
        );
        world.add(e, Collision::default());
        world.add(e, Hp::full(config.zombie_hp));
    }
}

fn spawn_barrels(world: &mut World, bounds: Aabb2, config: &SimConfig) {
    let inner = bounds.scaled(Fix64::from_ratio(3, 4));
    for _ in 0..config.barrel_count {
        let at = world.rng.next_in_rect(inner);
        let e = world.create_entity();
        world.add(e, Transform2D::at(at));
        world.add(e, Velocity::default());
        let mut body = PhysicsBody::dynamic(Fix64::ONE, layers::BARREL);
        body.damping = Fix64::from_ratio(1, 4);
        world.add(e, body);
        world.add(
            e,
            CollisionShape::new(Shape::circle(config.barrel_radius)),
        );
        world.add(e, Collision::default());
        world.add(e, Hp::full(config.barrel_hp));
        world.add(e, Barrel);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_determinism() {
        let a = bootstrap_room(SimConfig::default(), 424242, &[1, 2, 3]);
        let b = bootstrap_room(SimConfig::default(), 424242, &[1, 2, 3]);
        assert_eq!(a.world, b.world);
        assert_eq!(a.world.digest(), b.world.digest());
    }

    #[test]
    fn test_bootstrap_seed_changes_layout() {
        let a = bootstrap_room(SimConfig::default(), 1, &[1, 2]);
        let b = bootstrap_room(SimConfig::default(), 2, &[1, 2]);
        assert_ne!(a.world.digest(), b.world.digest());
    }

    #[test]
    fn test_bootstrap_population() {
        let config = SimConfig::default();
        let sim = bootstrap_room(config, 5, &[10, 20]);
        assert_eq!(sim.world.players.len(), 2);
        assert_eq!(sim.world.zombies.len(), config.zombie_count as usize);
        assert_eq!(sim.world.barrels.len(), config.barrel_count as usize);
        assert_eq!(sim.world.grid_maps.len(), 1);
        assert_eq!(sim.world.flow_fields.len(), 1);
        // Border slabs
        assert!(sim.world.bodies.iter().filter(|(_, b)| b.is_static).count() >= 4);

        // Player ids preserved in order of the id list
        let ids: Vec<u32> = sim.world.players.iter().map(|(_, p)| p.id).collect();
        assert_eq!(ids, vec![10, 20]);
    }

    #[test]
    fn test_player_order_affects_spawns_not_count() {
        // The ordered id list is part of the seed contract: a different
        // order is a different room.
        let a = bootstrap_room(SimConfig::default(), 9, &[1, 2]);
        let b = bootstrap_room(SimConfig::default(), 9, &[2, 1]);
        assert_ne!(a.world.digest(), b.world.digest());
        assert_eq!(a.world.players.len(), b.world.players.len());
    }
}
