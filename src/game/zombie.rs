//! Zombie AI
//!
//! Stage 3: the Chase → AttackWindup → Attack → AttackCooldown state
//! machine. Chasing zombies steer by the flow field when it covers their
//! cell, fall back to an A* path when it does not, and seek straight at
//! the target as a last resort. Attack hitboxes exist only while the
//! state is Attack.

use crate::core::fixed::Fix64;
use crate::core::vec2::FixVec2;
use crate::ecs::entity::Entity;
use crate::ecs::world::World;
use crate::game::components::{
    layers, AttackHitbox, Collision, CollisionShape, FlowField, GridMap, PhysicsBody, Player,
    Transform2D, Velocity, ZombieAi, ZombieState,
};
use crate::game::pathing::astar;
use crate::game::step::SimConfig;
use crate::physics::shape::Shape;

/// Stage 3: advance every zombie's state machine.
pub fn run_zombie_ai(world: &mut World, config: &SimConfig) {
    // The map singleton, if any, drives field/path steering.
    let map_entity = world.grid_maps.entities().first().copied();

    let zombie_entities: Vec<Entity> = world.zombies.entities();
    for e in zombie_entities {
        let Some(position) = world.get::<Transform2D>(e).map(|t| t.position) else {
            continue;
        };

        let target = nearest_player(world, position);
        let Some(ai) = world.get_mut::<ZombieAi>(e) else {
            continue;
        };
        ai.target = target.map(|(t, _)| t).unwrap_or(Entity::NULL);

        let state = ai.state;
        match state {
            ZombieState::Chase => chase(world, e, position, target, map_entity),
            ZombieState::AttackWindup => {
                stand_still(world, e);
                let ai = world.get_mut::<ZombieAi>(e).expect("zombie present");
                ai.state_timer = ai.state_timer.saturating_sub(1);
                if ai.state_timer == 0 {
                    ai.state = ZombieState::Attack;
                    ai.state_timer = ai.attack_ticks;
                    let (damage, stiff, range, ticks) = (
                        ai.attack_damage,
                        config.zombie_stiff_ticks,
                        ai.attack_range,
                        ai.attack_ticks,
                    );
                    spawn_attack_hitbox(world, e, position, range, damage, stiff, ticks);
                }
            }
            ZombieState::Attack => {
                stand_still(world, e);
                let ai = world.get_mut::<ZombieAi>(e).expect("zombie present");
                ai.state_timer = ai.state_timer.saturating_sub(1);
                if ai.state_timer == 0 {
                    ai.state = ZombieState::AttackCooldown;
                    ai.state_timer = ai.cooldown_ticks;
                }
            }
            ZombieState::AttackCooldown => {
                stand_still(world, e);
                let ai = world.get_mut::<ZombieAi>(e).expect("zombie present");
                ai.state_timer = ai.state_timer.saturating_sub(1);
                if ai.state_timer == 0 {
                    ai.state = ZombieState::Chase;
                }
            }
        }
    }
}

/// Nearest living player by squared distance, ties broken toward the
/// lower entity id (stores iterate in storage order, so the first hit at
/// a given distance is the lowest id seen).
fn nearest_player(world: &World, from: FixVec2) -> Option<(Entity, FixVec2)> {
    let mut best: Option<(Entity, FixVec2, Fix64)> = None;
    for (e, _, t) in world.iter2::<Player, Transform2D>() {
        let d = from.distance_squared(t.position);
        let better = match &best {
            None => true,
            Some((be, _, bd)) => d < *bd || (d == *bd && e.id() < be.id()),
        };
        if better {
            best = Some((e, t.position, d));
        }
    }
    best.map(|(e, p, _)| (e, p))
}

fn stand_still(world: &mut World, e: Entity) {
    if let Some(v) = world.get_mut::<Velocity>(e) {
        v.linear = FixVec2::ZERO;
    }
}

fn chase(
    world: &mut World,
    e: Entity,
    position: FixVec2,
    target: Option<(Entity, FixVec2)>,
    map_entity: Option<Entity>,
) {
    let Some((_, target_pos)) = target else {
        stand_still(world, e);
        return;
    };

    let ai = world.get::<ZombieAi>(e).expect("zombie present").clone();

    // In range: start winding up.
    if position.distance_squared(target_pos) <= ai.attack_range * ai.attack_range {
        stand_still(world, e);
        let ai = world.get_mut::<ZombieAi>(e).expect("zombie present");
        ai.state = ZombieState::AttackWindup;
        ai.state_timer = ai.windup_ticks;
        ai.path.clear();
        return;
    }

    let dir = steer_direction(world, e, position, target_pos, map_entity);
    let speed = ai.move_speed;
    if let Some(v) = world.get_mut::<Velocity>(e) {
        v.linear = dir.scale(speed);
    }
}

/// Pick a movement direction: flow field first, A* path second, straight
/// seek last.
fn steer_direction(
    world: &mut World,
    e: Entity,
    position: FixVec2,
    target_pos: FixVec2,
    map_entity: Option<Entity>,
) -> FixVec2 {
    let direct = (target_pos - position).normalize();
    let Some(map_entity) = map_entity else {
        return direct;
    };
    let Some(map) = world.get::<GridMap>(map_entity).cloned() else {
        return direct;
    };
    let cell = map.cell_of(position);

    if let Some(field) = world.get::<FlowField>(map_entity) {
        let grad = field.at(cell);
        if grad != FixVec2::ZERO {
            // Field covers this cell; drop any stale fallback path.
            if let Some(ai) = world.get_mut::<ZombieAi>(e) {
                ai.path.clear();
            }
            return grad;
        }
    }

    // Field has no gradient here (stale, or a pocket it never reached):
    // follow an A* path toward the target's cell.
    let goal = map.cell_of(target_pos);
    let ai = world.get_mut::<ZombieAi>(e).expect("zombie present");

    // Drop consumed path cells.
    while let Some(head) = ai.path.first().copied() {
        let head_center = map.center_of(head);
        let reach = map.cell_size * Fix64::HALF;
        if position.distance_squared(head_center) <= reach * reach {
            ai.path.remove(0);
        } else {
            break;
        }
    }

    let path_valid = ai.path.last() == Some(&goal) && !ai.path.is_empty();
    if !path_valid {
        ai.path = astar(&map, cell, goal).unwrap_or_default();
        // The first path cell is the zombie's own cell.
        if ai.path.first() == Some(&cell) {
            ai.path.remove(0);
        }
    }

    match ai.path.first().copied() {
        Some(next) => (map.center_of(next) - position).normalize(),
        None => direct,
    }
}

fn spawn_attack_hitbox(
    world: &mut World,
    owner: Entity,
    position: FixVec2,
    range: Fix64,
    damage: i32,
    stiff_ticks: u32,
    lifetime: u32,
) {
    // The hitbox sits on the zombie and covers its attack reach.
    let e = world.create_entity();
    world.add(e, Transform2D::at(position));
    world.add(e, Velocity::default());
    world.add(e, PhysicsBody::trigger(layers::TRIGGER));
    world.add(e, CollisionShape::new(Shape::circle(range)));
    world.add(e, Collision::default());
    world.add(
        e,
        AttackHitbox {
            owner,
            damage,
            stiff_ticks,
            timer: lifetime,
        },
    );
}

// =============================================================================
// TESTS
// =============================================================================
