//! Player Systems
//!
//! Stage 1 (input application), stage 2 (cooldown-gated actions) and
//! stage 5 (movement) of the simulation pipeline. All three follow the
//! collect-then-mutate pattern: entity lists are gathered from the stores
//! first, then mutated one at a time.

use crate::core::fixed::Fix64;
use crate::core::vec2::FixVec2;
use crate::ecs::entity::Entity;
use crate::ecs::world::World;
use crate::game::components::{
    layers, Barrel, Bullet, Collision, CollisionShape, Hp, Intent, PhysicsBody, Player, Stiff,
    Transform2D, Velocity, WallPlacement,
};
use crate::game::input::{FrameInputs, InputDirection};
use crate::game::step::SimConfig;
use crate::physics::shape::Shape;

/// Stage 1: translate this frame's directional inputs into intents.
///
/// Every player's intent is reset first; a player without an input this
/// frame simply stands still.
pub fn apply_inputs(world: &mut World, inputs: &FrameInputs) {
    let player_entities: Vec<(Entity, u32)> = world
        .players
        .iter()
        .map(|(e, p)| (e, p.id))
        .collect();

    for (e, _) in &player_entities {
        world.add(*e, Intent::default());
    }

    // BTreeMap iterates player ids in sorted order.
    for (&player_id, &dir) in inputs {
        let Some((entity, _)) = player_entities.iter().find(|(_, id)| *id == player_id) else {
            continue;
        };
        let e = *entity;
        let intent = Intent {
            move_dir: dir.move_vec(),
            fire: dir == InputDirection::Fire,
            place_wall: dir == InputDirection::PlaceWall,
            place_barrel: dir == InputDirection::PlaceBarrel,
        };
        world.add(e, intent);
        if dir.is_movement() {
            if let Some(player) = world.get_mut::<Player>(e) {
                player.facing = dir.move_vec();
            }
        }
    }
}

/// Stage 2: consume action intents, spawning bullets, wall ghosts and
/// barrels subject to the player's cooldown timers.
pub fn run_player_actions(world: &mut World, config: &SimConfig) {
    let entities: Vec<Entity> = world.players.entities();
    for e in entities {
        let Some(player) = world.get_mut::<Player>(e) else {
            continue;
        };
        player.shoot_cooldown = player.shoot_cooldown.saturating_sub(1);
        player.place_cooldown = player.place_cooldown.saturating_sub(1);
        let player = *player;

        let Some(intent) = world.get::<Intent>(e).copied() else {
            continue;
        };
        let Some(position) = world.get::<Transform2D>(e).map(|t| t.position) else {
            continue;
        };

        if intent.fire && player.shoot_cooldown == 0 {
            spawn_bullet(world, e, position, player.facing, config);
            world.get_mut::<Player>(e).expect("player present").shoot_cooldown =
                config.shoot_cooldown;
        }
        if intent.place_wall && player.place_cooldown == 0 {
            spawn_wall_ghost(world, position, player.facing, config);
            world.get_mut::<Player>(e).expect("player present").place_cooldown =
                config.place_cooldown;
        }
        if intent.place_barrel && player.place_cooldown == 0 {
            spawn_barrel(world, position, player.facing, config);
            world.get_mut::<Player>(e).expect("player present").place_cooldown =
                config.place_cooldown;
        }
    }
}

/// Stage 5: turn intents into velocities. Stiff entities cannot move.
pub fn apply_movement(world: &mut World) {
    let movers: Vec<Entity> = world.velocities.entities();
    for e in movers {
        if let Some(stiff) = world.get::<Stiff>(e) {
            if stiff.active() {
                world.get_mut::<Velocity>(e).expect("mover present").linear = FixVec2::ZERO;
                continue;
            }
        }
        let Some(player) = world.get::<Player>(e).copied() else {
            continue; // zombies set their velocity in their own system
        };
        if let Some(intent) = world.get::<Intent>(e).copied() {
            world.get_mut::<Velocity>(e).expect("mover present").linear =
                intent.move_dir.scale(player.move_speed);
        }
    }
}

fn spawn_bullet(
    world: &mut World,
    owner: Entity,
    from: FixVec2,
    facing: FixVec2,
    config: &SimConfig,
) {
    let dir = if facing == FixVec2::ZERO {
        FixVec2::UP
    } else {
        facing
    };
    let spawn_at = from + dir.scale(config.bullet_spawn_offset);
    let velocity = dir.scale(config.bullet_speed);

    let e = world.create_entity();
    world.add(e, Transform2D::at(spawn_at));
    world.add(e, Velocity { linear: velocity });
    world.add(e, PhysicsBody::trigger(layers::BULLET));
    world.add(e, CollisionShape::new(Shape::circle(config.bullet_radius)));
    world.add(e, Collision::default());
    world.add(
        e,
        Bullet {
            owner,
            velocity,
            damage: config.bullet_damage,
            lifetime: config.bullet_lifetime,
        },
    );
}

fn spawn_wall_ghost(world: &mut World, from: FixVec2, facing: FixVec2, config: &SimConfig) {
    let dir = if facing == FixVec2::ZERO {
        FixVec2::UP
    } else {
        facing
    };
    let at = from + dir.scale(config.wall_place_distance);

    let e = world.create_entity();
    world.add(e, Transform2D::at(at));
    world.add(e, Velocity::default());
    world.add(e, PhysicsBody::trigger(layers::TRIGGER));
    world.add(
        e,
        CollisionShape::new(Shape::rect(config.wall_size, config.wall_size)),
    );
    world.add(e, Collision::default());
    world.add(e, WallPlacement::default());
}

fn spawn_barrel(world: &mut World, from: FixVec2, facing: FixVec2, config: &SimConfig) {
    let dir = if facing == FixVec2::ZERO {
        FixVec2::UP
    } else {
        facing
    };
    let at = from + dir.scale(config.wall_place_distance);

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

// =============================================================================
// TESTS
// =============================================================================
