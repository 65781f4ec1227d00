//! Collision Effects, Timers and Deaths
//!
//! Stages 7 through 11 of the pipeline: react to the collision records
//! physics produced (bullet damage, hitbox damage + stun, wall-ghost
//! solidification), advance explosion fuses and detonate via a
//! broad-phase range query, tick stun timers, run the type-specific death
//! effects, and clear the per-tick collision records.
//!
//! Every pass collects the affected entities first and mutates after, in
//! store order.

use crate::core::vec2::FixVec2;
use crate::ecs::entity::Entity;
use crate::ecs::world::World;
use crate::game::components::{
    layers, AttackHitbox, Barrel, Bullet, Collision, CollisionShape, Death, Explosion, Hp,
    PhysicsBody, Stiff, Transform2D, Wall, WallPlacement,
};
use crate::game::step::SimConfig;
use crate::physics::shape::Shape;
use crate::spatial::quadtree::Quadtree;

/// Stage 7: interpret this tick's collision records.
pub fn apply_collision_effects(world: &mut World, config: &SimConfig) {
    bullet_hits(world);
    hitbox_hits(world);
    solidify_wall_ghosts(world, config);
}

/// Bullets: damage the first thing they touch (never their owner) and
/// die on impact. Lifetime runs down regardless of contact.
fn bullet_hits(world: &mut World) {
    let bullet_entities: Vec<Entity> = world.bullets.entities();
    for e in bullet_entities {
        let Some(bullet) = world.get::<Bullet>(e).copied() else {
            continue;
        };

        let mut expired = false;
        {
            let b = world.get_mut::<Bullet>(e).expect("bullet present");
            b.lifetime = b.lifetime.saturating_sub(1);
            if b.lifetime == 0 {
                expired = true;
            }
        }

        let contacts: Vec<Entity> = world
            .get::<Collision>(e)
            .map(|c| c.iter().collect())
            .unwrap_or_default();
        let mut hit_something = false;
        for other in contacts {
            if other == bullet.owner || world.has::<Bullet>(other) {
                continue;
            }
            hit_something = true;
            if let Some(hp) = world.get_mut::<Hp>(other) {
                hp.damage(bullet.damage);
                if hp.is_dead() {
                    world.add(other, Death);
                }
            }
        }

        if hit_something || expired {
            world.add(e, Death);
        }
    }
}

/// Melee hitboxes: damage and stun every contacted player once, then die.
/// Untouched hitboxes die when their timer runs out.
fn hitbox_hits(world: &mut World) {
    let hitbox_entities: Vec<Entity> = world.attack_hitboxes.entities();
    for e in hitbox_entities {
        let Some(hitbox) = world.get::<AttackHitbox>(e).copied() else {
            continue;
        };
        let contacts: Vec<Entity> = world
            .get::<Collision>(e)
            .map(|c| c.iter().collect())
            .unwrap_or_default();

        let mut connected = false;
        for other in contacts {
            if other == hitbox.owner {
                continue;
            }
            if !world.has::<crate::game::components::Player>(other) {
                continue;
            }
            connected = true;
            if let Some(hp) = world.get_mut::<Hp>(other) {
                hp.damage(hitbox.damage);
                if hp.is_dead() {
                    world.add(other, Death);
                }
            }
            world.add(other, Stiff::for_ticks(hitbox.stiff_ticks));
        }

        let timer_done = {
            let h = world.get_mut::<AttackHitbox>(e).expect("hitbox present");
            h.timer = h.timer.saturating_sub(1);
            h.timer == 0
        };
        if connected || timer_done {
            world.add(e, Death);
        }
    }
}

/// Wall ghosts solidify at the end of a tick in which nothing overlapped
/// them; a blocked ghost stays pending.
fn solidify_wall_ghosts(world: &mut World, config: &SimConfig) {
    let ghosts: Vec<Entity> = world.wall_placements.entities();
    for e in ghosts {
        let placement = world.get::<WallPlacement>(e).copied().unwrap_or_default();
        if placement.armed {
            continue;
        }
        let clear = world
            .get::<Collision>(e)
            .map(|c| c.is_empty())
            .unwrap_or(true);
        if !clear {
            continue;
        }
        // Flip: trigger ghost becomes a solid wall body.
        world.get_mut::<WallPlacement>(e).expect("ghost present").armed = true;
        world.add(e, Wall);
        world.add(e, PhysicsBody::fixed(layers::WALL));
        world.add(
            e,
            CollisionShape::new(Shape::rect(config.wall_size, config.wall_size)),
        );
        world.add(e, Hp::full(config.wall_hp));
    }
}

/// Stage 8: advance explosion fuses; a fuse that expires queues damage to
/// everything with hit points inside the blast radius (found through the
/// broad phase), then the explosion entity dies.
pub fn update_explosions(world: &mut World, quadtree: &Quadtree) {
    let explosion_entities: Vec<Entity> = world.explosions.entities();
    for e in explosion_entities {
        let Some(explosion) = world.get::<Explosion>(e).copied() else {
            continue;
        };
        let Some(center) = world.get::<Transform2D>(e).map(|t| t.position) else {
            continue;
        };

        let detonate = {
            let x = world.get_mut::<Explosion>(e).expect("explosion present");
            x.timer += 1;
            x.timer >= x.lifetime
        };
        if !detonate {
            continue;
        }

        let blast = crate::spatial::aabb::Aabb2::from_center(
            center,
            FixVec2::new(explosion.radius, explosion.radius),
        );
        let radius_sq = explosion.radius * explosion.radius;
        for id in quadtree.query(blast, u32::MAX) {
            let other = Entity(id);
            if other == e {
                continue;
            }
            let Some(pos) = world.get::<Transform2D>(other).map(|t| t.position) else {
                continue;
            };
            if center.distance_squared(pos) > radius_sq {
                continue;
            }
            if let Some(hp) = world.get_mut::<Hp>(other) {
                hp.damage(explosion.damage);
                if hp.is_dead() {
                    world.add(other, Death);
                }
            }
        }
        world.add(e, Death);
    }
}

/// Stage 9: tick down stun timers.
pub fn update_stiff_timers(world: &mut World) {
    for (_, stiff) in world.stiffs.iter_mut() {
        stiff.timer = stiff.timer.saturating_sub(1);
    }
}

/// Stage 10: run the type-specific death effect for every entity with a
/// Death tag, then destroy the entity (removing all its components).
pub fn run_deaths(world: &mut World, config: &SimConfig) {
    let dead: Vec<Entity> = world.deaths.entities();
    for e in dead {
        if world.has::<Barrel>(e) {
            // Barrels go out with a bang.
            let at = world
                .get::<Transform2D>(e)
                .map(|t| t.position)
                .unwrap_or(FixVec2::ZERO);
            spawn_explosion(world, at, config);
        }
        world.destroy(e);
    }
}

/// Stage 11: reset every per-tick collision record.
pub fn clear_collisions(world: &mut World) {
    for (_, c) in world.collisions.iter_mut() {
        c.clear();
    }
}

fn spawn_explosion(world: &mut World, at: FixVec2, config: &SimConfig) {
    let e = world.create_entity();
    world.add(e, Transform2D::at(at));
    world.add(
        e,
        Explosion {
            radius: config.explosion_radius,
            damage: config.explosion_damage,
            timer: 0,
            lifetime: config.explosion_fuse,
        },
    );
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::Fix64;
    use crate::game::components::Player;
    use crate::spatial::aabb::Aabb2;

    fn config() -> SimConfig {
        SimConfig::default()
    }

    fn empty_quadtree() -> Quadtree {
        Quadtree::new(Aabb2::from_ints(-64, -64, 64, 64), 8, 6)
    }

    fn spawn_victim(world: &mut World, pos: FixVec2, hp: i32) -> Entity {
        let e = world.create_entity();
        world.add(e, Transform2D::at(pos));
        world.add(e, Hp::full(hp));
        world.add(e, Collision::default());
        e
    }

    fn spawn_test_bullet(world: &mut World, owner: Entity, damage: i32) -> Entity {
        let e = world.create_entity();
        world.add(e, Transform2D::default());
        world.add(e, Collision::default());
        world.add(
            e,
            Bullet {
                owner,
                velocity: FixVec2::ZERO,
                damage,
                lifetime: 100,
            },
        );
        e
    }

    #[test]
    fn test_bullet_damages_and_dies() {
        let mut world = World::new(1);
        let owner = world.create_entity();
        let victim = spawn_victim(&mut world, FixVec2::ZERO, 10);
        let bullet = spawn_test_bullet(&mut world, owner, 4);
        world.get_mut::<Collision>(bullet).unwrap().push(victim);

        apply_collision_effects(&mut world, &config());

        assert_eq!(world.get::<Hp>(victim).unwrap().current, 6);
        assert!(world.has::<Death>(bullet));
        assert!(!world.has::<Death>(victim));
    }

    #[test]
    fn test_bullet_ignores_owner() {
        let mut world = World::new(1);
        let owner = spawn_victim(&mut world, FixVec2::ZERO, 10);
        let bullet = spawn_test_bullet(&mut world, owner, 4);
        world.get_mut::<Collision>(bullet).unwrap().push(owner);

        apply_collision_effects(&mut world, &config());

        assert_eq!(world.get::<Hp>(owner).unwrap().current, 10);
        assert!(!world.has::<Death>(bullet));
    }

    #[test]
    fn test_bullet_kill_marks_death() {
        let mut world = World::new(1);
        let owner = world.create_entity();
        let victim = spawn_victim(&mut world, FixVec2::ZERO, 3);
        let bullet = spawn_test_bullet(&mut world, owner, 5);
        world.get_mut::<Collision>(bullet).unwrap().push(victim);

        apply_collision_effects(&mut world, &config());
        assert!(world.has::<Death>(victim));
    }

    #[test]
    fn test_bullet_lifetime_expiry() {
        let mut world = World::new(1);
        let owner = world.create_entity();
        let bullet = spawn_test_bullet(&mut world, owner, 1);
        world.get_mut::<Bullet>(bullet).unwrap().lifetime = 1;

        apply_collision_effects(&mut world, &config());
        assert!(world.has::<Death>(bullet));
    }

    #[test]
    fn test_hitbox_damages_and_stuns_players() {
        let mut world = World::new(1);
        let zombie = world.create_entity();
        let player = spawn_victim(&mut world, FixVec2::ZERO, 20);
        world.add(player, Player::new(1, Fix64::ONE));

        let hb = world.create_entity();
        world.add(hb, Collision::default());
        world.add(
            hb,
            AttackHitbox {
                owner: zombie,
                damage: 6,
                stiff_ticks: 12,
                timer: 4,
            },
        );
        world.get_mut::<Collision>(hb).unwrap().push(player);

        apply_collision_effects(&mut world, &config());

        assert_eq!(world.get::<Hp>(player).unwrap().current, 14);
        assert!(world.get::<Stiff>(player).unwrap().active());
        assert_eq!(world.get::<Stiff>(player).unwrap().timer, 12);
        assert!(world.has::<Death>(hb));
    }

    #[test]
    fn test_hitbox_ignores_non_players() {
        let mut world = World::new(1);
        let zombie = world.create_entity();
        let barrel = spawn_victim(&mut world, FixVec2::ZERO, 20);

        let hb = world.create_entity();
        world.add(hb, Collision::default());
        world.add(
            hb,
            AttackHitbox {
                owner: zombie,
                damage: 6,
                stiff_ticks: 12,
                timer: 4,
            },
        );
        world.get_mut::<Collision>(hb).unwrap().push(barrel);

        apply_collision_effects(&mut world, &config());
        assert_eq!(world.get::<Hp>(barrel).unwrap().current, 20);
        assert!(!world.has::<Death>(hb));
    }

    #[test]
    fn test_wall_ghost_solidifies_when_clear() {
        let cfg = config();
        let mut world = World::new(1);
        let ghost = world.create_entity();
        world.add(ghost, Transform2D::default());
        world.add(ghost, Collision::default());
        world.add(ghost, PhysicsBody::trigger(layers::TRIGGER));
        world.add(ghost, WallPlacement::default());

        apply_collision_effects(&mut world, &cfg);

        assert!(world.get::<WallPlacement>(ghost).unwrap().armed);
        assert!(world.has::<Wall>(ghost));
        let body = world.get::<PhysicsBody>(ghost).unwrap();
        assert!(body.is_static && !body.is_trigger);
        assert_eq!(world.get::<Hp>(ghost).unwrap().max, cfg.wall_hp);
    }

    #[test]
    fn test_wall_ghost_blocked_stays_pending() {
        let cfg = config();
        let mut world = World::new(1);
        let blocker = world.create_entity();
        let ghost = world.create_entity();
        world.add(ghost, Transform2D::default());
        world.add(ghost, Collision::default());
        world.add(ghost, PhysicsBody::trigger(layers::TRIGGER));
        world.add(ghost, WallPlacement::default());
        world.get_mut::<Collision>(ghost).unwrap().push(blocker);

        apply_collision_effects(&mut world, &cfg);

        assert!(!world.get::<WallPlacement>(ghost).unwrap().armed);
        assert!(!world.has::<Wall>(ghost));
    }

    #[test]
    fn test_explosion_fuse_and_radius_damage() {
        let mut world = World::new(1);
        let near = spawn_victim(&mut world, FixVec2::from_ints(1, 0), 30);
        let far = spawn_victim(&mut world, FixVec2::from_ints(50, 0), 30);

        let x = world.create_entity();
        world.add(x, Transform2D::default());
        world.add(
            x,
            Explosion {
                radius: Fix64::from_int(3),
                damage: 12,
                timer: 0,
                lifetime: 2,
            },
        );

        // The range query runs over the broad phase; register the victims.
        let mut qt = empty_quadtree();
        qt.insert(near.id(), Aabb2::from_ints(0, -1, 2, 1), 0, false);
        qt.insert(far.id(), Aabb2::from_ints(49, -1, 51, 1), 0, false);

        // Fuse not expired yet
        update_explosions(&mut world, &qt);
        assert!(!world.has::<Death>(x));
        assert_eq!(world.get::<Hp>(near).unwrap().current, 30);

        // Fuse expires: near victim takes damage, far one is untouched
        update_explosions(&mut world, &qt);
        assert!(world.has::<Death>(x));
        assert_eq!(world.get::<Hp>(near).unwrap().current, 18);
        assert_eq!(world.get::<Hp>(far).unwrap().current, 30);
    }

    #[test]
    fn test_barrel_death_spawns_explosion() {
        let cfg = config();
        let mut world = World::new(1);
        let barrel = world.create_entity();
        world.add(barrel, Transform2D::at(FixVec2::from_ints(4, 4)));
        world.add(barrel, Barrel);
        world.add(barrel, Death);

        run_deaths(&mut world, &cfg);

        assert!(!world.is_alive(barrel));
        assert_eq!(world.explosions.len(), 1);
        let (x, explosion) = world.explosions.iter().next().unwrap();
        assert_eq!(explosion.lifetime, cfg.explosion_fuse);
        assert_eq!(
            world.get::<Transform2D>(x).unwrap().position,
            FixVec2::from_ints(4, 4)
        );
    }

    #[test]
    fn test_death_destroys_all_components() {
        let cfg = config();
        let mut world = World::new(1);
        let e = spawn_victim(&mut world, FixVec2::ZERO, 5);
        world.add(e, Death);

        run_deaths(&mut world, &cfg);
        assert!(!world.is_alive(e));
        assert_eq!(world.hps.len(), 0);
        assert_eq!(world.collisions.len(), 0);
    }

    #[test]
    fn test_stiff_and_cleanup() {
        let mut world = World::new(1);
        let e = world.create_entity();
        world.add(e, Stiff::for_ticks(2));
        world.add(e, Collision::default());
        world.get_mut::<Collision>(e).unwrap().push(Entity(42));

        update_stiff_timers(&mut world);
        assert_eq!(world.get::<Stiff>(e).unwrap().timer, 1);
        update_stiff_timers(&mut world);
        assert!(!world.get::<Stiff>(e).unwrap().active());
        update_stiff_timers(&mut world); // saturates at zero

        clear_collisions(&mut world);
        assert!(world.get::<Collision>(e).unwrap().is_empty());
    }
}
