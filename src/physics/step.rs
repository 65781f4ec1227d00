//! 2D Physics Step
//!
//! Fixed-tick integration and collision resolution over the ECS world.
//! `dt` is one simulation unit per tick, subdivided into equal substeps.
//! Within a substep: restore the saved (position, velocity) pair (skipped
//! on substep 0), accumulate forces, integrate semi-implicit Euler,
//! refresh the quadtree, run the resolution passes, clear forces. The
//! save happens at the end of every non-final substep.
//!
//! The whole step is single-threaded and iterates stores in storage
//! order, so two worlds stepping from equal states stay bit-identical.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::fixed::Fix64;
use crate::core::vec2::FixVec2;
use crate::ecs::entity::Entity;
use crate::ecs::world::World;
use crate::game::components::{Collision, CollisionShape, PhysicsBody, Transform2D, Velocity};
use crate::spatial::aabb::Aabb2;
use crate::spatial::quadtree::Quadtree;

use super::contact::contact;
use super::layers::LayerMatrix;

/// Integration and broad-phase tuning, fixed at simulation construction.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Gravity acceleration applied to gravity-enabled dynamic bodies.
    pub gravity: FixVec2,
    /// Collision resolution passes per substep.
    pub iterations: u32,
    /// Substeps per tick.
    pub sub_steps: u32,
    /// Quadtree node object cap.
    pub quadtree_max_objects: usize,
    /// Quadtree depth cap.
    pub quadtree_max_depth: u32,
    /// Initial quadtree root rectangle.
    pub world_bounds: Aabb2,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: FixVec2::ZERO,
            iterations: 4,
            sub_steps: 1,
            quadtree_max_objects: 8,
            quadtree_max_depth: 6,
            world_bounds: Aabb2::from_ints(-64, -64, 64, 64),
        }
    }
}

/// Physics driver: configuration plus the derived broad-phase state.
///
/// The quadtree is rebuilt from component state every refresh; it is not
/// part of the snapshot.
pub struct PhysicsPipeline {
    /// Tuning constants.
    pub config: PhysicsConfig,
    /// Collision ignore matrix, installed at boot.
    pub layers: LayerMatrix,
    quadtree: Quadtree,
    overflow_warned: bool,
}

impl PhysicsPipeline {
    /// Build a pipeline from configuration.
    pub fn new(config: PhysicsConfig, layers: LayerMatrix) -> Self {
        let quadtree = Quadtree::new(
            config.world_bounds,
            config.quadtree_max_objects,
            config.quadtree_max_depth,
        );
        Self {
            config,
            layers,
            quadtree,
            overflow_warned: false,
        }
    }

    /// Broad-phase view for systems that need range queries (explosions,
    /// debug overlays). Valid after the most recent `step`.
    pub fn quadtree(&self) -> &Quadtree {
        &self.quadtree
    }

    /// Advance physics by one tick.
    pub fn step(&mut self, world: &mut World) {
        self.overflow_warned = false;
        let sub_steps = self.config.sub_steps.max(1);
        let sub_dt = Fix64::ONE / Fix64::from_int(sub_steps as i32);

        let mut saved: Vec<(Entity, FixVec2, FixVec2)> = Vec::new();

        for sub in 0..sub_steps {
            if sub > 0 {
                for (e, pos, vel) in &saved {
                    if let Some(t) = world.get_mut::<Transform2D>(*e) {
                        t.position = *pos;
                    }
                    if let Some(v) = world.get_mut::<Velocity>(*e) {
                        v.linear = *vel;
                    }
                }
            }

            self.accumulate_forces(world);
            self.integrate(world, sub_dt);
            self.refresh_broad_phase(world);
            for _ in 0..self.config.iterations.max(1) {
                self.resolve_pass(world);
            }
            self.clear_forces(world);

            if sub + 1 < sub_steps {
                saved = dynamic_entities(world)
                    .into_iter()
                    .filter_map(|e| {
                        let pos = world.get::<Transform2D>(e)?.position;
                        let vel = world.get::<Velocity>(e)?.linear;
                        Some((e, pos, vel))
                    })
                    .collect();
            }
        }
    }

    /// Gravity for every gravity-enabled dynamic body. Queued user forces
    /// are already sitting in the accumulator.
    fn accumulate_forces(&self, world: &mut World) {
        let gravity = self.config.gravity;
        for (_, body) in world.bodies.iter_mut() {
            if body.is_static || !body.gravity_enabled {
                continue;
            }
            body.force += gravity.scale(body.mass);
        }
    }

    /// Semi-implicit Euler: `v += (F/m)·dt; x += v·dt`, then damping.
    fn integrate(&self, world: &mut World, dt: Fix64) {
        for e in dynamic_entities(world) {
            let Some(body) = world.get::<PhysicsBody>(e).copied() else {
                continue;
            };
            let inv_mass = body.inv_mass();
            let Some(vel) = world.get_mut::<Velocity>(e) else {
                continue;
            };
            let mut v = vel.linear;
            if inv_mass > Fix64::ZERO {
                v += body.force.scale(inv_mass * dt);
            }
            let damping_factor =
                (Fix64::ONE - body.damping * dt).clamp(Fix64::ZERO, Fix64::ONE);
            v = v.scale(damping_factor);
            vel.linear = v;

            if let Some(t) = world.get_mut::<Transform2D>(e) {
                t.position += v.scale(dt);
            }
        }
    }

    /// Rebuild the quadtree from current bounds. The root rectangle
    /// persists across rebuilds so prior expansions are kept.
    fn refresh_broad_phase(&mut self, world: &mut World) {
        self.quadtree = Quadtree::new(
            self.quadtree.root_bounds(),
            self.config.quadtree_max_objects,
            self.config.quadtree_max_depth,
        );
        for (e, body, shape, t) in world.iter3::<PhysicsBody, CollisionShape, Transform2D>()
        {
            let aabb = shape.shape.aabb2(t.position, t.rotation);
            self.quadtree.insert(e.id(), aabb, body.layer, body.is_static);
        }
    }

    /// One collision resolution pass over every dynamic body.
    fn resolve_pass(&mut self, world: &mut World) {
        let mut seen: std::collections::HashSet<(u32, u32)> = std::collections::HashSet::new();

        for a in dynamic_entities(world) {
            let Some((body_a, shape_a, ta)) = body_shape_transform(world, a) else {
                continue;
            };
            let aabb = shape_a.shape.aabb2(ta.position, ta.rotation);
            let mask = self.layers.collide_mask(body_a.layer);
            // Candidates come back sorted ascending: deterministic order.
            for b_id in self.quadtree.query(aabb, mask) {
                let b = Entity(b_id);
                if b == a {
                    continue;
                }
                let Some((body_b, shape_b, tb)) = body_shape_transform(world, b) else {
                    continue;
                };
                if body_a.is_static && body_b.is_static {
                    continue;
                }
                let pair = (a.id().min(b.id()), a.id().max(b.id()));
                if !seen.insert(pair) {
                    continue;
                }
                if self.layers.is_ignored(body_a.layer, body_b.layer) {
                    continue;
                }

                // Earlier contacts in this pass may have moved A; test
                // against its current placement, not the queried one.
                let Some((_, _, ta_now)) = body_shape_transform(world, a) else {
                    break;
                };
                let Some(hit) = contact(
                    shape_a.shape,
                    ta_now.position,
                    ta_now.rotation,
                    shape_b.shape,
                    tb.position,
                    tb.rotation,
                ) else {
                    continue;
                };

                self.record_collision(world, a, b);
                self.record_collision(world, b, a);

                if body_a.is_trigger || body_b.is_trigger {
                    continue;
                }
                self.respond(world, a, b, hit.normal, hit.penetration);
            }
        }
    }

    /// Record a contact into an entity's fixed-capacity collision list.
    fn record_collision(&mut self, world: &mut World, on: Entity, other: Entity) {
        if !world.has::<Collision>(on) {
            world.add(on, Collision::default());
        }
        let record = world.get_mut::<Collision>(on).expect("just ensured");
        if !record.push(other) && !self.overflow_warned {
            warn!(
                entity = on.id(),
                "collision record full; dropping further contacts this tick"
            );
            self.overflow_warned = true;
        }
    }

    /// Positional separation plus restitution impulse and Coulomb friction.
    fn respond(&mut self, world: &mut World, a: Entity, b: Entity, normal: FixVec2, penetration: Fix64) {
        let body_a = *world.get::<PhysicsBody>(a).expect("resolved body");
        let body_b = *world.get::<PhysicsBody>(b).expect("resolved body");
        let inv_a = body_a.inv_mass();
        let inv_b = body_b.inv_mass();
        let inv_sum = inv_a + inv_b;
        if inv_sum == Fix64::ZERO {
            return;
        }

        // Separation split by mass ratio; a static partner pushes the
        // whole correction onto the dynamic body.
        let move_a = penetration * (inv_a / inv_sum);
        let move_b = penetration * (inv_b / inv_sum);
        if move_a > Fix64::ZERO {
            if let Some(t) = world.get_mut::<Transform2D>(a) {
                t.position -= normal.scale(move_a);
            }
        }
        if move_b > Fix64::ZERO {
            if let Some(t) = world.get_mut::<Transform2D>(b) {
                t.position += normal.scale(move_b);
            }
        }

        let va = world.get::<Velocity>(a).map(|v| v.linear).unwrap_or(FixVec2::ZERO);
        let vb = world.get::<Velocity>(b).map(|v| v.linear).unwrap_or(FixVec2::ZERO);
        let vrel = vb - va;
        let vn = vrel.dot(normal);
        if vn > Fix64::ZERO {
            return; // already separating
        }

        let e = body_a.restitution.min(body_b.restitution);
        let j = -(Fix64::ONE + e) * vn / inv_sum;

        let mut va_new = va - normal.scale(j * inv_a);
        let mut vb_new = vb + normal.scale(j * inv_b);

        // Coulomb friction along the tangent, clamped to |j|·sqrt(μA·μB).
        let vrel2 = vb_new - va_new;
        let tangent_raw = vrel2 - normal.scale(vrel2.dot(normal));
        let tangent_len = tangent_raw.length();
        if tangent_len > Fix64::ZERO {
            let tangent = tangent_raw.div_scalar(tangent_len);
            let mu = (body_a.friction * body_b.friction).sqrt();
            let jt_uncapped = -(vrel2.dot(tangent)) / inv_sum;
            let cap = j.abs() * mu;
            let jt = jt_uncapped.clamp(-cap, cap);
            va_new -= tangent.scale(jt * inv_a);
            vb_new += tangent.scale(jt * inv_b);
        }

        if inv_a > Fix64::ZERO {
            if let Some(v) = world.get_mut::<Velocity>(a) {
                v.linear = va_new;
            }
        }
        if inv_b > Fix64::ZERO {
            if let Some(v) = world.get_mut::<Velocity>(b) {
                v.linear = vb_new;
            }
        }
    }

    fn clear_forces(&self, world: &mut World) {
        for (_, body) in world.bodies.iter_mut() {
            body.force = FixVec2::ZERO;
        }
    }
}

/// Dynamic (non-static) bodies in storage order.
fn dynamic_entities(world: &World) -> Vec<Entity> {
    world
        .bodies
        .iter()
        .filter(|(_, b)| !b.is_static)
        .map(|(e, _)| e)
        .collect()
}

fn body_shape_transform(
    world: &World,
    e: Entity,
) -> Option<(PhysicsBody, CollisionShape, Transform2D)> {
    Some((
        *world.get::<PhysicsBody>(e)?,
        *world.get::<CollisionShape>(e)?,
        *world.get::<Transform2D>(e)?,
    ))
}

// =============================================================================
// TESTS
// =============================================================================
