//! 3D Physics World
//!
//! Self-contained body world for 3D content, mirroring the 2D pipeline:
//! same substep scheme, same impulse math, but a BVH broad phase that is
//! maintained incrementally instead of rebuilt. Bodies are keyed by id in
//! a BTreeMap, so every iteration is in sorted-id order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::fixed::Fix64;
use crate::core::vec3::FixVec3;
use crate::physics::shape::{Basis3, Shape};
use crate::spatial::bvh::Bvh;

use super::contact3::contact3;
use super::layers::LayerMatrix;

/// 3D integration tuning.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Physics3Config {
    /// Gravity acceleration.
    pub gravity: FixVec3,
    /// Collision resolution passes per substep.
    pub iterations: u32,
    /// Substeps per tick.
    pub sub_steps: u32,
    /// BVH leaf capacity.
    pub bvh_max_objects: usize,
    /// BVH depth cap.
    pub bvh_max_depth: u32,
}

impl Default for Physics3Config {
    fn default() -> Self {
        Self {
            gravity: FixVec3::ZERO,
            iterations: 4,
            sub_steps: 1,
            bvh_max_objects: 4,
            bvh_max_depth: 10,
        }
    }
}

/// A rigid 3D body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Body3 {
    /// World position.
    pub position: FixVec3,
    /// Linear velocity per tick.
    pub velocity: FixVec3,
    /// Orientation basis.
    pub basis: Basis3,
    /// Collision shape (Sphere or Box3).
    pub shape: Shape,
    /// Mass; ignored for static bodies.
    pub mass: Fix64,
    /// Static bodies never move.
    pub is_static: bool,
    /// Triggers record contacts but receive no response.
    pub is_trigger: bool,
    /// Whether gravity applies.
    pub gravity_enabled: bool,
    /// Restitution in [0, 1].
    pub restitution: Fix64,
    /// Coulomb friction coefficient.
    pub friction: Fix64,
    /// Linear damping per tick.
    pub damping: Fix64,
    /// Collision layer.
    pub layer: u8,
    /// Accumulated force, cleared after each step.
    pub force: FixVec3,
}

impl Body3 {
    /// Dynamic body.
    pub fn dynamic(shape: Shape, position: FixVec3, mass: Fix64, layer: u8) -> Self {
        Self {
            position,
            velocity: FixVec3::ZERO,
            basis: Basis3::IDENTITY,
            shape,
            mass,
            is_static: false,
            is_trigger: false,
            gravity_enabled: false,
            restitution: Fix64::ZERO,
            friction: Fix64::ZERO,
            damping: Fix64::ZERO,
            layer,
            force: FixVec3::ZERO,
        }
    }

    /// Immovable body.
    pub fn fixed(shape: Shape, position: FixVec3, layer: u8) -> Self {
        Self {
            mass: Fix64::ZERO,
            is_static: true,
            ..Self::dynamic(shape, position, Fix64::ZERO, layer)
        }
    }

    fn inv_mass(&self) -> Fix64 {
        if self.is_static || self.mass <= Fix64::ZERO {
            Fix64::ZERO
        } else {
            Fix64::ONE / self.mass
        }
    }
}

/// Contact pair reported by a step, canonical `(min, max)` id order.
pub type ContactPair = (u32, u32);

/// The 3D body world.
pub struct PhysicsWorld3 {
    /// Tuning constants.
    pub config: Physics3Config,
    /// Collision ignore matrix.
    pub layers: LayerMatrix,
    bodies: BTreeMap<u32, Body3>,
    bvh: Bvh,
}

impl PhysicsWorld3 {
    /// Build a world from configuration.
    pub fn new(config: Physics3Config, layers: LayerMatrix) -> Self {
        let bvh = Bvh::new(config.bvh_max_objects, config.bvh_max_depth);
        Self {
            config,
            layers,
            bodies: BTreeMap::new(),
            bvh,
        }
    }

    /// Add or replace a body.
    pub fn insert_body(&mut self, id: u32, body: Body3) {
        let bounds = body.shape.aabb3(body.position, body.basis);
        self.bvh.insert(id, bounds, body.layer);
        self.bodies.insert(id, body);
    }

    /// Remove a body.
    pub fn remove_body(&mut self, id: u32) {
        self.bodies.remove(&id);
        self.bvh.remove(id);
    }

    /// Borrow a body.
    pub fn body(&self, id: u32) -> Option<&Body3> {
        self.bodies.get(&id)
    }

    /// Borrow a body mutably. Broad-phase bounds refresh on the next step.
    pub fn body_mut(&mut self, id: u32) -> Option<&mut Body3> {
        self.bodies.get_mut(&id)
    }

    /// Number of bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// True if the world has no bodies.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Advance one tick. Returns the contact pairs seen this tick in
    /// first-seen order.
    pub fn step(&mut self) -> Vec<ContactPair> {
        let sub_steps = self.config.sub_steps.max(1);
        let sub_dt = Fix64::ONE / Fix64::from_int(sub_steps as i32);
        let mut contacts: Vec<ContactPair> = Vec::new();

        let mut saved: Vec<(u32, FixVec3, FixVec3)> = Vec::new();

        for sub in 0..sub_steps {
            if sub > 0 {
                for (id, pos, vel) in &saved {
                    if let Some(body) = self.bodies.get_mut(id) {
                        body.position = *pos;
                        body.velocity = *vel;
                    }
                }
            }

            // Forces and integration.
            let gravity = self.config.gravity;
            for body in self.bodies.values_mut() {
                if body.is_static {
                    continue;
                }
                if body.gravity_enabled {
                    body.force += gravity.scale(body.mass);
                }
                let inv_mass = body.inv_mass();
                if inv_mass > Fix64::ZERO {
                    body.velocity += body.force.scale(inv_mass * sub_dt);
                }
                let damping_factor =
                    (Fix64::ONE - body.damping * sub_dt).clamp(Fix64::ZERO, Fix64::ONE);
                body.velocity = body.velocity.scale(damping_factor);
                body.position += body.velocity.scale(sub_dt);
            }

            // Incremental broad-phase refresh for dynamic bodies.
            let moved: Vec<(u32, crate::spatial::aabb::Aabb3)> = self
                .bodies
                .iter()
                .filter(|(_, b)| !b.is_static)
                .map(|(id, b)| (*id, b.shape.aabb3(b.position, b.basis)))
                .collect();
            for (id, bounds) in moved {
                self.bvh.update(id, bounds);
            }

            for _ in 0..self.config.iterations.max(1) {
                self.resolve_pass(&mut contacts);
            }

            for body in self.bodies.values_mut() {
                body.force = FixVec3::ZERO;
            }

            if sub + 1 < sub_steps {
                saved = self
                    .bodies
                    .iter()
                    .filter(|(_, b)| !b.is_static)
                    .map(|(id, b)| (*id, b.position, b.velocity))
                    .collect();
            }
        }

        contacts
    }

    fn resolve_pass(&mut self, contacts: &mut Vec<ContactPair>) {
        let mut seen: std::collections::HashSet<ContactPair> = std::collections::HashSet::new();
        let dynamic_ids: Vec<u32> = self
            .bodies
            .iter()
            .filter(|(_, b)| !b.is_static)
            .map(|(id, _)| *id)
            .collect();

        for a_id in dynamic_ids {
            let Some(a) = self.bodies.get(&a_id).cloned() else {
                continue;
            };
            let aabb = a.shape.aabb3(a.position, a.basis);
            let mask = self.layers.collide_mask(a.layer);
            for b_id in self.bvh.query(aabb, mask) {
                if b_id == a_id {
                    continue;
                }
                let Some(b) = self.bodies.get(&b_id).cloned() else {
                    continue;
                };
                if a.is_static && b.is_static {
                    continue;
                }
                let pair = (a_id.min(b_id), a_id.max(b_id));
                if !seen.insert(pair) {
                    continue;
                }
                if self.layers.is_ignored(a.layer, b.layer) {
                    continue;
                }

                let Some(hit) = contact3(a.shape, a.position, a.basis, b.shape, b.position, b.basis)
                else {
                    continue;
                };

                if !contacts.contains(&pair) {
                    contacts.push(pair);
                }
                if a.is_trigger || b.is_trigger {
                    continue;
                }
                self.respond(a_id, b_id, hit.normal, hit.penetration);
            }
        }
    }

    fn respond(&mut self, a_id: u32, b_id: u32, normal: FixVec3, penetration: Fix64) {
        let a = self.bodies[&a_id].clone();
        let b = self.bodies[&b_id].clone();
        let inv_a = a.inv_mass();
        let inv_b = b.inv_mass();
        let inv_sum = inv_a + inv_b;
        if inv_sum == Fix64::ZERO {
            return;
        }

        let move_a = penetration * (inv_a / inv_sum);
        let move_b = penetration * (inv_b / inv_sum);
        if move_a > Fix64::ZERO {
            self.bodies.get_mut(&a_id).expect("resolved body").position -= normal.scale(move_a);
        }
        if move_b > Fix64::ZERO {
            self.bodies.get_mut(&b_id).expect("resolved body").position += normal.scale(move_b);
        }

        let vrel = b.velocity - a.velocity;
        let vn = vrel.dot(normal);
        if vn > Fix64::ZERO {
            return;
        }

        let e = a.restitution.min(b.restitution);
        let j = -(Fix64::ONE + e) * vn / inv_sum;
        let mut va = a.velocity - normal.scale(j * inv_a);
        let mut vb = b.velocity + normal.scale(j * inv_b);

        let vrel2 = vb - va;
        let tangent_raw = vrel2 - normal.scale(vrel2.dot(normal));
        let tangent_len = tangent_raw.length();
        if tangent_len > Fix64::ZERO {
            let tangent = tangent_raw.div_scalar(tangent_len);
            let mu = (a.friction * b.friction).sqrt();
            let jt = (-(vrel2.dot(tangent)) / inv_sum).clamp(-(j.abs() * mu), j.abs() * mu);
            va -= tangent.scale(jt * inv_a);
            vb += tangent.scale(jt * inv_b);
        }

        if inv_a > Fix64::ZERO {
            self.bodies.get_mut(&a_id).expect("resolved body").velocity = va;
        }
        if inv_b > Fix64::ZERO {
            self.bodies.get_mut(&b_id).expect("resolved body").velocity = vb;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> PhysicsWorld3 {
        PhysicsWorld3::new(Physics3Config::default(), LayerMatrix::new())
    }

    #[test]
    fn test_integrate_and_gravity() {
        let mut w = world();
        let mut body = Body3::dynamic(
            Shape::sphere(Fix64::ONE),
            FixVec3::ZERO,
            Fix64::ONE,
            0,
        );
        body.gravity_enabled = true;
        w.insert_body(1, body);
        w.config.gravity = FixVec3::new(Fix64::ZERO, -Fix64::ONE, Fix64::ZERO);

        w.step();
        let b = w.body(1).unwrap();
        assert_eq!(b.velocity, FixVec3::new(Fix64::ZERO, -Fix64::ONE, Fix64::ZERO));
        assert_eq!(b.position, FixVec3::new(Fix64::ZERO, -Fix64::ONE, Fix64::ZERO));
        assert_eq!(b.force, FixVec3::ZERO);
    }

    #[test]
    fn test_elastic_sphere_collision() {
        let mut w = world();
        let v = Fix64::from_ratio(1, 4);
        let mut a = Body3::dynamic(Shape::sphere(Fix64::ONE), FixVec3::ZERO, Fix64::ONE, 0);
        a.velocity = FixVec3::new(v, Fix64::ZERO, Fix64::ZERO);
        a.restitution = Fix64::ONE;
        let mut b = Body3::dynamic(
            Shape::sphere(Fix64::ONE),
            FixVec3::new(Fix64::from_ratio(9, 5), Fix64::ZERO, Fix64::ZERO),
            Fix64::ONE,
            0,
        );
        b.velocity = FixVec3::new(-v, Fix64::ZERO, Fix64::ZERO);
        b.restitution = Fix64::ONE;
        w.insert_body(1, a);
        w.insert_body(2, b);

        let contacts = w.step();
        assert_eq!(contacts, vec![(1, 2)]);
        assert_eq!(
            w.body(1).unwrap().velocity,
            FixVec3::new(-v, Fix64::ZERO, Fix64::ZERO)
        );
        assert_eq!(
            w.body(2).unwrap().velocity,
            FixVec3::new(v, Fix64::ZERO, Fix64::ZERO)
        );
    }

    #[test]
    fn test_static_floor_stops_fall() {
        let mut w = world();
        w.config.gravity = FixVec3::new(Fix64::ZERO, -Fix64::from_ratio(1, 4), Fix64::ZERO);
        w.insert_body(
            1,
            Body3::fixed(
                Shape::box3(Fix64::from_int(20), Fix64::TWO, Fix64::from_int(20)),
                FixVec3::new(Fix64::ZERO, -Fix64::from_int(2), Fix64::ZERO),
                0,
            ),
        );
        let mut ball = Body3::dynamic(
            Shape::sphere(Fix64::ONE),
            FixVec3::new(Fix64::ZERO, Fix64::HALF, Fix64::ZERO),
            Fix64::ONE,
            0,
        );
        ball.gravity_enabled = true;
        w.insert_body(2, ball);

        for _ in 0..20 {
            w.step();
        }
        let y = w.body(2).unwrap().position.y;
        // Resting on the floor top (floor top at -1, sphere radius 1 -> 0)
        assert!(y > -Fix64::HALF, "ball must not sink through the floor");
    }

    #[test]
    fn test_trigger_reports_without_response() {
        let mut w = world();
        let solid = Body3::dynamic(Shape::sphere(Fix64::ONE), FixVec3::ZERO, Fix64::ONE, 0);
        let mut sensor = Body3::dynamic(
            Shape::sphere(Fix64::ONE),
            FixVec3::new(Fix64::HALF, Fix64::ZERO, Fix64::ZERO),
            Fix64::ONE,
            0,
        );
        sensor.is_trigger = true;
        w.insert_body(1, solid);
        w.insert_body(2, sensor);

        let contacts = w.step();
        assert_eq!(contacts, vec![(1, 2)]);
        assert_eq!(w.body(1).unwrap().position, FixVec3::ZERO);
    }

    #[test]
    fn test_determinism() {
        let build = || {
            let mut w = world();
            for i in 0..8u32 {
                let mut b = Body3::dynamic(
                    Shape::sphere(Fix64::ONE),
                    FixVec3::from_ints((i % 3) as i32 * 2, (i / 3) as i32 * 2, 0),
                    Fix64::ONE,
                    0,
                );
                b.velocity = FixVec3::new(
                    Fix64::from_ratio(1, 8),
                    Fix64::from_ratio(-1, 16),
                    Fix64::from_ratio(1, 32),
                );
                b.restitution = Fix64::HALF;
                w.insert_body(i, b);
            }
            w
        };
        let mut w1 = build();
        let mut w2 = build();
        for _ in 0..30 {
            let c1 = w1.step();
            let c2 = w2.step();
            assert_eq!(c1, c2);
        }
        for i in 0..8u32 {
            assert_eq!(w1.body(i).unwrap().position, w2.body(i).unwrap().position);
            assert_eq!(w1.body(i).unwrap().velocity, w2.body(i).unwrap().velocity);
        }
    }
}
