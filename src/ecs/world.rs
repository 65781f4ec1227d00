//! ECS World
//!
//! The entire simulation state: the entity id counter, the live-entity set
//! (in creation order), the deterministic RNG, and one dense store per
//! component type. Cloning the world is the snapshot operation - every
//! store deep-copies, so the clone's future evolution under identical
//! inputs is bit-identical to the original's.
//!
//! Component types are wired in with the `components!` macro below: one
//! named field per store, a [`Component`] impl routing the generic
//! accessors, and the erased removal used by `destroy`. The system
//! pipeline is an explicit call sequence; nothing here is discovered by
//! reflection.

use serde::{Deserialize, Serialize};

use crate::collections::OrderedSet;
use crate::core::hash::{WorldDigest, WorldHasher};
use crate::core::rng::FixRand;
use crate::game::components::{
    AttackHitbox, Barrel, Bullet, Collision, CollisionShape, Death, Explosion, FlowField, GridMap,
    Hp, Intent, PhysicsBody, Player, Stiff, Transform2D, Velocity, Wall, WallPlacement, ZombieAi,
};

use super::entity::Entity;
use super::store::ComponentStore;

/// Routes a component type to its store inside the world, and defines how
/// the type feeds the world digest.
pub trait Component: Clone + Sized + 'static {
    /// Borrow this type's store.
    fn store(world: &World) -> &ComponentStore<Self>;
    /// Borrow this type's store mutably.
    fn store_mut(world: &mut World) -> &mut ComponentStore<Self>;
    /// Write the component's state into a digest.
    fn hash_into(&self, h: &mut WorldHasher);
}

macro_rules! components {
    ($( $field:ident : $ty:ty ),+ $(,)?) => {
        /// The complete simulation state.
        #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
        pub struct World {
            next_entity_id: u32,
            entities: OrderedSet<Entity>,
            /// Seeded RNG; part of the state, cloned with snapshots.
            pub rng: FixRand,
            $(
                /// Component store.
                pub $field: ComponentStore<$ty>,
            )+
        }

        impl World {
            /// Empty world seeded for a room.
            pub fn new(seed: i64) -> Self {
                Self {
                    next_entity_id: 1,
                    entities: OrderedSet::new(),
                    rng: FixRand::new(seed),
                    $( $field: ComponentStore::new(), )+
                }
            }

            /// Remove every component attached to an entity.
            fn detach_all(&mut self, e: Entity) {
                $( self.$field.remove(e); )+
            }

            /// SHA-256 digest of the full state, for determinism checks
            /// and divergence diagnostics.
            pub fn digest(&self) -> WorldDigest {
                let mut h = WorldHasher::for_world();
                h.update_u32(self.next_entity_id);
                h.update_i64(self.rng.state());
                h.update_u32(self.entities.len() as u32);
                for e in self.entities.iter() {
                    h.update_u32(e.id());
                }
                $(
                    h.update_u32(self.$field.len() as u32);
                    for (e, c) in self.$field.iter() {
                        h.update_u32(e.id());
                        c.hash_into(&mut h);
                    }
                )+
                h.finalize()
            }
        }

        $(
            impl Component for $ty {
                fn store(world: &World) -> &ComponentStore<Self> {
                    &world.$field
                }
                fn store_mut(world: &mut World) -> &mut ComponentStore<Self> {
                    &mut world.$field
                }
                fn hash_into(&self, h: &mut WorldHasher) {
                    hash_component(self, h);
                }
            }
        )+
    };
}

components! {
    transforms: Transform2D,
    velocities: Velocity,
    bodies: PhysicsBody,
    shapes: CollisionShape,
    collisions: Collision,
    hps: Hp,
    stiffs: Stiff,
    deaths: Death,
    players: Player,
    intents: Intent,
    bullets: Bullet,
    walls: Wall,
    barrels: Barrel,
    explosions: Explosion,
    wall_placements: WallPlacement,
    attack_hitboxes: AttackHitbox,
    zombies: ZombieAi,
    grid_maps: GridMap,
    flow_fields: FlowField,
}

impl World {
    /// Allocate a fresh entity. Ids are monotonic and never reused.
    pub fn create_entity(&mut self) -> Entity {
        let e = Entity(self.next_entity_id);
        self.next_entity_id += 1;
        self.entities.insert(e);
        e
    }

    /// Destroy an entity and every component tied to it.
    pub fn destroy(&mut self, e: Entity) {
        if self.entities.remove(&e) {
            self.detach_all(e);
        }
    }

    /// True while the entity is live.
    pub fn is_alive(&self, e: Entity) -> bool {
        self.entities.contains(&e)
    }

    /// Live entities in creation order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter().copied()
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Attach a component. A second add of the same type overwrites.
    pub fn add<C: Component>(&mut self, e: Entity, value: C) {
        debug_assert!(self.is_alive(e), "component added to a dead entity");
        C::store_mut(self).insert(e, value);
    }

    /// Look up a component; absence is a tagged `None`, never a fault.
    pub fn get<C: Component>(&self, e: Entity) -> Option<&C> {
        C::store(self).get(e)
    }

    /// Look up a component mutably.
    pub fn get_mut<C: Component>(&mut self, e: Entity) -> Option<&mut C> {
        C::store_mut(self).get_mut(e)
    }

    /// True if the entity carries the component.
    pub fn has<C: Component>(&self, e: Entity) -> bool {
        C::store(self).has(e)
    }

    /// Detach and return a component.
    pub fn remove<C: Component>(&mut self, e: Entity) -> Option<C> {
        C::store_mut(self).remove(e)
    }

    /// Iterate one component type in storage order.
    pub fn iter<C: Component>(&self) -> impl Iterator<Item = (Entity, &C)> {
        C::store(self).iter()
    }

    /// Intersection of two component types. Iterates the smaller store and
    /// probes the other, so cost tracks the sparser component and the
    /// order stays deterministic.
    pub fn iter2<A: Component, B: Component>(&self) -> Vec<(Entity, &A, &B)> {
        let a = A::store(self);
        let b = B::store(self);
        let mut out = Vec::new();
        if a.len() <= b.len() {
            for (e, ca) in a.iter() {
                if let Some(cb) = b.get(e) {
                    out.push((e, ca, cb));
                }
            }
        } else {
            for (e, cb) in b.iter() {
                if let Some(ca) = a.get(e) {
                    out.push((e, ca, cb));
                }
            }
        }
        out
    }

    /// Intersection of three component types.
    pub fn iter3<A: Component, B: Component, C: Component>(&self) -> Vec<(Entity, &A, &B, &C)> {
        let entities = smallest_entities(&[
            A::store(self).len(),
            B::store(self).len(),
            C::store(self).len(),
        ], self, |world, which| match which {
            0 => A::store(world).entities(),
            1 => B::store(world).entities(),
            _ => C::store(world).entities(),
        });
        let mut out = Vec::new();
        for e in entities {
            if let (Some(a), Some(b), Some(c)) =
                (self.get::<A>(e), self.get::<B>(e), self.get::<C>(e))
            {
                out.push((e, a, b, c));
            }
        }
        out
    }

    /// Intersection of four component types.
    pub fn iter4<A: Component, B: Component, C: Component, D: Component>(
        &self,
    ) -> Vec<(Entity, &A, &B, &C, &D)> {
        let entities = smallest_entities(&[
            A::store(self).len(),
            B::store(self).len(),
            C::store(self).len(),
            D::store(self).len(),
        ], self, |world, which| match which {
            0 => A::store(world).entities(),
            1 => B::store(world).entities(),
            2 => C::store(world).entities(),
            _ => D::store(world).entities(),
        });
        let mut out = Vec::new();
        for e in entities {
            if let (Some(a), Some(b), Some(c), Some(d)) = (
                self.get::<A>(e),
                self.get::<B>(e),
                self.get::<C>(e),
                self.get::<D>(e),
            ) {
                out.push((e, a, b, c, d));
            }
        }
        out
    }

    /// Overwrite this world in place from another (rollback restore).
    pub fn restore_from(&mut self, other: &World) {
        self.clone_from(other);
    }
}

/// Entities of the smallest store among `lens`.
fn smallest_entities(
    lens: &[usize],
    world: &World,
    pick: impl Fn(&World, usize) -> Vec<Entity>,
) -> Vec<Entity> {
    let mut which = 0;
    for (i, len) in lens.iter().enumerate() {
        if *len < lens[which] {
            which = i;
        }
    }
    pick(world, which)
}

/// Per-type digest contributions. Every simulation-relevant field is
/// written; derived/transient data stays out.
fn hash_component<C: HashFields>(c: &C, h: &mut WorldHasher) {
    c.hash_fields(h);
}

trait HashFields {
    fn hash_fields(&self, h: &mut WorldHasher);
}

impl HashFields for Transform2D {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_vec2(self.position);
        h.update_fixed(self.rotation);
    }
}

impl HashFields for Velocity {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_vec2(self.linear);
    }
}

impl HashFields for PhysicsBody {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_fixed(self.mass);
        h.update_bool(self.is_static);
        h.update_bool(self.is_trigger);
        h.update_bool(self.gravity_enabled);
        h.update_fixed(self.restitution);
        h.update_fixed(self.friction);
        h.update_fixed(self.damping);
        h.update_u8(self.layer);
        h.update_vec2(self.force);
    }
}

impl HashFields for CollisionShape {
    fn hash_fields(&self, h: &mut WorldHasher) {
        use crate::physics::shape::Shape;
        match self.shape {
            Shape::Circle { radius } => {
                h.update_u8(0);
                h.update_fixed(radius);
            }
            Shape::Box { width, height } => {
                h.update_u8(1);
                h.update_fixed(width);
                h.update_fixed(height);
            }
            Shape::Sphere { radius } => {
                h.update_u8(2);
                h.update_fixed(radius);
            }
            Shape::Box3 {
                width,
                height,
                length,
            } => {
                h.update_u8(3);
                h.update_fixed(width);
                h.update_fixed(height);
                h.update_fixed(length);
            }
        }
    }
}

impl HashFields for Collision {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_u8(self.len() as u8);
        for e in self.iter() {
            h.update_u32(e.id());
        }
    }
}

impl HashFields for Hp {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_i32(self.current);
        h.update_i32(self.max);
    }
}

impl HashFields for Stiff {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_u32(self.timer);
        h.update_u32(self.duration);
    }
}

impl HashFields for Death {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_u8(1);
    }
}

impl HashFields for Player {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_u32(self.id);
        h.update_u8(self.mode as u8);
        h.update_fixed(self.move_speed);
        h.update_vec2(self.facing);
        h.update_u32(self.shoot_cooldown);
        h.update_u32(self.place_cooldown);
    }
}

impl HashFields for Intent {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_vec2(self.move_dir);
        h.update_bool(self.fire);
        h.update_bool(self.place_wall);
        h.update_bool(self.place_barrel);
    }
}

impl HashFields for Bullet {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_u32(self.owner.id());
        h.update_vec2(self.velocity);
        h.update_i32(self.damage);
        h.update_u32(self.lifetime);
    }
}

impl HashFields for Wall {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_u8(1);
    }
}

impl HashFields for Barrel {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_u8(1);
    }
}

impl HashFields for Explosion {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_fixed(self.radius);
        h.update_i32(self.damage);
        h.update_u32(self.timer);
        h.update_u32(self.lifetime);
    }
}

impl HashFields for WallPlacement {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_bool(self.armed);
    }
}

impl HashFields for AttackHitbox {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_u32(self.owner.id());
        h.update_i32(self.damage);
        h.update_u32(self.stiff_ticks);
        h.update_u32(self.timer);
    }
}

impl HashFields for ZombieAi {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_u32(self.target.id());
        h.update_u8(self.state as u8);
        h.update_u32(self.state_timer);
        h.update_fixed(self.attack_range);
        h.update_i32(self.attack_damage);
        h.update_u32(self.windup_ticks);
        h.update_u32(self.attack_ticks);
        h.update_u32(self.cooldown_ticks);
        h.update_fixed(self.move_speed);
        h.update_u32(self.path.len() as u32);
        for (x, y) in &self.path {
            h.update_i32(*x);
            h.update_i32(*y);
        }
    }
}

impl HashFields for GridMap {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_i32(self.width);
        h.update_i32(self.height);
        h.update_fixed(self.cell_size);
        h.update_vec2(self.origin);
        h.update_u32(self.obstacles.len() as u32);
        for (x, y) in self.obstacles.iter() {
            h.update_i32(*x);
            h.update_i32(*y);
        }
    }
}

impl HashFields for FlowField {
    fn hash_fields(&self, h: &mut WorldHasher) {
        h.update_i32(self.width);
        h.update_i32(self.height);
        for g in &self.gradient {
            h.update_vec2(*g);
        }
        h.update_u32(self.cooldown);
    }
}

// =============================================================================
// TESTS
// =============================================================================
