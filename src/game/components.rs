//! Component Definitions
//!
//! Plain-data value types. A component is mutated only by the system that
//! owns it (see the pipeline in [`crate::game::step`]). Everything here
//! derives `Clone`; components that embed owned collections (`ZombieAI`
//! paths, `GridMap` obstacles, `FlowField` gradients) deep-copy them on
//! clone, which is what world snapshots rely on.

use serde::{Deserialize, Serialize};

use crate::collections::OrderedSet;
use crate::core::fixed::Fix64;
use crate::core::vec2::FixVec2;
use crate::ecs::entity::Entity;
use crate::physics::shape::Shape;

/// Collision layers used by the game.
pub mod layers {
    /// Default layer.
    pub const DEFAULT: u8 = 0;
    /// Player bodies.
    pub const PLAYER: u8 = 1;
    /// Zombie bodies.
    pub const ZOMBIE: u8 = 2;
    /// Bullets (trigger).
    pub const BULLET: u8 = 3;
    /// Walls and static geometry.
    pub const WALL: u8 = 4;
    /// Barrels.
    pub const BARREL: u8 = 5;
    /// Transient trigger volumes (hitboxes, wall ghosts, explosions).
    pub const TRIGGER: u8 = 6;
}

// =============================================================================
// SPATIAL STATE
// =============================================================================

/// 2D placement.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Transform2D {
    /// World position.
    pub position: FixVec2,
    /// Rotation in radians.
    pub rotation: Fix64,
}

impl Transform2D {
    /// Transform at a position with zero rotation.
    pub fn at(position: FixVec2) -> Self {
        Self {
            position,
            rotation: Fix64::ZERO,
        }
    }
}

/// Linear velocity.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Velocity {
    /// Units per tick.
    pub linear: FixVec2,
}

// =============================================================================
// PHYSICS
// =============================================================================

/// Dynamic/static body parameters plus the per-tick force accumulator.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PhysicsBody {
    /// Mass; ignored for static bodies.
    pub mass: Fix64,
    /// Static bodies never move and never collide with each other.
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
    /// Collision layer (bit index into the ignore matrix).
    pub layer: u8,
    /// Accumulated force, cleared at the end of each physics step.
    pub force: FixVec2,
}

impl PhysicsBody {
    /// Dynamic body with unit-ish defaults.
    pub fn dynamic(mass: Fix64, layer: u8) -> Self {
        Self {
            mass,
            is_static: false,
            is_trigger: false,
            gravity_enabled: false,
            restitution: Fix64::ZERO,
            friction: Fix64::ZERO,
            damping: Fix64::ZERO,
            layer,
            force: FixVec2::ZERO,
        }
    }

    /// Immovable body.
    pub fn fixed(layer: u8) -> Self {
        Self {
            mass: Fix64::ZERO,
            is_static: true,
            is_trigger: false,
            gravity_enabled: false,
            restitution: Fix64::ZERO,
            friction: Fix64::ZERO,
            damping: Fix64::ZERO,
            layer,
            force: FixVec2::ZERO,
        }
    }

    /// Trigger volume: overlap reporting only.
    pub fn trigger(layer: u8) -> Self {
        Self {
            is_trigger: true,
            ..Self::dynamic(Fix64::ONE, layer)
        }
    }

    /// Inverse mass; zero for static or massless bodies.
    #[inline]
    pub fn inv_mass(&self) -> Fix64 {
        if self.is_static || self.mass <= Fix64::ZERO {
            Fix64::ZERO
        } else {
            Fix64::ONE / self.mass
        }
    }
}

/// Shape used for collision detection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CollisionShape {
    /// The shape variant.
    pub shape: Shape,
}

impl CollisionShape {
    /// Wrap a shape.
    pub fn new(shape: Shape) -> Self {
        Self { shape }
    }
}

/// Maximum entity contacts recorded per entity per tick.
pub const MAX_COLLISIONS: usize = 8;

/// Fixed-capacity record of the entities touched this tick.
///
/// Value-typed and `Copy`, so snapshots are bit-for-bit. Overflow beyond
/// eight contacts is dropped (the physics step logs the drop once per
/// tick).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Collision {
    entities: [Entity; MAX_COLLISIONS],
    count: u8,
}

impl Collision {
    /// Number of recorded contacts.
    #[inline]
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// True if nothing was recorded this tick.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Record a contact. Returns false when the record is full or the
    /// entity is already present (contacts are recorded once per pair).
    pub fn push(&mut self, e: Entity) -> bool {
        if self.contains(e) {
            return true;
        }
        if (self.count as usize) >= MAX_COLLISIONS {
            return false;
        }
        self.entities[self.count as usize] = e;
        self.count += 1;
        true
    }

    /// True if the entity was recorded this tick.
    pub fn contains(&self, e: Entity) -> bool {
        self.entities[..self.count as usize].contains(&e)
    }

    /// Recorded entities in recording order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities[..self.count as usize].iter().copied()
    }

    /// Reset for the next tick.
    pub fn clear(&mut self) {
        self.count = 0;
    }
}

// =============================================================================
// GAMEPLAY STATE
// =============================================================================

/// Hit points.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Hp {
    /// Current hit points.
    pub current: i32,
    /// Maximum hit points.
    pub max: i32,
}

impl Hp {
    /// Full health.
    pub fn full(max: i32) -> Self {
        Self { current: max, max }
    }

    /// Apply damage, saturating at zero.
    pub fn damage(&mut self, amount: i32) {
        self.current = (self.current - amount).max(0);
    }

    /// True once hit points reach zero.
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.current <= 0
    }
}

/// Stun timer: a stiff entity cannot move until the timer runs out.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Stiff {
    /// Remaining ticks.
    pub timer: u32,
    /// Original duration, kept for render-side progress bars.
    pub duration: u32,
}

impl Stiff {
    /// Start a stun of `duration` ticks.
    pub fn for_ticks(duration: u32) -> Self {
        Self {
            timer: duration,
            duration,
        }
    }

    /// True while the stun is running.
    #[inline]
    pub fn active(&self) -> bool {
        self.timer > 0
    }
}

/// Marks an entity for destruction by the death system this tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Death;

/// What a player's action input does.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum ActionMode {
    /// Fire bullets.
    #[default]
    Shoot,
    /// Place wall ghosts.
    BuildWall,
    /// Drop barrels.
    DropBarrel,
}

/// Player-controlled pawn.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Network player id.
    pub id: u32,
    /// Current action mode.
    pub mode: ActionMode,
    /// Movement speed in units per tick.
    pub move_speed: Fix64,
    /// Unit facing direction, updated from movement input.
    pub facing: FixVec2,
    /// Ticks until the next shot is allowed.
    pub shoot_cooldown: u32,
    /// Ticks until the next placement is allowed.
    pub place_cooldown: u32,
}

impl Player {
    /// New pawn for a network player.
    pub fn new(id: u32, move_speed: Fix64) -> Self {
        Self {
            id,
            mode: ActionMode::Shoot,
            move_speed,
            facing: FixVec2::UP,
            shoot_cooldown: 0,
            place_cooldown: 0,
        }
    }
}

/// Per-tick intent, written by input application and consumed by the
/// action and movement systems.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Intent {
    /// Desired movement direction (unit or zero).
    pub move_dir: FixVec2,
    /// Fire requested this tick.
    pub fire: bool,
    /// Wall placement requested this tick.
    pub place_wall: bool,
    /// Barrel drop requested this tick.
    pub place_barrel: bool,
}

/// Projectile.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Bullet {
    /// Entity that fired it.
    pub owner: Entity,
    /// Velocity in units per tick.
    pub velocity: FixVec2,
    /// Damage applied on hit.
    pub damage: i32,
    /// Remaining lifetime in ticks.
    pub lifetime: u32,
}

/// Solid wall marker.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Wall;

/// Barrel marker; explodes on death.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Barrel;

/// Expanding blast; damages everything in radius when its timer expires.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Explosion {
    /// Blast radius.
    pub radius: Fix64,
    /// Damage dealt at expiry.
    pub damage: i32,
    /// Elapsed ticks.
    pub timer: u32,
    /// Ticks until detonation.
    pub lifetime: u32,
}

/// Pending wall ghost. Starts as a trigger; flips to a solid wall when a
/// tick ends with nothing overlapping it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct WallPlacement {
    /// Set once the ghost has solidified.
    pub armed: bool,
}

/// Short-lived melee hitbox spawned by attacking zombies.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AttackHitbox {
    /// Attacking entity.
    pub owner: Entity,
    /// Damage on contact.
    pub damage: i32,
    /// Stun applied on contact, in ticks.
    pub stiff_ticks: u32,
    /// Remaining lifetime in ticks.
    pub timer: u32,
}

// =============================================================================
// AI STATE
// =============================================================================

/// Grid cell coordinate.
pub type GridCell = (i32, i32);

/// Zombie behavior states.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum ZombieState {
    /// Moving toward the target.
    #[default]
    Chase,
    /// Telegraphing an attack.
    AttackWindup,
    /// Attack hitbox is live.
    Attack,
    /// Recovering after an attack.
    AttackCooldown,
}

/// Zombie AI state machine and tuning.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ZombieAi {
    /// Current target entity (NULL when none).
    pub target: Entity,
    /// Behavior state.
    pub state: ZombieState,
    /// Ticks remaining in the current state.
    pub state_timer: u32,
    /// Attack trigger distance.
    pub attack_range: Fix64,
    /// Damage per attack.
    pub attack_damage: i32,
    /// Windup duration in ticks.
    pub windup_ticks: u32,
    /// Active-attack duration in ticks.
    pub attack_ticks: u32,
    /// Post-attack recovery in ticks.
    pub cooldown_ticks: u32,
    /// Movement speed in units per tick.
    pub move_speed: Fix64,
    /// A* fallback path (owned; deep-copied on snapshot).
    pub path: Vec<GridCell>,
}

impl ZombieAi {
    /// Fresh chaser with the given tuning.
    pub fn new(attack_range: Fix64, attack_damage: i32, move_speed: Fix64) -> Self {
        Self {
            target: Entity::NULL,
            state: ZombieState::Chase,
            state_timer: 0,
            attack_range,
            attack_damage,
            windup_ticks: 10,
            attack_ticks: 4,
            cooldown_ticks: 20,
            move_speed,
            path: Vec::new(),
        }
    }
}

// =============================================================================
// MAP STATE
// =============================================================================

/// Obstacle grid used by pathfinding.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct GridMap {
    /// Cells per row.
    pub width: i32,
    /// Cells per column.
    pub height: i32,
    /// World size of one cell.
    pub cell_size: Fix64,
    /// World position of cell (0, 0)'s min corner.
    pub origin: FixVec2,
    /// Blocked cells (owned; deep-copied on snapshot).
    pub obstacles: OrderedSet<GridCell>,
}

impl GridMap {
    /// Empty grid.
    pub fn new(width: i32, height: i32, cell_size: Fix64, origin: FixVec2) -> Self {
        Self {
            width,
            height,
            cell_size,
            origin,
            obstacles: OrderedSet::new(),
        }
    }

    /// Cell containing a world position (may be out of bounds).
    pub fn cell_of(&self, pos: FixVec2) -> GridCell {
        let local = pos - self.origin;
        (
            (local.x / self.cell_size).floor_int() as i32,
            (local.y / self.cell_size).floor_int() as i32,
        )
    }

    /// World-space center of a cell.
    pub fn center_of(&self, cell: GridCell) -> FixVec2 {
        let half = self.cell_size * Fix64::HALF;
        FixVec2::new(
            self.origin.x + self.cell_size * Fix64::from_int(cell.0) + half,
            self.origin.y + self.cell_size * Fix64::from_int(cell.1) + half,
        )
    }

    /// True if the cell lies on the grid.
    pub fn in_bounds(&self, cell: GridCell) -> bool {
        cell.0 >= 0 && cell.0 < self.width && cell.1 >= 0 && cell.1 < self.height
    }

    /// True if the cell is out of bounds or blocked.
    pub fn is_blocked(&self, cell: GridCell) -> bool {
        !self.in_bounds(cell) || self.obstacles.contains(&cell)
    }
}

/// Per-cell movement gradient toward the players, rebuilt on a cooldown.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FlowField {
    /// Cells per row (matches the grid map).
    pub width: i32,
    /// Cells per column.
    pub height: i32,
    /// Unit direction per cell; ZERO where unreachable (owned; deep-copied
    /// on snapshot).
    pub gradient: Vec<FixVec2>,
    /// Ticks until the next rebuild.
    pub cooldown: u32,
}

impl FlowField {
    /// Empty field sized for a grid.
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            gradient: vec![FixVec2::ZERO; (width * height) as usize],
            cooldown: 0,
        }
    }

    /// Gradient at a cell; ZERO when out of bounds or unreachable.
    pub fn at(&self, cell: GridCell) -> FixVec2 {
        if cell.0 < 0 || cell.0 >= self.width || cell.1 < 0 || cell.1 >= self.height {
            return FixVec2::ZERO;
        }
        self.gradient[(cell.1 * self.width + cell.0) as usize]
    }

    /// Set the gradient at an in-bounds cell.
    pub fn set(&mut self, cell: GridCell, dir: FixVec2) {
        if cell.0 >= 0 && cell.0 < self.width && cell.1 >= 0 && cell.1 < self.height {
            self.gradient[(cell.1 * self.width + cell.0) as usize] = dir;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
