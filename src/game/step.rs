//! Simulation Step
//!
//! The fixed, explicitly ordered system pipeline: one call per stage.
//! The stage order is part of the determinism contract. The pipeline is
//! single-threaded; no system observes another system's partial writes,
//! and a step either completes or the process aborts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::fixed::Fix64;
use crate::ecs::world::World;
use crate::game::effects::{
    apply_collision_effects, clear_collisions, run_deaths, update_explosions, update_stiff_timers,
};
use crate::game::input::FrameInputs;
use crate::game::pathing::update_pathing;
use crate::game::player::{apply_inputs, apply_movement, run_player_actions};
use crate::game::zombie::run_zombie_ai;
use crate::physics::layers::LayerMatrix;
use crate::physics::step::{PhysicsConfig, PhysicsPipeline};

/// Simulation tuning, fixed at room construction. Every client in a room
/// must run the same values; they feed the deterministic step directly.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SimConfig {
    /// Physics integration and broad-phase parameters.
    pub physics: PhysicsConfig,

    /// Player movement speed, units per tick.
    pub player_move_speed: Fix64,
    /// Player hit points.
    pub player_hp: i32,
    /// Player body radius.
    pub player_radius: Fix64,
    /// Ticks between shots.
    pub shoot_cooldown: u32,
    /// Ticks between placements.
    pub place_cooldown: u32,

    /// Bullet muzzle speed, units per tick.
    pub bullet_speed: Fix64,
    /// Bullet damage.
    pub bullet_damage: i32,
    /// Bullet body radius.
    pub bullet_radius: Fix64,
    /// Bullet lifetime in ticks.
    pub bullet_lifetime: u32,
    /// Distance from the shooter at which bullets appear.
    pub bullet_spawn_offset: Fix64,

    /// Wall side length.
    pub wall_size: Fix64,
    /// Wall hit points.
    pub wall_hp: i32,
    /// Distance ahead of the player at which walls/barrels are placed.
    pub wall_place_distance: Fix64,

    /// Barrel body radius.
    pub barrel_radius: Fix64,
    /// Barrel hit points.
    pub barrel_hp: i32,

    /// Explosion blast radius.
    pub explosion_radius: Fix64,
    /// Explosion damage.
    pub explosion_damage: i32,
    /// Ticks from spawn to detonation.
    pub explosion_fuse: u32,

    /// Zombie attack trigger range.
    pub zombie_attack_range: Fix64,
    /// Zombie attack damage.
    pub zombie_attack_damage: i32,
    /// Zombie movement speed, units per tick.
    pub zombie_move_speed: Fix64,
    /// Stun applied by zombie hits, in ticks.
    pub zombie_stiff_ticks: u32,
    /// Zombie hit points.
    pub zombie_hp: i32,
    /// Zombies spawned at bootstrap.
    pub zombie_count: u32,
    /// Barrels spawned at bootstrap.
    pub barrel_count: u32,

    /// Ticks between flow-field rebuilds.
    pub flow_field_interval: u32,
    /// Snapshot ring capacity for the rollback controller.
    pub max_snapshots: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            physics: PhysicsConfig::default(),

            player_move_speed: Fix64::from_ratio(1, 4),
            player_hp: 100,
            player_radius: Fix64::HALF,
            shoot_cooldown: 6,
            place_cooldown: 20,

            bullet_speed: Fix64::ONE,
            bullet_damage: 10,
            bullet_radius: Fix64::from_ratio(1, 8),
            bullet_lifetime: 60,
            bullet_spawn_offset: Fix64::ONE,

            wall_size: Fix64::ONE,
            wall_hp: 50,
            wall_place_distance: Fix64::from_ratio(3, 2),

            barrel_radius: Fix64::HALF,
            barrel_hp: 30,

            explosion_radius: Fix64::from_int(3),
            explosion_damage: 40,
            explosion_fuse: 10,

            zombie_attack_range: Fix64::ONE,
            zombie_attack_damage: 8,
            zombie_move_speed: Fix64::from_ratio(3, 16),
            zombie_stiff_ticks: 10,
            zombie_hp: 40,
            zombie_count: 6,
            barrel_count: 4,

            flow_field_interval: 10,
            max_snapshots: 100,
        }
    }
}

/// A deterministic simulation instance: the snapshottable world plus the
/// derived physics state (quadtree, layer matrix), which is rebuilt from
/// components and never snapshotted.
pub struct Simulation {
    /// The complete, snapshottable game state.
    pub world: World,
    /// Physics driver with derived broad-phase state.
    pub physics: PhysicsPipeline,
    /// Tuning constants.
    pub config: SimConfig,
}

impl Simulation {
    /// Empty simulation (no entities). Use [`crate::game::setup`] for a
    /// playable room.
    pub fn new(config: SimConfig, layers: LayerMatrix, seed: i64) -> Self {
        Self {
            world: World::new(seed),
            physics: PhysicsPipeline::new(config.physics, layers),
            config,
        }
    }

    /// Advance one tick with this frame's inputs.
    ///
    /// The stage order is the determinism contract; never reorder.
    pub fn execute(&mut self, inputs: &FrameInputs) {
        // 1. InputApply
        apply_inputs(&mut self.world, inputs);
        // 2. PlayerAction
        run_player_actions(&mut self.world, &self.config);
        // 3. ZombieAI
        run_zombie_ai(&mut self.world, &self.config);
        // 4. Pathfinding
        update_pathing(&mut self.world, self.config.flow_field_interval);
        // 5. Movement
        apply_movement(&mut self.world);
        // 6. PhysicsStep
        self.physics.step(&mut self.world);
        // 7. CollisionEffects
        apply_collision_effects(&mut self.world, &self.config);
        // 8. Explosion lifetime
        update_explosions(&mut self.world, self.physics.quadtree());
        // 9. StiffTimers
        update_stiff_timers(&mut self.world);
        // 10. DeathSystem
        run_deaths(&mut self.world, &self.config);
        // 11. Cleanup
        clear_collisions(&mut self.world);
    }

    /// Run a recorded input script: frame number → inputs, from the
    /// current state through `frames` ticks. Frames with no entry run
    /// with empty inputs.
    pub fn run_script(&mut self, script: &BTreeMap<u64, FrameInputs>, frames: u64) {
        let empty = FrameInputs::new();
        for frame in 1..=frames {
            let inputs = script.get(&frame).unwrap_or(&empty);
            self.execute(inputs);
        }
    }

    /// Derived world-space bounds of an entity, for debug overlays.
    pub fn entity_bounds(&self, e: crate::ecs::entity::Entity) -> Option<crate::spatial::Aabb2> {
        let t = self.world.get::<crate::game::components::Transform2D>(e)?;
        let s = self.world.get::<crate::game::components::CollisionShape>(e)?;
        Some(s.shape.aabb2(t.position, t.rotation))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::InputDirection;
    use crate::game::setup::bootstrap_room;

    fn scripted_inputs(players: &[u32], frames: u64) -> BTreeMap<u64, FrameInputs> {
        let mut script = BTreeMap::new();
        for frame in 1..=frames {
            let mut inputs = FrameInputs::new();
            for (i, pid) in players.iter().enumerate() {
                let dir = match (frame as usize + i) % 5 {
                    0 => InputDirection::Up,
                    1 => InputDirection::Right,
                    2 => InputDirection::Fire,
                    3 => InputDirection::Down,
                    _ => InputDirection::Left,
                };
                inputs.insert(*pid, dir);
            }
            script.insert(frame, inputs);
        }
        script
    }

    #[test]
    fn test_execute_determinism() {
        // Property 1: identical states under identical inputs evolve
        // bit-identically.
        let players = [1u32, 2];
        let mut a = bootstrap_room(SimConfig::default(), 12345, &players);
        let mut b = bootstrap_room(SimConfig::default(), 12345, &players);
        assert_eq!(a.world, b.world);

        let script = scripted_inputs(&players, 60);
        a.run_script(&script, 60);
        b.run_script(&script, 60);

        assert_eq!(a.world, b.world);
        assert_eq!(a.world.digest(), b.world.digest());
    }

    #[test]
    fn test_snapshot_forward_equivalence() {
        // Property 2: a clone evolved under the same inputs matches the
        // original's forward evolution.
        let players = [1u32, 2];
        let mut sim = bootstrap_room(SimConfig::default(), 777, &players);
        let script = scripted_inputs(&players, 40);
        sim.run_script(&script, 20);

        let snapshot = sim.world.clone();

        // Evolve the original 20 more frames
        let empty = FrameInputs::new();
        for frame in 21..=40 {
            let inputs = script.get(&frame).unwrap_or(&empty);
            sim.execute(inputs);
        }
        let final_digest = sim.world.digest();

        // Restore and re-run the same frames
        sim.world.restore_from(&snapshot);
        for frame in 21..=40 {
            let inputs = script.get(&frame).unwrap_or(&empty);
            sim.execute(inputs);
        }
        assert_eq!(sim.world.digest(), final_digest);
    }

    #[test]
    fn test_fire_input_produces_bullets() {
        let players = [7u32];
        let mut sim = bootstrap_room(SimConfig::default(), 9, &players);
        let mut inputs = FrameInputs::new();
        inputs.insert(7, InputDirection::Fire);
        sim.execute(&inputs);
        assert!(sim.world.bullets.len() >= 1);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let players = [1u32];
        let a = bootstrap_room(SimConfig::default(), 1, &players);
        let b = bootstrap_room(SimConfig::default(), 2, &players);
        assert_ne!(a.world.digest(), b.world.digest());
    }
}
