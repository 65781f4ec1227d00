//! # Holdfast Lockstep Core
//!
//! Deterministic lockstep simulation core and room server: a client-side
//! predict/rollback engine coupled with a server-side fixed-tick frame
//! broadcaster. Every participant, given the same ordered input stream,
//! computes byte-identical state frame by frame.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     HOLDFAST LOCKSTEP                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/          - Deterministic primitives                  │
//! │  ├── fixed.rs   - Q31.32 fixed-point arithmetic + trig      │
//! │  ├── vec2/3.rs  - Fixed-point vectors                       │
//! │  ├── rng.rs     - Seeded LCG (part of world state)          │
//! │  └── hash.rs    - SHA-256 world digests                     │
//! │                                                             │
//! │  collections/   - Insertion-ordered map/set                 │
//! │  ecs/           - Entities, dense stores, snapshot clone    │
//! │  spatial/       - Quadtree (2D) and BVH (3D) broad phase    │
//! │  physics/       - Narrow phase, impulse solver, substeps    │
//! │  game/          - Components + the ordered system pipeline  │
//! │  rollback/      - Snapshot ring, divergence classifier      │
//! │                                                             │
//! │  net/           - Networking (non-deterministic)            │
//! │  ├── protocol.rs- len+type+protobuf framing, codes 1..7     │
//! │  ├── room.rs    - Join order, input buffer, frame history   │
//! │  └── server.rs  - Accept, assign, 20 Hz tick, broadcast     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! Everything outside `net/` is 100% deterministic:
//! - No floating point in simulation logic
//! - No hash-ordered iteration (insertion-ordered containers throughout)
//! - No wall-clock reads inside the step
//! - All randomness from the seeded LCG, which snapshots with the world
//!
//! Given the same seed and the same ordered inputs, the simulation
//! produces identical digests on any platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod collections;
pub mod core;
pub mod ecs;
pub mod game;
pub mod net;
pub mod physics;
pub mod rollback;
pub mod spatial;

// Re-export commonly used types
pub use crate::core::fixed::Fix64;
pub use crate::core::rng::FixRand;
pub use crate::core::vec2::FixVec2;
pub use crate::core::vec3::FixVec3;
pub use crate::ecs::{Entity, World};
pub use crate::game::{FrameInputs, InputDirection, SimConfig, Simulation};
pub use crate::net::{FrameServer, ServerConfig};
pub use crate::rollback::RollbackController;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lockstep tick rate (Hz).
pub const TICK_RATE: u32 = 20;

/// Lockstep tick interval in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 50;
