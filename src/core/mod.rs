//! Deterministic primitives: fixed-point scalar and vectors, seeded RNG,
//! and state hashing. Everything in here is bit-identical across platforms.

pub mod fixed;
pub mod hash;
pub mod rng;
pub mod vec2;
pub mod vec3;
