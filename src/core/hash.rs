//! World State Hashing
//!
//! Deterministic SHA-256 digests of simulation state, used by the
//! determinism tests and for divergence diagnostics (two clients logging
//! different digests at the same frame have diverged).
//!
//! Order of updates is critical: every field is written explicitly in a
//! fixed order, little-endian.

use sha2::{Digest, Sha256};

use super::fixed::Fix64;
use super::vec2::FixVec2;
use super::vec3::FixVec3;

/// Digest output type (256 bits / 32 bytes).
pub type WorldDigest = [u8; 32];

/// Deterministic hasher for simulation state.
///
/// Wraps SHA-256 with helpers for fixed-point types.
pub struct WorldHasher {
    hasher: Sha256,
}

impl WorldHasher {
    /// Create a new hasher with a domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create the hasher used for full world digests.
    pub fn for_world() -> Self {
        Self::new(b"HOLDFAST_WORLD_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i32 value (little-endian).
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i64 value (little-endian).
    #[inline]
    pub fn update_i64(&mut self, value: i64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a Fix64 value.
    #[inline]
    pub fn update_fixed(&mut self, value: Fix64) {
        self.update_i64(value.raw());
    }

    /// Update with a FixVec2.
    #[inline]
    pub fn update_vec2(&mut self, value: FixVec2) {
        self.update_fixed(value.x);
        self.update_fixed(value.y);
    }

    /// Update with a FixVec3.
    #[inline]
    pub fn update_vec3(&mut self, value: FixVec3) {
        self.update_fixed(value.x);
        self.update_fixed(value.y);
        self.update_fixed(value.z);
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> WorldDigest {
        self.hasher.finalize().into()
    }
}

/// Hash arbitrary bytes under a domain separator.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> WorldDigest {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}
