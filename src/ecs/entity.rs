//! Entity Identifiers
//!
//! Opaque 32-bit ids, monotonically allocated per world and never reused
//! within a session. Zero is the invalid sentinel.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque entity id. `Entity::NULL` (0) is never a live entity.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Entity(pub u32);

impl Entity {
    /// The invalid sentinel.
    pub const NULL: Self = Self(0);

    /// Raw id value.
    #[inline]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// True for any id other than the sentinel.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Entity({})", self.0)
        } else {
            write!(f, "Entity(NULL)")
        }
    }
}
