//! Fixed-Point 2D Vector
//!
//! Deterministic 2D vector operations for game physics.
//! All operations use fixed-point arithmetic; equality is exact on raw bits.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use super::fixed::Fix64;

/// 2D vector with fixed-point components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FixVec2 {
    /// X component (Q31.32 fixed-point)
    pub x: Fix64,
    /// Y component (Q31.32 fixed-point)
    pub y: Fix64,
}

impl FixVec2 {
    /// Zero vector
    pub const ZERO: Self = Self {
        x: Fix64::ZERO,
        y: Fix64::ZERO,
    };

    /// Unit vector pointing right (+X)
    pub const RIGHT: Self = Self {
        x: Fix64::ONE,
        y: Fix64::ZERO,
    };

    /// Unit vector pointing up (+Y)
    pub const UP: Self = Self {
        x: Fix64::ZERO,
        y: Fix64::ONE,
    };

    /// Unit vector pointing left (-X)
    pub const LEFT: Self = Self {
        x: Fix64(-Fix64::ONE.0),
        y: Fix64::ZERO,
    };

    /// Unit vector pointing down (-Y)
    pub const DOWN: Self = Self {
        x: Fix64::ZERO,
        y: Fix64(-Fix64::ONE.0),
    };

    /// Create a new vector from fixed-point components.
    #[inline]
    pub const fn new(x: Fix64, y: Fix64) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer components.
    #[inline]
    pub const fn from_ints(x: i32, y: i32) -> Self {
        Self {
            x: Fix64::from_int(x),
            y: Fix64::from_int(y),
        }
    }

    /// Scale by a fixed-point scalar.
    #[inline]
    pub fn scale(self, s: Fix64) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
        }
    }

    /// Divide both components by a scalar (zero divisor gives zero).
    #[inline]
    pub fn div_scalar(self, s: Fix64) -> Self {
        Self {
            x: self.x / s,
            y: self.y / s,
        }
    }

    /// Squared length (avoids sqrt - prefer this for comparisons).
    #[inline]
    pub fn length_squared(self) -> Fix64 {
        self.x * self.x + self.y * self.y
    }

    /// Length (magnitude). Prefer `length_squared` when possible.
    #[inline]
    pub fn length(self) -> Fix64 {
        self.length_squared().sqrt()
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(self, other: Self) -> Fix64 {
        (self - other).length_squared()
    }

    /// Distance to another point. Prefer `distance_squared` when possible.
    #[inline]
    pub fn distance(self, other: Self) -> Fix64 {
        self.distance_squared(other).sqrt()
    }

    /// Normalize to unit length. Returns ZERO if length is zero.
    #[inline]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == Fix64::ZERO {
            return Self::ZERO;
        }
        self.div_scalar(len)
    }

    /// Dot product with another vector.
    #[inline]
    pub fn dot(self, other: Self) -> Fix64 {
        self.x * other.x + self.y * other.y
    }

    /// 2D cross product (scalar z-component).
    /// Positive if `other` is counter-clockwise from `self`.
    #[inline]
    pub fn cross(self, other: Self) -> Fix64 {
        self.x * other.y - self.y * other.x
    }

    /// Linear interpolation between two vectors.
    /// `t = 0` returns self, `t = Fix64::ONE` returns other.
    #[inline]
    pub fn lerp(self, other: Self, t: Fix64) -> Self {
        Self {
            x: self.x.lerp(other.x, t),
            y: self.y.lerp(other.y, t),
        }
    }

    /// Clamp the magnitude to at most `max`. Direction is preserved.
    pub fn clamp_magnitude(self, max: Fix64) -> Self {
        if max <= Fix64::ZERO {
            return Self::ZERO;
        }
        let len_sq = self.length_squared();
        if len_sq <= max * max {
            return self;
        }
        self.normalize().scale(max)
    }

    /// Rotate 90 degrees counter-clockwise.
    #[inline]
    pub fn perpendicular(self) -> Self {
        Self {
            x: -self.y,
            y: self.x,
        }
    }

    /// Rotate by an angle in radians.
    pub fn rotate(self, angle: Fix64) -> Self {
        let c = angle.cos();
        let s = angle.sin();
        Self {
            x: self.x * c - self.y * s,
            y: self.x * s + self.y * c,
        }
    }

    /// Convert to a float tuple for rendering.
    #[inline]
    pub fn to_f32s(self) -> (f32, f32) {
        (self.x.to_f32(), self.y.to_f32())
    }
}

impl Add for FixVec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl AddAssign for FixVec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for FixVec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl SubAssign for FixVec2 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul<Fix64> for FixVec2 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Fix64) -> Self {
        self.scale(rhs)
    }
}

impl Neg for FixVec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl fmt::Debug for FixVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (fx, fy) = self.to_f32s();
        write!(f, "Vec2({:.3}, {:.3})", fx, fy)
    }
}

impl fmt::Display for FixVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (fx, fy) = self.to_f32s();
        write!(f, "({:.3}, {:.3})", fx, fy)
    }
}

// =============================================================================
// TESTS
// =============================================================================
