//! Fixed-Point 3D Vector
//!
//! The 3D counterpart of [`FixVec2`](super::vec2::FixVec2), used by the
//! BVH broad phase and the 3D physics world.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use super::fixed::Fix64;

/// 3D vector with fixed-point components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FixVec3 {
    /// X component
    pub x: Fix64,
    /// Y component
    pub y: Fix64,
    /// Z component
    pub z: Fix64,
}

impl FixVec3 {
    /// Zero vector
    pub const ZERO: Self = Self {
        x: Fix64::ZERO,
        y: Fix64::ZERO,
        z: Fix64::ZERO,
    };

    /// Unit X axis
    pub const X: Self = Self {
        x: Fix64::ONE,
        y: Fix64::ZERO,
        z: Fix64::ZERO,
    };

    /// Unit Y axis
    pub const Y: Self = Self {
        x: Fix64::ZERO,
        y: Fix64::ONE,
        z: Fix64::ZERO,
    };

    /// Unit Z axis
    pub const Z: Self = Self {
        x: Fix64::ZERO,
        y: Fix64::ZERO,
        z: Fix64::ONE,
    };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: Fix64, y: Fix64, z: Fix64) -> Self {
        Self { x, y, z }
    }

    /// Create from integer components.
    #[inline]
    pub const fn from_ints(x: i32, y: i32, z: i32) -> Self {
        Self {
            x: Fix64::from_int(x),
            y: Fix64::from_int(y),
            z: Fix64::from_int(z),
        }
    }

    /// Component by axis index: 0 = x, 1 = y, 2 = z.
    #[inline]
    pub fn axis(self, i: usize) -> Fix64 {
        match i {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Scale by a scalar.
    #[inline]
    pub fn scale(self, s: Fix64) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    /// Divide by a scalar (zero divisor gives zero).
    #[inline]
    pub fn div_scalar(self, s: Fix64) -> Self {
        Self {
            x: self.x / s,
            y: self.y / s,
            z: self.z / s,
        }
    }

    /// Squared length.
    #[inline]
    pub fn length_squared(self) -> Fix64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Length. Prefer `length_squared` when possible.
    #[inline]
    pub fn length(self) -> Fix64 {
        self.length_squared().sqrt()
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(self, other: Self) -> Fix64 {
        (self - other).length_squared()
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

    /// Dot product.
    #[inline]
    pub fn dot(self, other: Self) -> Fix64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    #[inline]
    pub fn cross(self, other: Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    /// Linear interpolation.
    #[inline]
    pub fn lerp(self, other: Self, t: Fix64) -> Self {
        Self {
            x: self.x.lerp(other.x, t),
            y: self.y.lerp(other.y, t),
            z: self.z.lerp(other.z, t),
        }
    }

    /// Clamp the magnitude to at most `max`.
    pub fn clamp_magnitude(self, max: Fix64) -> Self {
        if max <= Fix64::ZERO {
            return Self::ZERO;
        }
        if self.length_squared() <= max * max {
            return self;
        }
        self.normalize().scale(max)
    }
}

impl Add for FixVec3 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl AddAssign for FixVec3 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for FixVec3 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl SubAssign for FixVec3 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul<Fix64> for FixVec3 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Fix64) -> Self {
        self.scale(rhs)
    }
}

impl Neg for FixVec3 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

impl fmt::Debug for FixVec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Vec3({:.3}, {:.3}, {:.3})",
            self.x.to_f32(),
            self.y.to_f32(),
            self.z.to_f32()
        )
    }
}
