//! Collision Shapes
//!
//! Tagged sum of every supported shape. Narrow-phase dispatch is an
//! explicit `match` on the pair of variants; there is no virtual dispatch.
//! Rotation lives on the transform, not the shape.

use serde::{Deserialize, Serialize};

use crate::core::fixed::Fix64;
use crate::core::vec2::FixVec2;
use crate::core::vec3::FixVec3;
use crate::spatial::aabb::{Aabb2, Aabb3};

/// Collision shape variants.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Shape {
    /// 2D circle.
    Circle {
        /// Radius, must be positive.
        radius: Fix64,
    },
    /// 2D rectangle given by full width/height; rotated by the transform.
    Box {
        /// Full width, must be positive.
        width: Fix64,
        /// Full height, must be positive.
        height: Fix64,
    },
    /// 3D sphere.
    Sphere {
        /// Radius, must be positive.
        radius: Fix64,
    },
    /// 3D box given by full extents; oriented by the body basis.
    Box3 {
        /// Full width (x), must be positive.
        width: Fix64,
        /// Full height (y), must be positive.
        height: Fix64,
        /// Full length (z), must be positive.
        length: Fix64,
    },
}

impl Shape {
    /// Circle with a validated radius.
    ///
    /// # Panics
    /// Panics on non-positive dimensions; shapes are constructed at
    /// bootstrap, so this is a fail-fast validation error.
    pub fn circle(radius: Fix64) -> Self {
        assert!(radius > Fix64::ZERO, "circle radius must be positive");
        Self::Circle { radius }
    }

    /// Box with validated extents.
    ///
    /// # Panics
    /// Panics on non-positive dimensions.
    pub fn rect(width: Fix64, height: Fix64) -> Self {
        assert!(
            width > Fix64::ZERO && height > Fix64::ZERO,
            "box dimensions must be positive"
        );
        Self::Box { width, height }
    }

    /// Sphere with a validated radius.
    ///
    /// # Panics
    /// Panics on non-positive dimensions.
    pub fn sphere(radius: Fix64) -> Self {
        assert!(radius > Fix64::ZERO, "sphere radius must be positive");
        Self::Sphere { radius }
    }

    /// 3D box with validated extents.
    ///
    /// # Panics
    /// Panics on non-positive dimensions.
    pub fn box3(width: Fix64, height: Fix64, length: Fix64) -> Self {
        assert!(
            width > Fix64::ZERO && height > Fix64::ZERO && length > Fix64::ZERO,
            "box dimensions must be positive"
        );
        Self::Box3 {
            width,
            height,
            length,
        }
    }

    /// World-space AABB of a 2D shape at `position` with `rotation`.
    ///
    /// Rotated boxes use the exact rotated-extent bound
    /// `(|w·cosθ| + |h·sinθ|) / 2` per axis.
    pub fn aabb2(self, position: FixVec2, rotation: Fix64) -> Aabb2 {
        match self {
            Shape::Circle { radius } => {
                Aabb2::from_center(position, FixVec2::new(radius, radius))
            }
            Shape::Box { width, height } => {
                let half = if rotation == Fix64::ZERO {
                    FixVec2::new(width * Fix64::HALF, height * Fix64::HALF)
                } else {
                    let c = rotation.cos().abs();
                    let s = rotation.sin().abs();
                    FixVec2::new(
                        (width * c + height * s) * Fix64::HALF,
                        (width * s + height * c) * Fix64::HALF,
                    )
                };
                Aabb2::from_center(position, half)
            }
            // 3D shapes have no 2D footprint; degenerate point bounds.
            Shape::Sphere { .. } | Shape::Box3 { .. } => Aabb2::from_center(position, FixVec2::ZERO),
        }
    }

    /// World-space AABB of a 3D shape at `position` oriented by `basis`.
    pub fn aabb3(self, position: FixVec3, basis: Basis3) -> Aabb3 {
        match self {
            Shape::Sphere { radius } => {
                Aabb3::from_center(position, FixVec3::new(radius, radius, radius))
            }
            Shape::Box3 {
                width,
                height,
                length,
            } => {
                let hx = width * Fix64::HALF;
                let hy = height * Fix64::HALF;
                let hz = length * Fix64::HALF;
                // Projected extent per world axis: sum of |basis column| · half.
                let ex = (basis.x.x.abs() * hx) + (basis.y.x.abs() * hy) + (basis.z.x.abs() * hz);
                let ey = (basis.x.y.abs() * hx) + (basis.y.y.abs() * hy) + (basis.z.y.abs() * hz);
                let ez = (basis.x.z.abs() * hx) + (basis.y.z.abs() * hy) + (basis.z.z.abs() * hz);
                Aabb3::from_center(position, FixVec3::new(ex, ey, ez))
            }
            Shape::Circle { radius } => {
                Aabb3::from_center(position, FixVec3::new(radius, radius, radius))
            }
            Shape::Box { width, height } => Aabb3::from_center(
                position,
                FixVec3::new(width * Fix64::HALF, height * Fix64::HALF, Fix64::ZERO),
            ),
        }
    }
}

/// Orthonormal basis of an oriented 3D body (local axes in world space).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Basis3 {
    /// Local X axis.
    pub x: FixVec3,
    /// Local Y axis.
    pub y: FixVec3,
    /// Local Z axis.
    pub z: FixVec3,
}

impl Default for Basis3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Basis3 {
    /// World-aligned identity basis.
    pub const IDENTITY: Self = Self {
        x: FixVec3::X,
        y: FixVec3::Y,
        z: FixVec3::Z,
    };

    /// Rotation about the world Y axis.
    pub fn from_yaw(angle: Fix64) -> Self {
        let c = angle.cos();
        let s = angle.sin();
        Self {
            x: FixVec3::new(c, Fix64::ZERO, -s),
            y: FixVec3::Y,
            z: FixVec3::new(s, Fix64::ZERO, c),
        }
    }

    /// Axis by index: 0 = x, 1 = y, 2 = z.
    #[inline]
    pub fn axis(self, i: usize) -> FixVec3 {
        match i {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Project a world-space vector into this basis (inverse rotate).
    #[inline]
    pub fn to_local(self, v: FixVec3) -> FixVec3 {
        FixVec3::new(v.dot(self.x), v.dot(self.y), v.dot(self.z))
    }

    /// Map a basis-local vector back into world space.
    #[inline]
    pub fn to_world(self, v: FixVec3) -> FixVec3 {
        self.x.scale(v.x) + self.y.scale(v.y) + self.z.scale(v.z)
    }
}
