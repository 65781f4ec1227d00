//! Axis-Aligned Bounding Boxes
//!
//! Fixed-point AABBs in 2D and 3D. Overlap tests are inclusive on faces:
//! two boxes sharing an edge count as overlapping, which keeps resting
//! contacts alive in the broad phase.

use serde::{Deserialize, Serialize};

use crate::core::fixed::Fix64;
use crate::core::vec2::FixVec2;
use crate::core::vec3::FixVec3;

/// 2D axis-aligned bounding box.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Aabb2 {
    /// Lower-left corner.
    pub min: FixVec2,
    /// Upper-right corner.
    pub max: FixVec2,
}

impl Aabb2 {
    /// Create from corners.
    #[inline]
    pub const fn new(min: FixVec2, max: FixVec2) -> Self {
        Self { min, max }
    }

    /// Create from integer min corner and size.
    #[inline]
    pub const fn from_ints(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min: FixVec2::from_ints(min_x, min_y),
            max: FixVec2::from_ints(max_x, max_y),
        }
    }

    /// Create from a center point and half extents.
    #[inline]
    pub fn from_center(center: FixVec2, half: FixVec2) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Center point.
    #[inline]
    pub fn center(self) -> FixVec2 {
        FixVec2::new(
            (self.min.x + self.max.x) * Fix64::HALF,
            (self.min.y + self.max.y) * Fix64::HALF,
        )
    }

    /// Half extents.
    #[inline]
    pub fn half_extents(self) -> FixVec2 {
        FixVec2::new(
            (self.max.x - self.min.x) * Fix64::HALF,
            (self.max.y - self.min.y) * Fix64::HALF,
        )
    }

    /// Inclusive overlap test.
    #[inline]
    pub fn overlaps(self, other: Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// True if `other` lies entirely inside self.
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
    }

    /// True if the point lies inside (inclusive).
    #[inline]
    pub fn contains_point(self, p: FixVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Smallest box containing both.
    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: FixVec2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: FixVec2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Scale about the center.
    pub fn scaled(self, factor: Fix64) -> Self {
        let center = self.center();
        let half = FixVec2::new(
            self.half_extents().x * factor,
            self.half_extents().y * factor,
        );
        Self::from_center(center, half)
    }
}

/// 3D axis-aligned bounding box.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: FixVec3,
    /// Maximum corner.
    pub max: FixVec3,
}

impl Aabb3 {
    /// Create from corners.
    #[inline]
    pub const fn new(min: FixVec3, max: FixVec3) -> Self {
        Self { min, max }
    }

    /// Create from a center point and half extents.
    #[inline]
    pub fn from_center(center: FixVec3, half: FixVec3) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Center point.
    #[inline]
    pub fn center(self) -> FixVec3 {
        FixVec3::new(
            (self.min.x + self.max.x) * Fix64::HALF,
            (self.min.y + self.max.y) * Fix64::HALF,
            (self.min.z + self.max.z) * Fix64::HALF,
        )
    }

    /// Full extent along an axis (0 = x, 1 = y, 2 = z).
    #[inline]
    pub fn extent(self, axis: usize) -> Fix64 {
        self.max.axis(axis) - self.min.axis(axis)
    }

    /// Index of the longest axis.
    pub fn longest_axis(self) -> usize {
        let ex = self.extent(0);
        let ey = self.extent(1);
        let ez = self.extent(2);
        if ex >= ey && ex >= ez {
            0
        } else if ey >= ez {
            1
        } else {
            2
        }
    }

    /// Inclusive overlap test.
    #[inline]
    pub fn overlaps(self, other: Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// True if `other` lies entirely inside self.
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
            && self.max.z >= other.max.z
    }

    /// Smallest box containing both.
    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: FixVec3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: FixVec3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_inclusive() {
        let a = Aabb2::from_ints(0, 0, 2, 2);
        let b = Aabb2::from_ints(2, 0, 4, 2); // shares an edge
        let c = Aabb2::from_ints(3, 3, 4, 4);
        assert!(a.overlaps(b));
        assert!(!a.overlaps(c));
    }

    #[test]
    fn test_union_contains() {
        let a = Aabb2::from_ints(0, 0, 1, 1);
        let b = Aabb2::from_ints(3, 3, 5, 5);
        let u = a.union(b);
        assert_eq!(u, Aabb2::from_ints(0, 0, 5, 5));
        assert!(u.contains(a));
        assert!(u.contains(b));
        assert!(!a.contains(u));
    }

    #[test]
    fn test_scaled_about_center() {
        let a = Aabb2::from_ints(-2, -2, 2, 2);
        let s = a.scaled(Fix64::from_ratio(3, 2));
        assert_eq!(s, Aabb2::from_ints(-3, -3, 3, 3));
        assert_eq!(s.center(), a.center());
    }

    #[test]
    fn test_center_half_extents() {
        let a = Aabb2::from_ints(0, 0, 4, 2);
        assert_eq!(a.center(), FixVec2::from_ints(2, 1));
        assert_eq!(a.half_extents(), FixVec2::from_ints(2, 1));
    }

    #[test]
    fn test_aabb3_longest_axis() {
        let a = Aabb3::new(FixVec3::ZERO, FixVec3::from_ints(1, 5, 3));
        assert_eq!(a.longest_axis(), 1);
        let b = Aabb3::new(FixVec3::ZERO, FixVec3::from_ints(2, 2, 2));
        assert_eq!(b.longest_axis(), 0); // ties break toward x
    }

    #[test]
    fn test_aabb3_overlap() {
        let a = Aabb3::new(FixVec3::ZERO, FixVec3::from_ints(2, 2, 2));
        let b = Aabb3::new(FixVec3::from_ints(1, 1, 1), FixVec3::from_ints(3, 3, 3));
        let c = Aabb3::new(FixVec3::from_ints(5, 5, 5), FixVec3::from_ints(6, 6, 6));
        assert!(a.overlaps(b));
        assert!(!a.overlaps(c));
        assert!(a.union(b).contains(a));
    }
}
