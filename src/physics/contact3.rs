//! 3D Narrow Phase
//!
//! Sphere and oriented-box tests producing a [`Contact3`]. Box/box runs
//! SAT over the 15 candidate axes (3 + 3 face normals plus the 9 edge
//! cross products); near-zero cross axes from parallel edges are skipped.

use crate::core::fixed::Fix64;
use crate::core::vec3::FixVec3;
use crate::physics::shape::{Basis3, Shape};

/// Result of a 3D narrow-phase test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contact3 {
    /// Representative contact point.
    pub point: FixVec3,
    /// Unit normal, pointing from A toward B.
    pub normal: FixVec3,
    /// Overlap depth along the normal (positive).
    pub penetration: Fix64,
}

/// Cross-product axes below this squared length are treated as degenerate.
const AXIS_EPS_SQ: Fix64 = Fix64::from_raw(1 << 16);

/// Test two placed 3D shapes. Returns None for non-3D shape pairs.
pub fn contact3(
    shape_a: Shape,
    pos_a: FixVec3,
    basis_a: Basis3,
    shape_b: Shape,
    pos_b: FixVec3,
    basis_b: Basis3,
) -> Option<Contact3> {
    match (shape_a, shape_b) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            sphere_sphere(pos_a, ra, pos_b, rb)
        }
        (Shape::Sphere { radius }, Shape::Box3 { .. }) => {
            sphere_box3(pos_a, radius, shape_b, pos_b, basis_b)
        }
        (Shape::Box3 { .. }, Shape::Sphere { radius }) => {
            sphere_box3(pos_b, radius, shape_a, pos_a, basis_a).map(|c| Contact3 {
                point: c.point,
                normal: -c.normal,
                penetration: c.penetration,
            })
        }
        (Shape::Box3 { .. }, Shape::Box3 { .. }) => {
            box3_box3(shape_a, pos_a, basis_a, shape_b, pos_b, basis_b)
        }
        _ => None,
    }
}

/// Sphere vs sphere.
pub fn sphere_sphere(pos_a: FixVec3, ra: Fix64, pos_b: FixVec3, rb: Fix64) -> Option<Contact3> {
    let delta = pos_b - pos_a;
    let combined = ra + rb;
    let dist_sq = delta.length_squared();
    if dist_sq > combined * combined {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist == Fix64::ZERO {
        FixVec3::X
    } else {
        delta.div_scalar(dist)
    };
    let penetration = combined - dist;
    Some(Contact3 {
        point: pos_a + normal.scale(ra - penetration * Fix64::HALF),
        normal,
        penetration,
    })
}

/// Sphere (A) vs oriented box (B).
pub fn sphere_box3(
    sphere_pos: FixVec3,
    radius: Fix64,
    box_shape: Shape,
    box_pos: FixVec3,
    basis: Basis3,
) -> Option<Contact3> {
    let Shape::Box3 {
        width,
        height,
        length,
    } = box_shape
    else {
        return None;
    };
    let half = FixVec3::new(
        width * Fix64::HALF,
        height * Fix64::HALF,
        length * Fix64::HALF,
    );

    let local = basis.to_local(sphere_pos - box_pos);
    let closest = FixVec3::new(
        local.x.clamp(-half.x, half.x),
        local.y.clamp(-half.y, half.y),
        local.z.clamp(-half.z, half.z),
    );
    let delta = local - closest;
    let dist_sq = delta.length_squared();

    if dist_sq > Fix64::ZERO {
        if dist_sq > radius * radius {
            return None;
        }
        let dist = dist_sq.sqrt();
        let normal_local = -delta.div_scalar(dist.max(Fix64::from_raw(1)));
        Some(Contact3 {
            point: box_pos + basis.to_world(closest),
            normal: basis.to_world(normal_local),
            penetration: radius - dist,
        })
    } else {
        // Center inside: exit along the face with the smallest clearance.
        let exits = [
            (half.x - local.x, FixVec3::X),
            (local.x + half.x, -FixVec3::X),
            (half.y - local.y, FixVec3::Y),
            (local.y + half.y, -FixVec3::Y),
            (half.z - local.z, FixVec3::Z),
            (local.z + half.z, -FixVec3::Z),
        ];
        let mut best = exits[0];
        for e in &exits[1..] {
            if e.0 < best.0 {
                best = *e;
            }
        }
        Some(Contact3 {
            point: box_pos + basis.to_world(local),
            normal: basis.to_world(-best.1),
            penetration: best.0 + radius,
        })
    }
}

/// Oriented box vs oriented box: SAT over 15 axes.
pub fn box3_box3(
    shape_a: Shape,
    pos_a: FixVec3,
    basis_a: Basis3,
    shape_b: Shape,
    pos_b: FixVec3,
    basis_b: Basis3,
) -> Option<Contact3> {
    let (Shape::Box3 {
        width: wa,
        height: ha,
        length: la,
    }, Shape::Box3 {
        width: wb,
        height: hb,
        length: lb,
    }) = (shape_a, shape_b)
    else {
        return None;
    };
    let half_a = FixVec3::new(wa * Fix64::HALF, ha * Fix64::HALF, la * Fix64::HALF);
    let half_b = FixVec3::new(wb * Fix64::HALF, hb * Fix64::HALF, lb * Fix64::HALF);
    let d = pos_b - pos_a;

    let mut best_overlap = Fix64::MAX;
    let mut best_axis = FixVec3::ZERO;

    let mut test_axis = |axis: FixVec3| -> bool {
        // Skip near-zero axes (parallel edge cross products).
        let len_sq = axis.length_squared();
        if len_sq < AXIS_EPS_SQ {
            return true;
        }
        let axis = axis.div_scalar(len_sq.sqrt());
        let ra = basis_a.x.dot(axis).abs() * half_a.x
            + basis_a.y.dot(axis).abs() * half_a.y
            + basis_a.z.dot(axis).abs() * half_a.z;
        let rb = basis_b.x.dot(axis).abs() * half_b.x
            + basis_b.y.dot(axis).abs() * half_b.y
            + basis_b.z.dot(axis).abs() * half_b.z;
        let overlap = ra + rb - d.dot(axis).abs();
        if overlap <= Fix64::ZERO {
            return false; // separating axis
        }
        if overlap < best_overlap {
            best_overlap = overlap;
            best_axis = axis;
        }
        true
    };

    // 3 + 3 face normals
    for i in 0..3 {
        if !test_axis(basis_a.axis(i)) {
            return None;
        }
    }
    for i in 0..3 {
        if !test_axis(basis_b.axis(i)) {
            return None;
        }
    }
    // 9 edge cross products
    for i in 0..3 {
        for j in 0..3 {
            if !test_axis(basis_a.axis(i).cross(basis_b.axis(j))) {
                return None;
            }
        }
    }

    let normal = if d.dot(best_axis) >= Fix64::ZERO {
        best_axis
    } else {
        -best_axis
    };
    Some(Contact3 {
        point: pos_a + d.scale(Fix64::HALF),
        normal,
        penetration: best_overlap,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_sphere() {
        let c = sphere_sphere(
            FixVec3::ZERO,
            Fix64::ONE,
            FixVec3::new(Fix64::from_ratio(3, 2), Fix64::ZERO, Fix64::ZERO),
            Fix64::ONE,
        )
        .unwrap();
        assert_eq!(c.normal, FixVec3::X);
        assert_eq!(c.penetration, Fix64::HALF);
        assert!(sphere_sphere(
            FixVec3::ZERO,
            Fix64::ONE,
            FixVec3::from_ints(3, 0, 0),
            Fix64::ONE
        )
        .is_none());
    }

    #[test]
    fn test_sphere_box_face_hit() {
        let shape = Shape::box3(Fix64::TWO, Fix64::TWO, Fix64::TWO);
        let c = sphere_box3(
            FixVec3::new(-Fix64::from_ratio(3, 2), Fix64::ZERO, Fix64::ZERO),
            Fix64::ONE,
            shape,
            FixVec3::ZERO,
            Basis3::IDENTITY,
        )
        .unwrap();
        assert_eq!(c.normal, FixVec3::X);
        assert_eq!(c.penetration, Fix64::HALF);
    }

    #[test]
    fn test_sphere_box_center_inside() {
        let shape = Shape::box3(Fix64::TWO, Fix64::TWO, Fix64::TWO);
        let c = sphere_box3(
            FixVec3::new(Fix64::from_ratio(3, 4), Fix64::ZERO, Fix64::ZERO),
            Fix64::HALF,
            shape,
            FixVec3::ZERO,
            Basis3::IDENTITY,
        )
        .unwrap();
        // Exit through +X face; normal A→B points back into the box.
        assert_eq!(c.normal, -FixVec3::X);
        assert_eq!(c.penetration, Fix64::from_ratio(3, 4));
    }

    #[test]
    fn test_box_box_aligned() {
        let a = Shape::box3(Fix64::TWO, Fix64::TWO, Fix64::TWO);
        let b = Shape::box3(Fix64::TWO, Fix64::TWO, Fix64::TWO);
        let c = box3_box3(
            a,
            FixVec3::ZERO,
            Basis3::IDENTITY,
            b,
            FixVec3::new(Fix64::from_ratio(3, 2), Fix64::ZERO, Fix64::ZERO),
            Basis3::IDENTITY,
        )
        .unwrap();
        assert_eq!(c.normal, FixVec3::X);
        assert_eq!(c.penetration, Fix64::HALF);
    }

    #[test]
    fn test_box_box_rotated() {
        let a = Shape::box3(Fix64::TWO, Fix64::TWO, Fix64::TWO);
        let b = Shape::box3(Fix64::TWO, Fix64::TWO, Fix64::TWO);
        let yawed = Basis3::from_yaw(Fix64::QUARTER_PI);
        // Close enough to overlap even rotated
        let hit = box3_box3(
            a,
            FixVec3::ZERO,
            Basis3::IDENTITY,
            b,
            FixVec3::from_ints(2, 0, 0),
            yawed,
        );
        assert!(hit.is_some());
        let c = hit.unwrap();
        assert!(c.penetration > Fix64::ZERO);
        assert!((c.normal.length() - Fix64::ONE).abs().raw() < 1 << 22);

        // Far apart: separated
        assert!(box3_box3(
            a,
            FixVec3::ZERO,
            Basis3::IDENTITY,
            b,
            FixVec3::from_ints(5, 0, 0),
            yawed,
        )
        .is_none());
    }

    #[test]
    fn test_parallel_edges_skip_degenerate_axes() {
        // Identical bases make all 9 cross products zero; the face normals
        // alone must decide.
        let a = Shape::box3(Fix64::ONE, Fix64::ONE, Fix64::ONE);
        let c = box3_box3(
            a,
            FixVec3::ZERO,
            Basis3::IDENTITY,
            a,
            FixVec3::new(Fix64::HALF, Fix64::ZERO, Fix64::ZERO),
            Basis3::IDENTITY,
        );
        assert!(c.is_some());
    }

    #[test]
    fn test_dispatch_flip() {
        let sphere = Shape::sphere(Fix64::ONE);
        let box3 = Shape::box3(Fix64::TWO, Fix64::TWO, Fix64::TWO);
        let sphere_pos = FixVec3::new(-Fix64::from_ratio(3, 2), Fix64::ZERO, Fix64::ZERO);

        let ab = contact3(
            sphere,
            sphere_pos,
            Basis3::IDENTITY,
            box3,
            FixVec3::ZERO,
            Basis3::IDENTITY,
        )
        .unwrap();
        let ba = contact3(
            box3,
            FixVec3::ZERO,
            Basis3::IDENTITY,
            sphere,
            sphere_pos,
            Basis3::IDENTITY,
        )
        .unwrap();
        assert_eq!(ab.normal, -ba.normal);
    }
}
