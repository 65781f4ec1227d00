//! 2D Narrow Phase
//!
//! Exact shape-vs-shape tests producing a [`Contact2`]: contact point,
//! unit normal pointing from A toward B, and penetration depth. Dispatch
//! is an explicit match over the shape pair. The solver has no angular
//! dynamics, so the contact point is informational (debug draws, effects)
//! and the normal/penetration carry the response.

use crate::core::fixed::Fix64;
use crate::core::vec2::FixVec2;
use crate::physics::shape::Shape;

/// Result of a 2D narrow-phase test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contact2 {
    /// Representative contact point.
    pub point: FixVec2,
    /// Unit normal, pointing from A toward B.
    pub normal: FixVec2,
    /// Overlap depth along the normal (positive).
    pub penetration: Fix64,
}

/// Test two placed shapes. Returns None for non-2D shape pairs.
pub fn contact(
    shape_a: Shape,
    pos_a: FixVec2,
    rot_a: Fix64,
    shape_b: Shape,
    pos_b: FixVec2,
    rot_b: Fix64,
) -> Option<Contact2> {
    match (shape_a, shape_b) {
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            circle_circle(pos_a, ra, pos_b, rb)
        }
        (Shape::Circle { radius }, Shape::Box { width, height }) => {
            circle_box(pos_a, radius, pos_b, width, height, rot_b)
        }
        (Shape::Box { width, height }, Shape::Circle { radius }) => {
            circle_box(pos_b, radius, pos_a, width, height, rot_a).map(Contact2::flipped)
        }
        (
            Shape::Box {
                width: wa,
                height: ha,
            },
            Shape::Box {
                width: wb,
                height: hb,
            },
        ) => {
            if rot_a == Fix64::ZERO && rot_b == Fix64::ZERO {
                box_box_aligned(pos_a, wa, ha, pos_b, wb, hb)
            } else {
                box_box_sat(pos_a, wa, ha, rot_a, pos_b, wb, hb, rot_b)
            }
        }
        // 3D shapes never meet the 2D narrow phase.
        _ => None,
    }
}

impl Contact2 {
    /// Same contact seen from the other body (normal reversed).
    fn flipped(self) -> Self {
        Self {
            point: self.point,
            normal: -self.normal,
            penetration: self.penetration,
        }
    }
}

/// Circle vs circle: center distance against summed radii.
pub fn circle_circle(pos_a: FixVec2, ra: Fix64, pos_b: FixVec2, rb: Fix64) -> Option<Contact2> {
    let delta = pos_b - pos_a;
    let combined = ra + rb;
    let dist_sq = delta.length_squared();
    if dist_sq > combined * combined {
        return None;
    }
    let dist = dist_sq.sqrt();
    // Coincident centers: pick a fixed axis so the response is stable.
    let normal = if dist == Fix64::ZERO {
        FixVec2::RIGHT
    } else {
        delta.div_scalar(dist)
    };
    let penetration = combined - dist;
    let point = pos_a + normal.scale(ra - penetration * Fix64::HALF);
    Some(Contact2 {
        point,
        normal,
        penetration,
    })
}

/// Circle (A) vs box (B), box possibly rotated.
///
/// The circle center is transformed into the box frame, clamped to the
/// half extents, and compared against the radius. A center inside the box
/// exits along the nearest face.
pub fn circle_box(
    circle_pos: FixVec2,
    radius: Fix64,
    box_pos: FixVec2,
    width: Fix64,
    height: Fix64,
    rot: Fix64,
) -> Option<Contact2> {
    let hw = width * Fix64::HALF;
    let hh = height * Fix64::HALF;

    let local = if rot == Fix64::ZERO {
        circle_pos - box_pos
    } else {
        (circle_pos - box_pos).rotate(-rot)
    };

    let closest = FixVec2::new(local.x.clamp(-hw, hw), local.y.clamp(-hh, hh));
    let delta = local - closest;
    let dist_sq = delta.length_squared();

    let (normal_local, penetration, point_local) = if dist_sq > Fix64::ZERO {
        if dist_sq > radius * radius {
            return None;
        }
        let dist = dist_sq.sqrt();
        // Normal points from the circle toward the box surface (A→B).
        (-delta.div_scalar(dist.max(Fix64::from_raw(1))), radius - dist, closest)
    } else {
        // Center inside the box: minimum-exit direction.
        let exit_right = hw - local.x;
        let exit_left = local.x + hw;
        let exit_up = hh - local.y;
        let exit_down = local.y + hh;
        let min_exit = exit_right.min(exit_left).min(exit_up).min(exit_down);
        let exit_dir = if min_exit == exit_right {
            FixVec2::RIGHT
        } else if min_exit == exit_left {
            FixVec2::LEFT
        } else if min_exit == exit_up {
            FixVec2::UP
        } else {
            FixVec2::DOWN
        };
        // Normal A→B points deeper into the box: the exit direction
        // reversed.
        (-exit_dir, min_exit + radius, local)
    };

    let (normal, point) = if rot == Fix64::ZERO {
        (normal_local, box_pos + point_local)
    } else {
        (normal_local.rotate(rot), box_pos + point_local.rotate(rot))
    };
    Some(Contact2 {
        point,
        normal,
        penetration,
    })
}

/// Axis-aligned box vs box: per-axis overlap, MTV on the smaller one.
pub fn box_box_aligned(
    pos_a: FixVec2,
    wa: Fix64,
    ha: Fix64,
    pos_b: FixVec2,
    wb: Fix64,
    hb: Fix64,
) -> Option<Contact2> {
    let d = pos_b - pos_a;
    let overlap_x = (wa + wb) * Fix64::HALF - d.x.abs();
    if overlap_x <= Fix64::ZERO {
        return None;
    }
    let overlap_y = (ha + hb) * Fix64::HALF - d.y.abs();
    if overlap_y <= Fix64::ZERO {
        return None;
    }

    let (normal, penetration) = if overlap_x < overlap_y {
        let n = if d.x >= Fix64::ZERO {
            FixVec2::RIGHT
        } else {
            FixVec2::LEFT
        };
        (n, overlap_x)
    } else {
        let n = if d.y >= Fix64::ZERO {
            FixVec2::UP
        } else {
            FixVec2::DOWN
        };
        (n, overlap_y)
    };
    let point = pos_a + d.scale(Fix64::HALF);
    Some(Contact2 {
        point,
        normal,
        penetration,
    })
}

/// Rotated box vs box via SAT over the four face normals.
///
/// The MTV is the axis of smallest overlap, sign-corrected to point from
/// A toward B.
#[allow(clippy::too_many_arguments)]
pub fn box_box_sat(
    pos_a: FixVec2,
    wa: Fix64,
    ha: Fix64,
    rot_a: Fix64,
    pos_b: FixVec2,
    wb: Fix64,
    hb: Fix64,
    rot_b: Fix64,
) -> Option<Contact2> {
    let ax = FixVec2::RIGHT.rotate(rot_a);
    let ay = FixVec2::UP.rotate(rot_a);
    let bx = FixVec2::RIGHT.rotate(rot_b);
    let by = FixVec2::UP.rotate(rot_b);

    let half_a = FixVec2::new(wa * Fix64::HALF, ha * Fix64::HALF);
    let half_b = FixVec2::new(wb * Fix64::HALF, hb * Fix64::HALF);
    let d = pos_b - pos_a;

    let axes = [ax, ay, bx, by];
    let mut best_overlap = Fix64::MAX;
    let mut best_axis = FixVec2::ZERO;

    for axis in axes {
        let ra = ax.dot(axis).abs() * half_a.x + ay.dot(axis).abs() * half_a.y;
        let rb = bx.dot(axis).abs() * half_b.x + by.dot(axis).abs() * half_b.y;
        let overlap = ra + rb - d.dot(axis).abs();
        if overlap <= Fix64::ZERO {
            return None; // separating axis
        }
        if overlap < best_overlap {
            best_overlap = overlap;
            best_axis = axis;
        }
    }

    // Point the MTV from A toward B.
    let normal = if d.dot(best_axis) >= Fix64::ZERO {
        best_axis
    } else {
        -best_axis
    };
    let point = pos_a + d.scale(Fix64::HALF);
    Some(Contact2 {
        point,
        normal,
        penetration: best_overlap,
    })
}

// =============================================================================
// TESTS
// =============================================================================
