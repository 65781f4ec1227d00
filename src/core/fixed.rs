//! Q31.32 Fixed-Point Arithmetic
//!
//! Deterministic fixed-point math for the lockstep simulation.
//! All operations use integer arithmetic only - no floats in gameplay logic.
//!
//! ## Format: Q31.32
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bit Layout: Q31.32 (64-bit signed integer)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [S][IIIIIIIIIIIIIIIIIIIIIIIIIIIIIII][FFF...F]              │
//! │   │  └──────── 31 bits ─────────────┘└ 32 bits┘             │
//! │   └─ Sign bit                                               │
//! │                                                             │
//! │  Range: ~±2.1 billion units                                 │
//! │  Precision: 1/2^32 ≈ 0.00000000023 units                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Contract
//!
//! - Addition/subtraction/multiplication wrap modulo 2^64.
//! - Division by zero returns zero (never panics mid-tick).
//! - `sqrt` is an exact integer Newton iteration (floor of the true root).
//! - `sin`/`cos`/`atan2` are odd polynomials with integer-literal
//!   coefficients; identical inputs give identical outputs on any target.
//! - Float conversion exists only for display. NEVER in simulation logic.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Number of fractional bits (32).
pub const FIXED_SHIFT: u32 = 32;

/// 1.0 as a raw Q31.32 integer.
pub const FIXED_ONE_RAW: i64 = 1 << FIXED_SHIFT;

/// Q31.32 fixed-point scalar stored as i64.
///
/// Comparison, hashing and equality are exact on the raw integer, so two
/// worlds that diverge by even one ulp compare unequal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fix64(pub i64);

impl Fix64 {
    /// Zero constant.
    pub const ZERO: Self = Self(0);

    /// One constant.
    pub const ONE: Self = Self(FIXED_ONE_RAW);

    /// Two constant.
    pub const TWO: Self = Self(2 * FIXED_ONE_RAW);

    /// One half.
    pub const HALF: Self = Self(FIXED_ONE_RAW / 2);

    /// Maximum representable value.
    pub const MAX: Self = Self(i64::MAX);

    /// Minimum representable value.
    pub const MIN: Self = Self(i64::MIN);

    /// π in Q31.32: round(π · 2^32).
    pub const PI: Self = Self(13493037705);

    /// 2π in Q31.32.
    pub const TWO_PI: Self = Self(26986075409);

    /// π/2 in Q31.32.
    pub const HALF_PI: Self = Self(6746518852);

    /// π/4 in Q31.32.
    pub const QUARTER_PI: Self = Self(3373259426);

    /// 180/π (radians → degrees).
    pub const RAD2DEG: Self = Self(246083499208);

    /// π/180 (degrees → radians).
    pub const DEG2RAD: Self = Self(74961321);

    /// Create from a raw Q31.32 integer.
    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Create from an integer.
    #[inline]
    pub const fn from_int(i: i32) -> Self {
        Self((i as i64) << FIXED_SHIFT)
    }

    /// Create from a ratio, rounding toward zero.
    ///
    /// Usable in `const` position, so tuning constants can be written as
    /// exact fractions instead of float literals.
    #[inline]
    pub const fn from_ratio(num: i64, den: i64) -> Self {
        Self((((num as i128) << FIXED_SHIFT) / den as i128) as i64)
    }

    /// Raw Q31.32 integer value.
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Integer part, rounding toward negative infinity.
    #[inline]
    pub const fn floor_int(self) -> i64 {
        self.0 >> FIXED_SHIFT
    }

    /// Convert to float for display/rendering.
    ///
    /// Only for visual output. NEVER use the result in game logic.
    #[inline]
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / FIXED_ONE_RAW as f32
    }

    /// Absolute value.
    #[inline]
    pub fn abs(self) -> Self {
        if self.0 < 0 {
            Self(self.0.wrapping_neg())
        } else {
            self
        }
    }

    /// Minimum of two values.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        if self.0 < other.0 {
            self
        } else {
            other
        }
    }

    /// Maximum of two values.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        if self.0 > other.0 {
            self
        } else {
            other
        }
    }

    /// Clamp to a range.
    #[inline]
    pub fn clamp(self, lo: Self, hi: Self) -> Self {
        self.max(lo).min(hi)
    }

    /// Sign: -1, 0 or +1.
    #[inline]
    pub fn signum(self) -> Self {
        match self.0.cmp(&0) {
            std::cmp::Ordering::Less => Self(-FIXED_ONE_RAW),
            std::cmp::Ordering::Equal => Self::ZERO,
            std::cmp::Ordering::Greater => Self::ONE,
        }
    }

    /// Linear interpolation: `self + (other - self) * t`.
    #[inline]
    pub fn lerp(self, other: Self, t: Self) -> Self {
        self + (other - self) * t
    }

    /// Square root, floor of the exact root in Q31.32.
    ///
    /// Returns zero for non-positive inputs. Integer Newton iteration on
    /// the widened radicand; converges to the exact integer square root,
    /// so the result is bit-identical on every platform.
    pub fn sqrt(self) -> Self {
        if self.0 <= 0 {
            return Self::ZERO;
        }
        let n = (self.0 as u128) << FIXED_SHIFT;
        let mut x = n;
        let mut y = (x + 1) >> 1;
        while y < x {
            x = y;
            y = (x + n / x) >> 1;
        }
        Self(x as i64)
    }

    /// Sine. Range-reduces mod 2π, folds to the first quadrant, then
    /// evaluates the odd Taylor polynomial through x^7.
    pub fn sin(self) -> Self {
        let r = self.0.rem_euclid(Self::TWO_PI.0);
        if r < Self::HALF_PI.0 {
            sin_quarter(r)
        } else if r < Self::PI.0 {
            sin_quarter(Self::PI.0 - r)
        } else if r < Self::PI.0 + Self::HALF_PI.0 {
            Self(sin_quarter(r - Self::PI.0).0.wrapping_neg())
        } else {
            Self(sin_quarter(Self::TWO_PI.0 - r).0.wrapping_neg())
        }
    }

    /// Cosine via the phase identity `cos(x) = sin(x + π/2)`.
    #[inline]
    pub fn cos(self) -> Self {
        Self(self.0.wrapping_add(Self::HALF_PI.0)).sin()
    }

    /// Four-quadrant arctangent of `self / x` (self is the y component).
    ///
    /// Octant reduction plus a quadratic approximation of atan on [-1, 1].
    /// `atan2(0, 0)` returns zero.
    pub fn atan2(self, x: Self) -> Self {
        let y = self;
        if x.0 == 0 && y.0 == 0 {
            return Self::ZERO;
        }
        if x.abs() >= y.abs() {
            let a = atan_unit(y / x);
            if x.0 > 0 {
                a
            } else if y.0 >= 0 {
                a + Self::PI
            } else {
                a - Self::PI
            }
        } else {
            let a = atan_unit(x / y);
            if y.0 > 0 {
                Self::HALF_PI - a
            } else {
                Self(Self::HALF_PI.0.wrapping_neg()) - a
            }
        }
    }
}

/// Raw multiply: widen to i128, shift back. Arithmetic shift keeps the
/// truncation direction identical for negative products on every target.
#[inline]
pub(crate) fn raw_mul(a: i64, b: i64) -> i64 {
    let wide = (a as i128) * (b as i128);
    #[cfg(feature = "checked-math")]
    debug_assert!(
        (wide >> FIXED_SHIFT) <= i64::MAX as i128 && (wide >> FIXED_SHIFT) >= i64::MIN as i128,
        "fixed-point multiply overflow: {a} * {b}"
    );
    (wide >> FIXED_SHIFT) as i64
}

/// Raw divide: pre-shift the numerator. Zero divisor returns zero.
#[inline]
pub(crate) fn raw_div(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }
    let wide = ((a as i128) << FIXED_SHIFT) / (b as i128);
    #[cfg(feature = "checked-math")]
    debug_assert!(
        wide <= i64::MAX as i128 && wide >= i64::MIN as i128,
        "fixed-point divide overflow: {a} / {b}"
    );
    wide as i64
}

/// Taylor coefficient 1/6 in Q31.32.
const SIN_C3: i64 = 715827883;
/// Taylor coefficient 1/120 in Q31.32.
const SIN_C5: i64 = 35791394;
/// Taylor coefficient 1/5040 in Q31.32.
const SIN_C7: i64 = 852176;

/// sin on [0, π/2]: x - x³/6 + x⁵/120 - x⁷/5040.
#[inline]
fn sin_quarter(t: i64) -> Fix64 {
    let t2 = raw_mul(t, t);
    let t3 = raw_mul(t2, t);
    let t5 = raw_mul(t3, t2);
    let t7 = raw_mul(t5, t2);
    Fix64(
        t.wrapping_sub(raw_mul(t3, SIN_C3))
            .wrapping_add(raw_mul(t5, SIN_C5))
            .wrapping_sub(raw_mul(t7, SIN_C7)),
    )
}

/// atan approximation coefficient 0.2447 in Q31.32.
const ATAN_A: i64 = 1050978497;
/// atan approximation coefficient 0.0663 in Q31.32.
const ATAN_B: i64 = 284756332;

/// atan(z) for z in [-1, 1]:
/// `z·π/4 + z·(1 − |z|)·(0.2447 + 0.0663·|z|)`.
#[inline]
fn atan_unit(z: Fix64) -> Fix64 {
    let az = z.abs();
    let correction = Fix64(ATAN_A.wrapping_add(raw_mul(ATAN_B, az.0)));
    z * Fix64::QUARTER_PI + z * (Fix64::ONE - az) * correction
}

impl Add for Fix64 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Fix64 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl Sub for Fix64 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.wrapping_sub(rhs.0))
    }
}

impl SubAssign for Fix64 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.wrapping_sub(rhs.0);
    }
}

impl Mul for Fix64 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self(raw_mul(self.0, rhs.0))
    }
}

impl Div for Fix64 {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        Self(raw_div(self.0, rhs.0))
    }
}

impl Neg for Fix64 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self(self.0.wrapping_neg())
    }
}

impl fmt::Debug for Fix64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fix64({:.6})", self.to_f32())
    }
}

impl fmt::Display for Fix64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.to_f32())
    }
}

// =============================================================================
// TESTS
// =============================================================================
