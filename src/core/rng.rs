//! Deterministic Random Number Generator
//!
//! Linear congruential generator over the Mersenne prime 2^31 - 1.
//! Given the same seed, produces an identical sequence on all platforms.
//! The RNG state lives inside the world and is cloned with every snapshot,
//! so a rolled-back world replays the exact same draws.

use serde::{Deserialize, Serialize};

use super::fixed::Fix64;
use super::vec2::FixVec2;
use crate::spatial::aabb::Aabb2;

/// LCG multiplier.
const LCG_MUL: i64 = 1_103_515_245;
/// LCG increment.
const LCG_INC: i64 = 12_345;
/// Modulus: 2^31 - 1.
const LCG_MOD: i64 = 2_147_483_647;

/// Deterministic PRNG: `s' = (1103515245·s + 12345) mod (2^31 - 1)`.
///
/// # Example
///
/// ```
/// use holdfast::core::rng::FixRand;
///
/// let mut rng = FixRand::new(1);
/// assert_eq!(rng.next_int(100), 90); // Always the same!
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixRand {
    state: i64,
}

impl Default for FixRand {
    fn default() -> Self {
        Self::new(0)
    }
}

impl FixRand {
    /// Create a new RNG from a seed. The seed is folded into [0, 2^31 - 1).
    pub fn new(seed: i64) -> Self {
        Self {
            state: seed.rem_euclid(LCG_MOD),
        }
    }

    /// Advance the generator and return the raw state in [0, 2^31 - 1).
    #[inline]
    pub fn next_raw(&mut self) -> i64 {
        self.state = (LCG_MUL.wrapping_mul(self.state).wrapping_add(LCG_INC)).rem_euclid(LCG_MOD);
        self.state
    }

    /// Random integer in [0, bound). Returns 0 when bound is 0.
    #[inline]
    pub fn next_int(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        (self.next_raw() % bound as i64) as u32
    }

    /// Random integer in [min, max]. Returns min when min >= max.
    #[inline]
    pub fn next_int_range(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        let range = (max - min + 1) as u32;
        min + self.next_int(range) as i32
    }

    /// Random fixed-point value in [0, max). Returns zero for max <= 0.
    ///
    /// Scales the raw draw: `raw · max / (2^31 - 1)`, all in integers.
    #[inline]
    pub fn next_fixed(&mut self, max: Fix64) -> Fix64 {
        if max <= Fix64::ZERO {
            return Fix64::ZERO;
        }
        let raw = self.next_raw();
        Fix64::from_raw(((raw as i128 * max.raw() as i128) / LCG_MOD as i128) as i64)
    }

    /// Random fixed-point value in [min, max). Returns min when min >= max.
    #[inline]
    pub fn next_fixed_range(&mut self, min: Fix64, max: Fix64) -> Fix64 {
        if min >= max {
            return min;
        }
        min + self.next_fixed(max - min)
    }

    /// Random position inside a rectangle. X is drawn before Y.
    pub fn next_in_rect(&mut self, rect: Aabb2) -> FixVec2 {
        let x = self.next_fixed_range(rect.min.x, rect.max.x);
        let y = self.next_fixed_range(rect.min.y, rect.max.y);
        FixVec2::new(x, y)
    }

    /// Select a random element from a slice.
    pub fn choice<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_int(slice.len() as u32) as usize;
            Some(&slice[idx])
        }
    }

    /// Shuffle a slice in place with Fisher-Yates, iterating the index from
    /// high to low and drawing the swap target via `next_int(i + 1)`.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_int((i + 1) as u32) as usize;
            slice.swap(i, j);
        }
    }

    /// Current state (for checkpoint tests).
    pub fn state(&self) -> i64 {
        self.state
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let mut a = FixRand::new(12345);
        let mut b = FixRand::new(12345);
        for _ in 0..1000 {
            assert_eq!(a.next_raw(), b.next_raw());
        }
    }

    #[test]
    fn test_known_sequence_seed_1() {
        // These values must never change: existing replays depend on them.
        let mut rng = FixRand::new(1);
        assert_eq!(rng.next_raw(), 1103527590);
        assert_eq!(rng.next_raw(), 944465040);
        assert_eq!(rng.next_raw(), 1695244727);
        assert_eq!(rng.next_raw(), 1008001095);
        assert_eq!(rng.next_raw(), 235077491);
    }

    #[test]
    fn test_next_int_fixture_seed_1() {
        let mut rng = FixRand::new(1);
        let values: Vec<u32> = (0..5).map(|_| rng.next_int(100)).collect();
        assert_eq!(values, vec![90, 40, 27, 95, 91]);
    }

    #[test]
    fn test_next_int_bounds() {
        let mut rng = FixRand::new(1234);
        for _ in 0..1000 {
            assert!(rng.next_int(100) < 100);
        }
        assert_eq!(rng.next_int(0), 0);
        assert_eq!(rng.next_int(1), 0);
    }

    #[test]
    fn test_next_int_range() {
        let mut rng = FixRand::new(5678);
        for _ in 0..1000 {
            let v = rng.next_int_range(-10, 10);
            assert!((-10..=10).contains(&v));
        }
        assert_eq!(rng.next_int_range(5, 5), 5);
        assert_eq!(rng.next_int_range(7, 3), 7);
    }

    #[test]
    fn test_next_fixed() {
        let mut rng = FixRand::new(9999);
        let max = Fix64::from_int(100);
        for _ in 0..1000 {
            let v = rng.next_fixed(max);
            assert!(v >= Fix64::ZERO && v < max);
        }
        assert_eq!(rng.next_fixed(Fix64::ZERO), Fix64::ZERO);
        assert_eq!(rng.next_fixed(Fix64::from_int(-5)), Fix64::ZERO);
    }

    #[test]
    fn test_next_in_rect() {
        let mut rng = FixRand::new(7);
        let rect = Aabb2::from_ints(-10, -10, 10, 10);
        for _ in 0..100 {
            let p = rng.next_in_rect(rect);
            assert!(p.x >= rect.min.x && p.x < rect.max.x);
            assert!(p.y >= rect.min.y && p.y < rect.max.y);
        }
    }

    #[test]
    fn test_shuffle_fixture_seed_42() {
        // The exact permutation is part of the cross-platform contract.
        let mut rng = FixRand::new(42);
        let mut arr = [1, 2, 3, 4, 5];
        rng.shuffle(&mut arr);
        assert_eq!(arr, [2, 5, 1, 3, 4]);
    }

    #[test]
    fn test_shuffle_determinism() {
        let mut a = FixRand::new(1111);
        let mut b = FixRand::new(1111);
        let mut arr_a = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let mut arr_b = arr_a;
        a.shuffle(&mut arr_a);
        b.shuffle(&mut arr_b);
        assert_eq!(arr_a, arr_b);
    }

    #[test]
    fn test_choice() {
        let mut rng = FixRand::new(3);
        let empty: [i32; 0] = [];
        assert_eq!(rng.choice(&empty), None);
        let items = [10, 20, 30];
        for _ in 0..50 {
            assert!(items.contains(rng.choice(&items).unwrap()));
        }
    }

    #[test]
    fn test_state_checkpoint() {
        let mut rng = FixRand::new(5555);
        for _ in 0..50 {
            rng.next_raw();
        }
        let saved = rng.clone();
        let expected: Vec<i64> = (0..10).map(|_| rng.next_raw()).collect();
        let mut restored = saved;
        for v in expected {
            assert_eq!(restored.next_raw(), v);
        }
    }

    #[test]
    fn test_negative_seed_folds() {
        let mut rng = FixRand::new(-1);
        let v = rng.next_raw();
        assert!((0..LCG_MOD).contains(&v));
    }
}
