//! Deterministic PRNG for backoff decisions and helper generators.
//!
//! Uses the SplitMix64 algorithm: fast, 8 bytes of state, and identical
//! output on every platform, so a seeded run always replays the same way.

use crate::fixed::Fixed64;

/// SplitMix64 pseudo-random number generator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Returns `true` with the given probability (Fixed64 in [0, 1]).
    ///
    /// - probability <= 0 always returns false
    /// - probability >= 1 always returns true
    pub fn chance(&mut self, probability: Fixed64) -> bool {
        if probability <= Fixed64::ZERO {
            return false;
        }
        if probability >= Fixed64::from_num(1) {
            return true;
        }
        // For p in (0,1) the raw Q32.32 bits are the fraction scaled to
        // [0, 2^32); compare against a uniform u32.
        let upper = (self.next_u64() >> 32) as u32;
        (upper as u64) < probability.to_bits() as u64
    }

    /// Uniform index in `0..len`.
    ///
    /// # Panics
    ///
    /// Panics if `len` is zero.
    pub fn index(&mut self, len: usize) -> usize {
        assert!(len > 0, "SimRng::index: len must be > 0");
        (self.next_u64() % len as u64) as usize
    }

    /// Get the internal state (for hashing/serialization).
    pub fn state(&self) -> u64 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_differ() {
        let mut a = SimRng::new(1);
        let mut b = SimRng::new(2);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn chance_bounds() {
        let mut rng = SimRng::new(999);
        for _ in 0..100 {
            assert!(!rng.chance(Fixed64::ZERO));
            assert!(rng.chance(Fixed64::from_num(1)));
        }
        assert!(!rng.chance(Fixed64::from_num(-1)));
        assert!(rng.chance(Fixed64::from_num(2)));
    }

    #[test]
    fn chance_half_roughly_balanced() {
        let mut rng = SimRng::new(12345);
        let half = Fixed64::from_num(0.5);
        let hits = (0..10_000).filter(|_| rng.chance(half)).count();
        // Expect ~5000; the tolerance is generous.
        assert!((4000..=6000).contains(&hits), "expected ~5000, got {hits}");
    }

    #[test]
    fn index_stays_in_range() {
        let mut rng = SimRng::new(7);
        for len in 1..20 {
            assert!(rng.index(len) < len);
        }
    }

    #[test]
    #[should_panic(expected = "len must be > 0")]
    fn index_of_empty_range_panics() {
        SimRng::new(7).index(0);
    }
}
