//! Yield policy for vehicles stuck behind one another.
//!
//! Node locks never queue, so two vehicles that each need the other's node
//! would wait forever. Once a vehicle has been blocked for more than
//! `patience` consecutive ticks it rolls `yield_chance` on the simulation's
//! seeded RNG. A successful roll makes it step aside onto a free neighbour
//! and re-plan from there, which frees the node the other vehicle wants.

use serde::{Deserialize, Serialize};

use crate::fixed::{Fixed64, f64_to_fixed64};

/// Deadlock-breaking parameters. All randomness flows from `seed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Consecutive blocked ticks tolerated before a vehicle considers yielding.
    pub patience: u32,
    /// Probability in [0, 1] that a vehicle past its patience yields this tick.
    pub yield_chance: f64,
    /// Seed for the simulation RNG.
    pub seed: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            patience: 2,
            yield_chance: 0.5,
            seed: 0x5EED_A6F1,
        }
    }
}

impl BackoffPolicy {
    /// A policy where the first vehicle past its patience always yields.
    pub fn eager(patience: u32) -> Self {
        Self {
            patience,
            yield_chance: 1.0,
            ..Self::default()
        }
    }

    /// A policy that never yields. Head-on meetings then block until the run ends.
    pub fn never() -> Self {
        Self {
            yield_chance: 0.0,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Whether a vehicle blocked for `blocked_ticks` may roll for a yield.
    pub fn is_exhausted(&self, blocked_ticks: u32) -> bool {
        blocked_ticks > self.patience
    }

    /// `yield_chance` clamped to [0, 1] in fixed point. NaN counts as zero.
    pub fn yield_probability(&self) -> Fixed64 {
        if self.yield_chance.is_nan() {
            return Fixed64::ZERO;
        }
        f64_to_fixed64(self.yield_chance.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patience_is_exclusive() {
        let policy = BackoffPolicy::default();
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
    }

    #[test]
    fn probability_is_clamped() {
        let mut policy = BackoffPolicy::eager(0);
        assert_eq!(policy.yield_probability(), Fixed64::from_num(1));
        policy.yield_chance = -3.0;
        assert_eq!(policy.yield_probability(), Fixed64::ZERO);
        assert_eq!(BackoffPolicy::never().yield_probability(), Fixed64::ZERO);
    }

    #[test]
    fn seed_override_keeps_other_fields() {
        let policy = BackoffPolicy::eager(4).with_seed(9);
        assert_eq!(policy.seed, 9);
        assert_eq!(policy.patience, 4);
        assert_eq!(policy.yield_chance, 1.0);
    }
}
