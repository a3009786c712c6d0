//! # Dice Module
//!
//! Arithmetic dice expressions, CoC-style percentile checks and the injected
//! random source every roll draws from.
//!
//! ## Components
//!
//! - [`expr`] - Parser and evaluator for expressions like `2d6+3`, `4d6kh3`, `(1d4+1)*2`
//! - [`check`] - Percentile success levels (critical / extreme / hard / regular / failure / fumble)
//!
//! ## Randomness
//!
//! Nothing in this crate touches `rand::thread_rng()` directly. Every roll pulls
//! from a [`RandomSource`] handed in by the caller, so a command can be replayed
//! by constructing it again with the same seed (or a [`ScriptedSource`] in tests).
//!
//! ```rust
//! use rolldeck::dice::{DiceExpression, RngSource};
//!
//! let expr = DiceExpression::parse("2d6+3", 100).unwrap();
//! let mut source = RngSource::seeded(7);
//! let outcome = expr.roll(&mut source).unwrap();
//! assert!(outcome.total >= 5 && outcome.total <= 15);
//! ```

pub mod check;
pub mod expr;

pub use check::{coc_check, SuccessLevel};
pub use expr::{DiceError, DiceExpression, DieRoll, RollOutcome};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Source of randomness for one command invocation.
pub trait RandomSource: Send {
    /// Uniform integer in `1..=sides`. A zero-sided die yields 0.
    fn roll_die(&mut self, sides: u32) -> u32;

    /// Uniform float in `[0, 1)`, used for weighted text selection.
    fn unit(&mut self) -> f64;
}

/// [`RandomSource`] backed by any `rand` generator.
pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng + Send> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSource<StdRng> {
    /// Fresh generator seeded from the OS.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Deterministic generator, handy for replaying an invocation.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> RandomSource for RngSource<R> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        self.rng.gen_range(1..=sides)
    }

    fn unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays queued values. Die values are clamped to the die's range; an empty
/// queue yields 1 for dice and 0.0 for unit draws.
#[derive(Debug, Default, Clone)]
pub struct ScriptedSource {
    dice: VecDeque<u32>,
    units: VecDeque<f64>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dice<I: IntoIterator<Item = u32>>(mut self, values: I) -> Self {
        self.dice.extend(values);
        self
    }

    pub fn with_units<I: IntoIterator<Item = f64>>(mut self, values: I) -> Self {
        self.units.extend(values);
        self
    }

    /// Number of die values not yet consumed.
    pub fn remaining_dice(&self) -> usize {
        self.dice.len()
    }
}

impl RandomSource for ScriptedSource {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        self.dice.pop_front().unwrap_or(1).clamp(1, sides)
    }

    fn unit(&mut self) -> f64 {
        let v = self.units.pop_front().unwrap_or(0.0);
        if v.is_nan() || v < 0.0 {
            0.0
        } else if v >= 1.0 {
            // keep strictly below 1 so scans never run off the end
            1.0 - f64::EPSILON
        } else {
            v
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_source_clamps_and_defaults() {
        let mut src = ScriptedSource::new().with_dice([25, 0, 4]).with_units([1.5]);
        assert_eq!(src.roll_die(20), 20);
        assert_eq!(src.roll_die(20), 1);
        assert_eq!(src.roll_die(6), 4);
        assert_eq!(src.roll_die(6), 1);
        assert!(src.unit() < 1.0);
        assert_eq!(src.unit(), 0.0);
    }

    #[test]
    fn seeded_sources_replay() {
        let mut a = RngSource::seeded(42);
        let mut b = RngSource::seeded(42);
        let ra: Vec<u32> = (0..16).map(|_| a.roll_die(100)).collect();
        let rb: Vec<u32> = (0..16).map(|_| b.roll_die(100)).collect();
        assert_eq!(ra, rb);
        assert!(ra.iter().all(|v| (1..=100).contains(v)));
    }
}
