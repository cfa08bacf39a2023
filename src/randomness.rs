//! Randomness boundary.
//!
//! The core never calls a platform RNG directly. Every draw flows through
//! [`RandomnessSource`] (uniform and weighted-choice draws) or
//! [`IntegerRangeSource`] (single integer draws, which may be served by a
//! remote random-number API). Both surface failures as
//! [`CoreError::Source`] rather than panicking.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::CoreError;

/// Supplies uniform and weighted-discrete draws.
///
/// Only [`uniform`](Self::uniform) is required; the other draws are
/// derived from it unless an implementation can do better.
pub trait RandomnessSource {
    /// A uniform draw in `[0, 1)`.
    fn uniform(&mut self) -> Result<f64, CoreError>;

    /// An index into `weights`, chosen with probability proportional to
    /// its weight.
    fn weighted_choice(&mut self, weights: &[f64]) -> Result<usize, CoreError> {
        let total = validate_weights(weights)?;
        let target = self.uniform()? * total;
        let mut cumulative = 0.0;
        for (i, w) in weights.iter().enumerate() {
            cumulative += w;
            if target < cumulative {
                return Ok(i);
            }
        }
        // Rounding at the top of the range: fall back to the last positive weight.
        Ok(weights.iter().rposition(|w| *w > 0.0).unwrap_or(0))
    }

    /// A uniform index in `[0, len)`.
    fn choose_index(&mut self, len: usize) -> Result<usize, CoreError> {
        if len == 0 {
            return Err(CoreError::Domain("cannot choose from an empty set".into()));
        }
        let i = (self.uniform()? * len as f64) as usize;
        Ok(i.min(len - 1))
    }

    /// A uniform integer in `[min, max]`, both ends inclusive.
    fn range_inclusive(&mut self, min: i64, max: i64) -> Result<i64, CoreError> {
        if min > max {
            return Err(CoreError::Domain(format!("empty range [{min}, {max}]")));
        }
        let span = max
            .checked_sub(min)
            .and_then(|d| d.checked_add(1))
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| CoreError::Domain(format!("range [{min}, {max}] is too wide")))?;
        Ok(min + self.choose_index(span)? as i64)
    }
}

/// Supplies a single integer drawn from an inclusive range.
pub trait IntegerRangeSource {
    fn draw_int(&mut self, min: i64, max: i64) -> Result<i64, CoreError>;
}

/// Checks a weight vector and returns its sum.
pub fn validate_weights(weights: &[f64]) -> Result<f64, CoreError> {
    if weights.is_empty() {
        return Err(CoreError::Domain("weight vector is empty".into()));
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(CoreError::Domain(format!(
            "weights must be finite and non-negative, found {w}"
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(CoreError::Domain("weights sum to zero".into()));
    }
    Ok(total)
}

/// Pseudo-random source backed by `StdRng`.
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    /// Reproducible stream for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomnessSource for StdRandom {
    fn uniform(&mut self) -> Result<f64, CoreError> {
        Ok(self.rng.gen::<f64>())
    }

    fn weighted_choice(&mut self, weights: &[f64]) -> Result<usize, CoreError> {
        validate_weights(weights)?;
        let dist = WeightedIndex::new(weights)
            .map_err(|e| CoreError::Domain(format!("invalid weights: {e}")))?;
        Ok(dist.sample(&mut self.rng))
    }

    fn choose_index(&mut self, len: usize) -> Result<usize, CoreError> {
        if len == 0 {
            return Err(CoreError::Domain("cannot choose from an empty set".into()));
        }
        Ok(self.rng.gen_range(0..len))
    }

    fn range_inclusive(&mut self, min: i64, max: i64) -> Result<i64, CoreError> {
        if min > max {
            return Err(CoreError::Domain(format!("empty range [{min}, {max}]")));
        }
        Ok(self.rng.gen_range(min..=max))
    }
}

/// Serves integer draws from a local [`RandomnessSource`], for offline use.
pub struct LocalRange<'a, R: RandomnessSource + ?Sized> {
    source: &'a mut R,
}

impl<'a, R: RandomnessSource + ?Sized> LocalRange<'a, R> {
    pub fn new(source: &'a mut R) -> Self {
        Self { source }
    }
}

impl<R: RandomnessSource + ?Sized> IntegerRangeSource for LocalRange<'_, R> {
    fn draw_int(&mut self, min: i64, max: i64) -> Result<i64, CoreError> {
        self.source.range_inclusive(min, max)
    }
}
