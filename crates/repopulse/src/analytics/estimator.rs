//! Placeholder values for metrics the API does not expose.
//!
//! Line churn, documentation and code-quality scores, and the weekly activity
//! fallback are not measured. They come from a [`MetricsEstimator`] so that
//! tests and reproducible runs can swap the random source for a fixed one.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Per-commit line additions, `[low, high)`.
pub const ADDITIONS_PER_COMMIT: (u64, u64) = (80, 120);
/// Per-commit line deletions, `[low, high)`.
pub const DELETIONS_PER_COMMIT: (u64, u64) = (20, 50);
/// Documentation score when the repository has content.
pub const DOCUMENTATION_WITH_CONTENT: (u32, u32) = (75, 100);
/// Documentation score for an empty repository.
pub const DOCUMENTATION_EMPTY: (u32, u32) = (25, 50);
pub const CODE_QUALITY: (u32, u32) = (60, 90);
/// Synthetic daily commits, inclusive.
pub const SYNTHETIC_DAILY_COMMITS: (u64, u64) = (1, 10);

/// Source of estimated metric values.
pub trait MetricsEstimator: Send + Sync {
    /// Estimated lines added across `commits` commits.
    fn additions(&self, commits: u64) -> u64;

    /// Estimated lines deleted across `commits` commits.
    fn deletions(&self, commits: u64) -> u64;

    /// Documentation score; `has_content` is false for empty repositories.
    fn documentation_score(&self, has_content: bool) -> u32;

    fn code_quality_score(&self) -> u32;

    /// One day's worth of commits for the synthetic activity series.
    fn synthetic_daily_commits(&self) -> u64;
}

/// Uniformly random estimates.
#[derive(Debug, Default)]
pub struct RandomEstimator {
    seeded: Option<Mutex<StdRng>>,
}

impl RandomEstimator {
    /// Draw from the thread-local generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw from a deterministic generator.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seeded: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    fn sample<T, F>(&self, draw: F) -> T
    where
        F: FnOnce(&mut dyn rand::RngCore) -> T,
    {
        match &self.seeded {
            Some(rng) => draw(&mut *rng.lock().unwrap_or_else(PoisonError::into_inner)),
            None => draw(&mut rand::rng()),
        }
    }
}

impl MetricsEstimator for RandomEstimator {
    fn additions(&self, commits: u64) -> u64 {
        let (low, high) = ADDITIONS_PER_COMMIT;
        self.sample(|rng| commits * rng.random_range(low..high))
    }

    fn deletions(&self, commits: u64) -> u64 {
        let (low, high) = DELETIONS_PER_COMMIT;
        self.sample(|rng| commits * rng.random_range(low..high))
    }

    fn documentation_score(&self, has_content: bool) -> u32 {
        let (low, high) = if has_content {
            DOCUMENTATION_WITH_CONTENT
        } else {
            DOCUMENTATION_EMPTY
        };
        self.sample(|rng| rng.random_range(low..high))
    }

    fn code_quality_score(&self) -> u32 {
        let (low, high) = CODE_QUALITY;
        self.sample(|rng| rng.random_range(low..high))
    }

    fn synthetic_daily_commits(&self) -> u64 {
        let (low, high) = SYNTHETIC_DAILY_COMMITS;
        self.sample(|rng| rng.random_range(low..=high))
    }
}

/// Deterministic estimates at the midpoint of each range.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedEstimator;

impl MetricsEstimator for FixedEstimator {
    fn additions(&self, commits: u64) -> u64 {
        let (low, high) = ADDITIONS_PER_COMMIT;
        commits * ((low + high) / 2)
    }

    fn deletions(&self, commits: u64) -> u64 {
        let (low, high) = DELETIONS_PER_COMMIT;
        commits * ((low + high) / 2)
    }

    fn documentation_score(&self, has_content: bool) -> u32 {
        let (low, high) = if has_content {
            DOCUMENTATION_WITH_CONTENT
        } else {
            DOCUMENTATION_EMPTY
        };
        (low + high) / 2
    }

    fn code_quality_score(&self) -> u32 {
        let (low, high) = CODE_QUALITY;
        (low + high) / 2
    }

    fn synthetic_daily_commits(&self) -> u64 {
        let (low, high) = SYNTHETIC_DAILY_COMMITS;
        (low + high) / 2
    }
}
