//! Per-sample selection for field dumps.
//!
//! A sample is selected when its draw is divisible by the interval:
//!
//! | Mode | Draw | Reproducible |
//! |------|------|--------------|
//! | `full` | always 0 | trivially |
//! | `hash` | xxh64(line id, seed 0) | across runs and processes |
//! | `random` | uniform in `[0, i32::MAX]` | per call; see below |
//!
//! # Random mode reseeding
//!
//! The random generator is constructed from [`RANDOM_DUMP_SEED`] at the
//! start of every [`SamplingPolicy::select`] call. Two batches of the same
//! size therefore get the same selection pattern. Downstream tooling may rely
//! on this, so it is kept as a contract rather than carried across calls.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

use crate::error::{DumpError, DumpResult};
use crate::scope::BatchReader;

/// Seed of the per-call random generator.
pub const RANDOM_DUMP_SEED: u64 = 0;

/// Inclusive upper bound of a random-mode draw.
pub const RANDOM_DRAW_MAX: u64 = i32::MAX as u64;

/// How samples are selected for field dumping.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DumpMode {
    /// Field dumping disabled.
    Off,
    /// Every sample.
    #[default]
    Full,
    /// Samples whose line-id hash is divisible by the interval.
    Hash,
    /// Samples whose per-call random draw is divisible by the interval.
    Random,
}

/// Stable 64-bit hash of a line identifier (xxh64, seed 0).
///
/// ```
/// use batch_dump_core::sampling::line_id_hash;
///
/// assert_eq!(line_id_hash(""), 0xEF46DB3751D8E999);
/// ```
pub fn line_id_hash(line_id: &str) -> u64 {
    xxh64(line_id.as_bytes(), 0)
}

/// A dump mode paired with a validated, non-zero interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    mode: DumpMode,
    interval: u64,
}

impl SamplingPolicy {
    /// # Errors
    ///
    /// Returns `DumpError::InvalidInterval` when `interval` is zero.
    pub fn new(mode: DumpMode, interval: u64) -> DumpResult<Self> {
        if interval == 0 {
            return Err(DumpError::InvalidInterval(interval));
        }
        Ok(Self { mode, interval })
    }

    pub fn mode(&self) -> DumpMode {
        self.mode
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Selection flag for every sample of the batch, computed once per call.
    pub fn select(&self, reader: &dyn BatchReader) -> Vec<bool> {
        let batch_size = reader.batch_size();
        match self.mode {
            DumpMode::Off => vec![false; batch_size],
            // The draw is 0, and 0 is divisible by any interval.
            DumpMode::Full => vec![true; batch_size],
            DumpMode::Hash => (0..batch_size)
                .map(|i| line_id_hash(reader.line_id(i)) % self.interval == 0)
                .collect(),
            DumpMode::Random => {
                let mut rng = ChaCha8Rng::seed_from_u64(RANDOM_DUMP_SEED);
                (0..batch_size)
                    .map(|_| rng.gen_range(0..=RANDOM_DRAW_MAX) % self.interval == 0)
                    .collect()
            }
        }
    }
}
