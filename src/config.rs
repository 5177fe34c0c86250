//! Configuration for a training run.

use serde::{Deserialize, Serialize};

use crate::error::{FitError, FitResult};

/// What to do with the undersized remainder when the dataset length is not a
/// multiple of the batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Distribute the remainder across the leading batches, so every example
    /// is visited each epoch and the first `len % batches` batches carry one
    /// extra example.
    Fold,
    /// Keep only full `batch_size`-sized batches and discard the tail.
    Drop,
}

impl Default for RemainderPolicy {
    fn default() -> Self {
        RemainderPolicy::Fold
    }
}

/// Hyperparameters and knobs for [`TrainingRunner`](crate::runner::TrainingRunner).
///
/// All limits are validated once, at runner construction; an invalid config
/// never reaches the epoch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Total number of epochs to run (1-based target, must be >= 1).
    pub epochs: usize,
    /// Examples per training batch (must be >= 1).
    pub batch_size: usize,
    /// Consecutive non-improving validation checks tolerated before the run
    /// stops early.
    #[serde(default = "default_max_stale_checks")]
    pub max_stale_checks: usize,
    /// Chunk size for validation-loss evaluation. `None` falls back to
    /// `batch_size`. Bounds peak memory: the validation set is never scored
    /// in one piece when it exceeds this size.
    #[serde(default)]
    pub eval_chunk_size: Option<usize>,
    /// Remainder handling for the per-epoch index partition.
    #[serde(default)]
    pub remainder: RemainderPolicy,
    /// Health checks run while the absolute epoch index is below this bound.
    /// A cost-saving heuristic, not a correctness requirement.
    #[serde(default = "default_health_check_epochs")]
    pub health_check_epochs: usize,
}

fn default_max_stale_checks() -> usize {
    20
}

fn default_health_check_epochs() -> usize {
    2
}

impl TrainingConfig {
    /// Creates a config with the given epoch target and batch size, leaving
    /// every other knob at its default.
    pub fn new(epochs: usize, batch_size: usize) -> Self {
        Self {
            epochs,
            batch_size,
            max_stale_checks: default_max_stale_checks(),
            eval_chunk_size: None,
            remainder: RemainderPolicy::default(),
            health_check_epochs: default_health_check_epochs(),
        }
    }

    /// Rejects limits the epoch loop cannot honor.
    pub fn validate(&self) -> FitResult<()> {
        if self.epochs < 1 {
            return Err(FitError::config("epochs must be at least 1"));
        }
        if self.batch_size < 1 {
            return Err(FitError::config("batch_size must be at least 1"));
        }
        if let Some(chunk) = self.eval_chunk_size {
            if chunk < 1 {
                return Err(FitError::config("eval_chunk_size must be at least 1"));
            }
        }
        Ok(())
    }

    /// Effective chunk size for validation-loss evaluation.
    pub(crate) fn eval_chunk(&self) -> usize {
        self.eval_chunk_size.unwrap_or(self.batch_size)
    }
}
