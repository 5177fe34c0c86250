//! Early stopping with best-parameter snapshot and restore.

use tracing::debug;

use crate::model::{Model, ParameterSnapshot};

/// Tracks the best validation loss seen by one training run and decides when
/// further epochs stop paying for themselves.
///
/// All state is owned by the instance. Every run constructs its own monitor,
/// so two concurrent runs can never bleed best-loss state into each other.
///
/// Improvement is strict less-than: a loss equal to the current best counts
/// as no progress, leaves the snapshot alone, and grows the stale counter.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    max_stale_checks: usize,
    best_loss: f64,
    stale_checks: usize,
    best_snapshot: Option<ParameterSnapshot>,
}

impl EarlyStopping {
    /// Monitor that signals a stop once more than `max_stale_checks`
    /// consecutive checks pass without a new best loss.
    pub fn new(max_stale_checks: usize) -> Self {
        Self {
            max_stale_checks,
            best_loss: f64::INFINITY,
            stale_checks: 0,
            best_snapshot: None,
        }
    }

    /// Records one validation loss and answers whether training should halt.
    ///
    /// On a new best the model's full parameter state is snapshotted, so the
    /// snapshot always belongs to the moment its loss was first seen.
    pub fn check_and_record<M: Model + ?Sized>(&mut self, validation_loss: f64, model: &M) -> bool {
        if validation_loss < self.best_loss {
            debug!(
                loss = validation_loss,
                previous_best = self.best_loss,
                "new best validation loss"
            );
            self.best_loss = validation_loss;
            self.stale_checks = 0;
            self.best_snapshot = Some(model.parameters());
        } else {
            self.stale_checks += 1;
            debug!(
                loss = validation_loss,
                best = self.best_loss,
                stale_checks = self.stale_checks,
                "validation loss did not improve"
            );
        }
        self.stale_checks > self.max_stale_checks
    }

    /// Writes the best snapshot back into the model in one call. Returns
    /// false when no improvement was ever recorded, which can only happen
    /// when the monitor stopped a run before its first best.
    pub fn restore_best<M: Model + ?Sized>(&self, model: &mut M) -> bool {
        match &self.best_snapshot {
            Some(snapshot) => {
                debug!(best_loss = self.best_loss, "restoring best parameters");
                model.set_parameters(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn best_snapshot(&self) -> Option<&ParameterSnapshot> {
        self.best_snapshot.as_ref()
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    pub fn stale_checks(&self) -> usize {
        self.stale_checks
    }
}
