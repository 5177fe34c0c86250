//! Wall-clock progress tracking and time-remaining projection.

use std::time::{Duration, Instant};

use crate::error::{FitError, FitResult};

/// Projects remaining wall-clock time from the observed completion rate.
///
/// The rate is cumulative units over total elapsed time, not a sliding
/// window, so one slow early unit keeps dragging the estimate. That matches
/// the historical behavior callers calibrate against and is kept on purpose.
/// The rate is sampled when `update` is called and held until the next
/// update, so idle time between queries never moves the projection.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    target_units: f64,
    units_done: f64,
    rate: f64,
    started_at: Option<Instant>,
    has_update: bool,
}

impl ProgressTracker {
    /// Tracker for `target_units` units of work. Targets below one unit are
    /// a configuration error.
    pub fn new(target_units: f64) -> FitResult<Self> {
        if !(target_units >= 1.0) {
            return Err(FitError::config(format!(
                "progress target must be at least 1 unit, got {target_units}"
            )));
        }
        Ok(Self {
            target_units,
            units_done: 0.0,
            rate: 0.0,
            started_at: None,
            has_update: false,
        })
    }

    /// Starts (or restarts) the clock. Completed units are unaffected.
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Clears all derived state: the clock, the completed-unit count, and the
    /// observed rate. The target is part of the tracker's identity and stays.
    pub fn reset(&mut self) {
        self.started_at = None;
        self.units_done = 0.0;
        self.rate = 0.0;
        self.has_update = false;
    }

    /// Records `completed_units` more units of finished work and re-samples
    /// the completion rate.
    pub fn update(&mut self, completed_units: f64) -> FitResult<()> {
        let elapsed = match self.started_at {
            Some(started) => started.elapsed(),
            None => return Err(FitError::sequence("progress updated before start")),
        };
        self.units_done += completed_units;
        let elapsed_secs = elapsed.as_secs_f64();
        self.rate = if elapsed_secs > 0.0 {
            self.units_done / elapsed_secs
        } else {
            0.0
        };
        self.has_update = true;
        Ok(())
    }

    /// Time since `start`.
    pub fn time_elapsed(&self) -> FitResult<Duration> {
        match self.started_at {
            Some(started) => Ok(started.elapsed()),
            None => Err(FitError::sequence("elapsed time requested before start")),
        }
    }

    /// Projected seconds until the target is reached at the rate sampled by
    /// the last update. Returns 0 while that rate is still zero.
    pub fn seconds_remaining(&self) -> FitResult<f64> {
        if self.started_at.is_none() {
            return Err(FitError::sequence("time remaining requested before start"));
        }
        if !self.has_update {
            return Err(FitError::sequence(
                "time remaining requested before any update",
            ));
        }
        if self.rate == 0.0 {
            return Ok(0.0);
        }
        Ok((self.target_units - self.units_done) / self.rate)
    }

    pub fn units_done(&self) -> f64 {
        self.units_done
    }
}
