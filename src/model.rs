//! The model-collaborator surface and parameter snapshots.
//!
//! The runner never inspects a model beyond this trait: one train step per
//! batch, loss evaluation, prediction, and whole-parameter get/set. Restoring
//! parameters goes through [`Model::set_parameters`] as a capability of the
//! model itself, not through any naming convention on the model's internals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FitError, FitResult};

/// An ownership-exclusive, point-in-time copy of every trainable parameter,
/// keyed by parameter name.
///
/// Backed by a `BTreeMap` so the serialized form of a checkpoint record is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot(BTreeMap<String, Vec<f64>>);

impl ParameterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.0.insert(name.into(), values);
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.0.iter().map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Vec<f64>)> for ParameterSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Vec<f64>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The narrow surface a trainable model exposes to the runner.
///
/// `inputs` is one row of feature values per example; `targets` holds one
/// scalar target per example. How the model turns a batch into a parameter
/// update is entirely its own concern.
pub trait Model {
    /// Runs one parameter update on a batch. A failure here aborts the
    /// current epoch before it is checkpointed.
    fn train_step(&mut self, inputs: &[Vec<f64>], targets: &[f64]) -> FitResult<()>;

    /// Scalar loss for the given examples under the current parameters.
    fn evaluate_loss(&mut self, inputs: &[Vec<f64>], targets: &[f64]) -> f64;

    /// One prediction per input row.
    fn predict(&self, inputs: &[Vec<f64>]) -> Vec<f64>;

    /// Copies out all trainable parameters.
    fn parameters(&self) -> ParameterSnapshot;

    /// Overwrites all trainable parameters from a snapshot in one call, so no
    /// reader of the model can observe a mix of old and new values.
    fn set_parameters(&mut self, params: &ParameterSnapshot);
}

/// Test double driven by a queue of validation losses.
///
/// Public so downstream tests can script exact loss sequences against a real
/// runner.
///
/// One scripted loss covers one epoch: every `evaluate_loss` call between two
/// train phases (the train-loss probe plus all validation chunks) reads the
/// same queued value, and the queue advances when training resumes. The queue
/// sticks at its last value once exhausted.
///
/// Parameters expose a single `"steps"` entry holding the cumulative train
/// step count, which makes snapshots from different epochs distinguishable.
#[derive(Debug, Clone)]
pub struct ScriptedModel {
    losses: Vec<f64>,
    cursor: usize,
    eval_seen: bool,
    train_steps: usize,
    restores: usize,
    fail_on_step: Option<usize>,
    params: ParameterSnapshot,
}

impl ScriptedModel {
    /// A model whose validation loss follows `losses`, one entry per epoch.
    pub fn with_losses(losses: Vec<f64>) -> Self {
        let mut params = ParameterSnapshot::new();
        params.insert("steps", vec![0.0]);
        Self {
            losses,
            cursor: 0,
            eval_seen: false,
            train_steps: 0,
            restores: 0,
            fail_on_step: None,
            params,
        }
    }

    /// Makes the `n`-th train step (0-based, counted across the whole run)
    /// fail with a train-step error.
    pub fn fail_on_step(mut self, n: usize) -> Self {
        self.fail_on_step = Some(n);
        self
    }

    /// Total train steps executed so far.
    pub fn train_steps(&self) -> usize {
        self.train_steps
    }

    /// How many times `set_parameters` was invoked (resume + best restore).
    pub fn restores(&self) -> usize {
        self.restores
    }
}

impl Model for ScriptedModel {
    fn train_step(&mut self, _inputs: &[Vec<f64>], _targets: &[f64]) -> FitResult<()> {
        if self.eval_seen {
            // Training resumed after an evaluation phase: a new epoch began.
            self.cursor += 1;
            self.eval_seen = false;
        }
        if self.fail_on_step == Some(self.train_steps) {
            return Err(FitError::train_step("scripted train-step failure"));
        }
        self.train_steps += 1;
        self.params.insert("steps", vec![self.train_steps as f64]);
        Ok(())
    }

    fn evaluate_loss(&mut self, _inputs: &[Vec<f64>], _targets: &[f64]) -> f64 {
        self.eval_seen = true;
        match self.losses.get(self.cursor) {
            Some(loss) => *loss,
            None => self.losses.last().copied().unwrap_or(f64::INFINITY),
        }
    }

    fn predict(&self, inputs: &[Vec<f64>]) -> Vec<f64> {
        vec![0.0; inputs.len()]
    }

    fn parameters(&self) -> ParameterSnapshot {
        self.params.clone()
    }

    fn set_parameters(&mut self, params: &ParameterSnapshot) {
        self.params = params.clone();
        self.restores += 1;
    }
}
