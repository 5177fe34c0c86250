//! A linear regression model trained by gradient descent on mean squared
//! error. Small enough to reason about, real enough to exercise a full
//! training run end to end.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{FitError, FitResult};
use crate::model::{Model, ParameterSnapshot};

/// `y = w · x + b`, fitted by full-batch or mini-batch gradient descent.
///
/// Exposes two named parameters, `"weights"` and `"bias"`.
#[derive(Debug, Clone)]
pub struct LinearRegressor {
    weights: Vec<f64>,
    bias: f64,
    learning_rate: f64,
}

impl LinearRegressor {
    /// A regressor for `num_features` input features with randomly
    /// initialized weights.
    pub fn new(num_features: usize, learning_rate: f64) -> FitResult<Self> {
        Self::init(num_features, learning_rate, &mut rand::thread_rng())
    }

    /// Deterministic variant of [`LinearRegressor::new`] for reproducible
    /// runs and tests.
    pub fn with_seed(num_features: usize, learning_rate: f64, seed: u64) -> FitResult<Self> {
        Self::init(num_features, learning_rate, &mut StdRng::seed_from_u64(seed))
    }

    fn init<R: Rng>(num_features: usize, learning_rate: f64, rng: &mut R) -> FitResult<Self> {
        if !(learning_rate > 0.0 && learning_rate.is_finite()) {
            return Err(FitError::config(format!(
                "learning rate must be positive and finite, got {learning_rate}"
            )));
        }
        let weights = (0..num_features).map(|_| rng.gen_range(-0.1..0.1)).collect();
        Ok(Self {
            weights,
            bias: 0.0,
            learning_rate,
        })
    }

    fn predict_one(&self, row: &[f64]) -> f64 {
        let dot: f64 = self.weights.iter().zip(row).map(|(w, x)| w * x).sum();
        dot + self.bias
    }

    fn check_width(&self, inputs: &[Vec<f64>]) -> FitResult<()> {
        if let Some(row) = inputs.iter().find(|row| row.len() != self.weights.len()) {
            return Err(FitError::train_step(format!(
                "input row has {} features, model expects {}",
                row.len(),
                self.weights.len()
            )));
        }
        Ok(())
    }
}

impl Model for LinearRegressor {
    fn train_step(&mut self, inputs: &[Vec<f64>], targets: &[f64]) -> FitResult<()> {
        if inputs.is_empty() {
            return Err(FitError::train_step("cannot train on an empty batch"));
        }
        self.check_width(inputs)?;

        let n = inputs.len() as f64;
        let mut grad_w = vec![0.0; self.weights.len()];
        let mut grad_b = 0.0;
        for (row, &target) in inputs.iter().zip(targets) {
            let residual = self.predict_one(row) - target;
            for (g, &x) in grad_w.iter_mut().zip(row) {
                *g += 2.0 * residual * x / n;
            }
            grad_b += 2.0 * residual / n;
        }

        for (w, g) in self.weights.iter_mut().zip(&grad_w) {
            *w -= self.learning_rate * g;
        }
        self.bias -= self.learning_rate * grad_b;
        Ok(())
    }

    fn evaluate_loss(&mut self, inputs: &[Vec<f64>], targets: &[f64]) -> f64 {
        if inputs.is_empty() {
            return 0.0;
        }
        let n = inputs.len() as f64;
        inputs
            .iter()
            .zip(targets)
            .map(|(row, &target)| (self.predict_one(row) - target).powi(2))
            .sum::<f64>()
            / n
    }

    fn predict(&self, inputs: &[Vec<f64>]) -> Vec<f64> {
        inputs.iter().map(|row| self.predict_one(row)).collect()
    }

    fn parameters(&self) -> ParameterSnapshot {
        let mut snapshot = ParameterSnapshot::new();
        snapshot.insert("weights", self.weights.clone());
        snapshot.insert("bias", vec![self.bias]);
        snapshot
    }

    fn set_parameters(&mut self, params: &ParameterSnapshot) {
        if let Some(weights) = params.get("weights") {
            self.weights = weights.to_vec();
        }
        if let Some(bias) = params.get("bias").and_then(|b| b.first()) {
            self.bias = *bias;
        }
    }
}
