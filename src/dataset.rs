//! Training data access.
//!
//! The runner batches by index: it decides which row indices form a batch and
//! asks the dataset to materialize them. Datasets stay oblivious to epoch
//! structure, shuffling, and remainder policy.

use crate::error::{FitError, FitResult};

/// An owned batch of examples, one input row and one target per example.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inputs: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Read access to a fixed-size collection of training examples.
pub trait Dataset {
    /// Number of examples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materializes the rows at `indices`, in the given order.
    fn gather(&self, indices: &[usize]) -> Batch;
}

/// A dataset held entirely in memory as parallel input/target vectors.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    inputs: Vec<Vec<f64>>,
    targets: Vec<f64>,
}

impl InMemoryDataset {
    /// Builds a dataset from parallel vectors. Mismatched lengths are a
    /// configuration error.
    pub fn new(inputs: Vec<Vec<f64>>, targets: Vec<f64>) -> FitResult<Self> {
        if inputs.len() != targets.len() {
            return Err(FitError::config(format!(
                "dataset has {} input rows but {} targets",
                inputs.len(),
                targets.len()
            )));
        }
        Ok(Self { inputs, targets })
    }

    pub fn inputs(&self) -> &[Vec<f64>] {
        &self.inputs
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.targets.len()
    }

    fn gather(&self, indices: &[usize]) -> Batch {
        let inputs = indices.iter().map(|&i| self.inputs[i].clone()).collect();
        let targets = indices.iter().map(|&i| self.targets[i]).collect();
        Batch { inputs, targets }
    }
}
