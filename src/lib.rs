//! # fitloop — resumable, self-monitoring training orchestration
//!
//! This crate drives gradient-based model fitting through an epoch/batch
//! loop with durable checkpointing and crash recovery, early stopping with
//! best-parameter restore, wall-clock progress projection, and advisory
//! health checks on the optimization process.
//!
//! The model, the dataset, the metrics sink, and the durable store are
//! collaborators behind narrow traits. [`runner::TrainingRunner`] owns the
//! epoch loop and the fixed per-epoch sequencing between them: train batches,
//! evaluate losses, emit metrics, update progress, checkpoint, health-check,
//! and only then decide whether to stop early.

// Foundation
pub mod config;
pub mod error;

// Collaborator surfaces
pub mod dataset;
pub mod metrics;
pub mod model;
pub mod store;

// Training components
pub mod checkpoint;
pub mod early_stopping;
pub mod health;
pub mod progress;
pub mod runner;

// Reference model
pub mod regression;

// Re-exports
pub use checkpoint::{CheckpointManager, CheckpointRecord};
pub use config::{RemainderPolicy, TrainingConfig};
pub use dataset::{Batch, Dataset, InMemoryDataset};
pub use early_stopping::EarlyStopping;
pub use error::{FitError, FitResult};
pub use health::{HealthSignal, HealthValidator};
pub use metrics::{MetricPoint, MetricsSink, RecordingSink, TracingSink};
pub use model::{Model, ParameterSnapshot, ScriptedModel};
pub use progress::ProgressTracker;
pub use regression::LinearRegressor;
pub use runner::{TrainingOutcome, TrainingRunner};
pub use store::{FileStore, MemoryStore, SnapshotStore};
