//! The top-level training loop.
//!
//! The runner owns the epoch and batch loops and drives its collaborators in
//! a fixed per-epoch order: train batches, evaluate losses, emit metrics,
//! update progress, persist a checkpoint, run health checks (early epochs
//! only), then consult early stopping. The early-stop decision is always the
//! last action of an epoch, so the checkpoint and health checks observe the
//! epoch's true final state before any halt.

use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, error, info};

use crate::checkpoint::CheckpointManager;
use crate::config::{RemainderPolicy, TrainingConfig};
use crate::dataset::Dataset;
use crate::early_stopping::EarlyStopping;
use crate::error::{FitError, FitResult};
use crate::health::HealthValidator;
use crate::metrics::{MetricsSink, TracingSink, BATCH_TIME_AVG, LOSS_TRAIN, LOSS_VAL};
use crate::model::{Model, ParameterSnapshot};
use crate::progress::ProgressTracker;
use crate::store::SnapshotStore;

/// What a finished (or early-stopped) run looked like.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Epochs executed by this call, excluding any resumed-over epochs.
    pub epochs_run: usize,
    /// The epoch a subsequent resume would execute first.
    pub next_epoch: usize,
    /// Whether early stopping ended the run before the target epoch count.
    pub stopped_early: bool,
    /// Best validation loss observed, if any epoch completed.
    pub best_validation_loss: Option<f64>,
    /// Whether the best-parameter snapshot was written back into the model.
    pub restored_best: bool,
    /// Wall-clock duration of this call.
    pub time_taken: Duration,
}

/// Drives a model through a resumable, self-monitoring training run.
///
/// The runner is the sole caller of everything that mutates parameter state:
/// train steps, the resume restore, and the final best-snapshot restore. Strict
/// sequencing inside [`TrainingRunner::run`] is what keeps those three from
/// ever interleaving.
#[derive(Debug)]
pub struct TrainingRunner<M, S, K = TracingSink> {
    config: TrainingConfig,
    model: M,
    checkpoints: CheckpointManager<S>,
    metrics: K,
    initial_params: ParameterSnapshot,
    iteration: usize,
    has_run: bool,
}

impl<M: Model, S: SnapshotStore> TrainingRunner<M, S> {
    /// A runner that reports metrics through tracing.
    pub fn new(config: TrainingConfig, model: M, store: S) -> FitResult<Self> {
        Self::with_metrics(config, model, store, TracingSink)
    }
}

impl<M: Model, S: SnapshotStore, K: MetricsSink> TrainingRunner<M, S, K> {
    /// A runner with a caller-supplied metrics sink.
    pub fn with_metrics(config: TrainingConfig, model: M, store: S, metrics: K) -> FitResult<Self> {
        config.validate()?;
        let initial_params = model.parameters();
        Ok(Self {
            config,
            model,
            checkpoints: CheckpointManager::new(store),
            metrics,
            initial_params,
            iteration: 0,
            has_run: false,
        })
    }

    /// Trains until the target epoch count or an early stop, whichever comes
    /// first, then restores the best-seen parameters into the model.
    ///
    /// With `resume` set, picks up from the latest checkpoint record and
    /// executes exactly the epoch it names next; a missing or undecodable
    /// record is a restore error. Without it, a rerun on an already-used
    /// runner starts over from the parameters the model held at
    /// construction. A failing train step aborts the run as-is, without
    /// checkpointing the partial epoch.
    pub fn run<D, V>(&mut self, training: &D, validation: &V, resume: bool) -> FitResult<TrainingOutcome>
    where
        D: Dataset + ?Sized,
        V: Dataset + ?Sized,
    {
        if training.is_empty() {
            return Err(FitError::config("training dataset is empty"));
        }
        if validation.is_empty() {
            return Err(FitError::config("validation dataset is empty"));
        }

        let start_epoch = if resume {
            let record = self.checkpoints.restore()?;
            self.model.set_parameters(&record.params);
            // Continue the sink's iteration count; a long-lived sink must
            // never see it move backwards.
            self.iteration = self.iteration.max(record.next_epoch);
            record.next_epoch
        } else {
            if self.has_run {
                self.model.set_parameters(&self.initial_params);
            }
            0
        };
        self.has_run = true;
        info!(
            start_epoch,
            target_epochs = self.config.epochs,
            batch_size = self.config.batch_size,
            resume,
            "starting training run"
        );

        let run_started = Instant::now();
        let mut progress = ProgressTracker::new(session_units(self.config.epochs, start_epoch))?;
        progress.start();
        let mut stopping = EarlyStopping::new(self.config.max_stale_checks);
        let mut health = HealthValidator::new();
        let mut rng = rand::thread_rng();

        let mut epochs_run = 0;
        let mut next_epoch = start_epoch;
        let mut stopped_early = false;

        for epoch in start_epoch..self.config.epochs {
            let batches = partition_indices(
                training.len(),
                self.config.batch_size,
                self.config.remainder,
                &mut rng,
            );

            let mut batch_secs = 0.0;
            let mut final_batch = None;
            for (batch_index, indices) in batches.iter().enumerate() {
                let batch = training.gather(indices);
                let batch_started = Instant::now();
                if let Err(err) = self.model.train_step(&batch.inputs, &batch.targets) {
                    error!(epoch, batch_index, error = %err, "train step failed, aborting run");
                    return Err(err);
                }
                let secs = batch_started.elapsed().as_secs_f64();
                debug!(epoch, batch_index, batch_len = batch.len(), secs, "batch trained");
                batch_secs += secs;
                final_batch = Some(batch);
            }
            let batch_time_avg = batch_secs / batches.len() as f64;

            // The training loss is probed on the epoch's final batch rather
            // than the whole set; it is a cheap trend indicator, not a
            // precise quantity.
            let loss_train = match &final_batch {
                Some(batch) => self.model.evaluate_loss(&batch.inputs, &batch.targets),
                None => 0.0,
            };
            let loss_val = self.validation_loss(validation);

            self.metrics.emit(LOSS_TRAIN, loss_train, self.iteration);
            self.metrics.emit(LOSS_VAL, loss_val, self.iteration);
            self.metrics.emit(BATCH_TIME_AVG, batch_time_avg, self.iteration);
            self.iteration += 1;

            progress.update(1.0)?;
            let eta_secs = progress.seconds_remaining()?;
            info!(epoch, loss_train, loss_val, eta_secs, "epoch complete");

            self.checkpoints.save(self.model.parameters(), epoch)?;

            if epoch < self.config.health_check_epochs {
                health.check(loss_val, &self.model.parameters());
            }

            epochs_run += 1;
            next_epoch = epoch + 1;

            if stopping.check_and_record(loss_val, &self.model) {
                info!(epoch, best_loss = stopping.best_loss(), "early stopping triggered");
                stopped_early = true;
                break;
            }
        }

        let restored_best = stopping.restore_best(&mut self.model);
        let best_validation_loss = stopping.best_snapshot().map(|_| stopping.best_loss());
        let time_taken = run_started.elapsed();
        info!(
            epochs_run,
            stopped_early,
            restored_best,
            time_secs = time_taken.as_secs_f64(),
            "training run finished"
        );

        Ok(TrainingOutcome {
            epochs_run,
            next_epoch,
            stopped_early,
            best_validation_loss,
            restored_best,
            time_taken,
        })
    }

    /// Predictions for every row, evaluated in bounded-size chunks so a large
    /// dataset never has to fit through the model in one call.
    pub fn predict<D: Dataset + ?Sized>(&self, dataset: &D) -> Vec<f64> {
        let len = dataset.len();
        if len == 0 {
            return Vec::new();
        }
        let chunk = self.config.eval_chunk().min(len);
        let indices: Vec<usize> = (0..len).collect();
        let mut predictions = Vec::with_capacity(len);
        for piece in indices.chunks(chunk) {
            let batch = dataset.gather(piece);
            predictions.extend(self.model.predict(&batch.inputs));
        }
        predictions
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn metrics(&self) -> &K {
        &self.metrics
    }

    pub fn checkpoints(&self) -> &CheckpointManager<S> {
        &self.checkpoints
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Validation loss over the whole set, evaluated chunk by chunk and
    /// averaged as a mean of chunk means. When the final chunk is smaller
    /// than the rest this is not a weighted mean; the discrepancy is a known
    /// approximation kept for continuity of reported values.
    fn validation_loss<V: Dataset + ?Sized>(&mut self, validation: &V) -> f64 {
        let len = validation.len();
        let chunk = self.config.eval_chunk().min(len);
        let indices: Vec<usize> = (0..len).collect();
        let mut total = 0.0;
        let mut chunks = 0usize;
        for piece in indices.chunks(chunk) {
            let batch = validation.gather(piece);
            total += self.model.evaluate_loss(&batch.inputs, &batch.targets);
            chunks += 1;
        }
        total / chunks as f64
    }
}

/// Shuffles `0..len` and partitions it into per-epoch batches.
///
/// `Fold` spreads any remainder across the leading batches so sizes differ by
/// at most one and every index appears exactly once. `Drop` keeps only full
/// batches and discards the remainder. Either way a dataset smaller than one
/// batch still yields a single undersized batch.
fn partition_indices<R: Rng>(
    len: usize,
    batch_size: usize,
    remainder: RemainderPolicy,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(rng);

    match remainder {
        RemainderPolicy::Fold => {
            let parts = (len / batch_size).max(1);
            let base = len / parts;
            let extra = len % parts;
            let mut batches = Vec::with_capacity(parts);
            let mut cursor = 0;
            for i in 0..parts {
                let size = base + usize::from(i < extra);
                batches.push(indices[cursor..cursor + size].to_vec());
                cursor += size;
            }
            batches
        }
        RemainderPolicy::Drop => {
            let full = len / batch_size;
            if full == 0 {
                return vec![indices];
            }
            indices.truncate(full * batch_size);
            indices.chunks(batch_size).map(<[usize]>::to_vec).collect()
        }
    }
}

/// Epochs left for this session to execute, as progress units, clamped to
/// at least one unit.
fn session_units(target_epochs: usize, start_epoch: usize) -> f64 {
    target_epochs.saturating_sub(start_epoch).max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::InMemoryDataset;
    use crate::model::{Model, ParameterSnapshot, ScriptedModel};
    use crate::regression::LinearRegressor;
    use crate::store::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sorted_sizes(batches: &[Vec<usize>]) -> Vec<usize> {
        let mut sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        sizes.sort_unstable();
        sizes
    }

    fn all_indices(batches: &[Vec<usize>]) -> Vec<usize> {
        let mut indices: Vec<usize> = batches.iter().flatten().copied().collect();
        indices.sort_unstable();
        indices
    }

    #[test]
    fn test_fold_partitions_cover_every_index_once() {
        let mut rng = StdRng::seed_from_u64(11);
        let batches = partition_indices(10, 3, RemainderPolicy::Fold, &mut rng);

        assert_eq!(batches.len(), 3);
        assert_eq!(sorted_sizes(&batches), vec![3, 3, 4]);
        assert_eq!(all_indices(&batches), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_drop_partitions_discard_the_remainder() {
        let mut rng = StdRng::seed_from_u64(11);
        let batches = partition_indices(10, 3, RemainderPolicy::Drop, &mut rng);

        assert_eq!(batches.len(), 3);
        assert_eq!(sorted_sizes(&batches), vec![3, 3, 3]);
        assert_eq!(all_indices(&batches).len(), 9);
    }

    #[test]
    fn test_even_split_has_no_remainder_to_spread() {
        let mut rng = StdRng::seed_from_u64(3);
        let batches = partition_indices(6, 2, RemainderPolicy::Fold, &mut rng);
        assert_eq!(sorted_sizes(&batches), vec![2, 2, 2]);
    }

    #[test]
    fn test_undersized_dataset_still_forms_one_batch() {
        let mut rng = StdRng::seed_from_u64(5);
        for policy in [RemainderPolicy::Fold, RemainderPolicy::Drop] {
            let batches = partition_indices(2, 5, policy, &mut rng);
            assert_eq!(batches.len(), 1);
            assert_eq!(batches[0].len(), 2);
        }
    }

    #[test]
    fn test_progress_units_count_only_the_epochs_left_to_run() {
        assert_eq!(session_units(10, 0), 10.0);
        assert_eq!(session_units(10, 8), 2.0);
        // A record at or past the target still sizes a valid tracker.
        assert_eq!(session_units(5, 5), 1.0);
        assert_eq!(session_units(3, 7), 1.0);
    }

    #[test]
    fn test_run_rejects_empty_datasets() {
        let empty = InMemoryDataset::new(vec![], vec![]).unwrap();
        let data = InMemoryDataset::new(vec![vec![1.0]], vec![1.0]).unwrap();

        let mut runner = TrainingRunner::new(
            TrainingConfig::new(1, 1),
            ScriptedModel::with_losses(vec![1.0]),
            MemoryStore::new(),
        )
        .unwrap();

        assert!(matches!(
            runner.run(&empty, &data, false),
            Err(FitError::Config(_))
        ));
        assert!(matches!(
            runner.run(&data, &empty, false),
            Err(FitError::Config(_))
        ));
    }

    #[test]
    fn test_validation_loss_is_a_mean_of_chunk_means() {
        // With w = 1, b = 0 the squared errors are 0, 1 and 4. Chunks of two
        // give chunk means 0.5 and 4.0, so the reported loss is 2.25 rather
        // than the weighted 5/3.
        let mut model = LinearRegressor::with_seed(1, 0.1, 0).unwrap();
        let mut params = ParameterSnapshot::new();
        params.insert("weights", vec![1.0]);
        params.insert("bias", vec![0.0]);
        model.set_parameters(&params);

        let mut config = TrainingConfig::new(1, 1);
        config.eval_chunk_size = Some(2);
        let mut runner = TrainingRunner::new(config, model, MemoryStore::new()).unwrap();

        let validation = InMemoryDataset::new(
            vec![vec![0.0], vec![1.0], vec![2.0]],
            vec![0.0, 0.0, 0.0],
        )
        .unwrap();
        let loss = runner.validation_loss(&validation);
        assert!((loss - 2.25).abs() < 1e-12, "loss = {loss}");
    }

    #[test]
    fn test_predict_covers_every_row_in_chunks() {
        let mut model = LinearRegressor::with_seed(1, 0.1, 0).unwrap();
        let mut params = ParameterSnapshot::new();
        params.insert("weights", vec![2.0]);
        params.insert("bias", vec![1.0]);
        model.set_parameters(&params);

        let mut config = TrainingConfig::new(1, 2);
        config.eval_chunk_size = Some(2);
        let runner = TrainingRunner::new(config, model, MemoryStore::new()).unwrap();

        let data = InMemoryDataset::new(
            vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0], vec![4.0]],
            vec![0.0; 5],
        )
        .unwrap();
        assert_eq!(runner.predict(&data), vec![1.0, 3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_invalid_config_fails_at_construction() {
        let result = TrainingRunner::new(
            TrainingConfig::new(0, 4),
            ScriptedModel::with_losses(vec![]),
            MemoryStore::new(),
        );
        assert!(matches!(result, Err(FitError::Config(_))));
    }
}
