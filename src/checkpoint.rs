//! Resumable checkpoint records over a durable store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FitError, FitResult};
use crate::model::ParameterSnapshot;
use crate::store::SnapshotStore;

/// The durable state of a training run: everything needed to pick up where
/// the last completed epoch left off.
///
/// `next_epoch` is the epoch a resumed run executes first, not the one just
/// finished. A record saved after completing epoch 4 carries `next_epoch: 5`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub params: ParameterSnapshot,
    pub next_epoch: usize,
    pub saved_at: DateTime<Utc>,
}

/// Saves and restores [`CheckpointRecord`]s through a [`SnapshotStore`].
///
/// One live record per store: each save fully supersedes the previous one,
/// and the store's atomic publish guarantees a reader never pairs a snapshot
/// with the wrong epoch counter.
#[derive(Debug)]
pub struct CheckpointManager<S> {
    store: S,
}

impl<S: SnapshotStore> CheckpointManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Whether a record exists to resume from.
    pub fn has_checkpoint(&self) -> FitResult<bool> {
        Ok(self.store.read_latest()?.is_some())
    }

    /// Persists `snapshot` along with the resumption point `completed_epoch + 1`.
    pub fn save(&mut self, snapshot: ParameterSnapshot, completed_epoch: usize) -> FitResult<()> {
        let record = CheckpointRecord {
            params: snapshot,
            next_epoch: completed_epoch + 1,
            saved_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&record)?;
        self.store.write_record(&bytes)?;
        info!(next_epoch = record.next_epoch, "checkpoint saved");
        Ok(())
    }

    /// Reads back the latest record. Fails with a restore error when no
    /// record exists or the stored bytes don't decode to one.
    pub fn restore(&self) -> FitResult<CheckpointRecord> {
        let bytes = self
            .store
            .read_latest()?
            .ok_or_else(|| FitError::restore("no checkpoint record exists"))?;
        let record: CheckpointRecord = serde_json::from_slice(&bytes)
            .map_err(|e| FitError::restore(format!("stored record is not decodable: {e}")))?;
        info!(next_epoch = record.next_epoch, "checkpoint restored");
        Ok(record)
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::io;

    fn snapshot(step: f64) -> ParameterSnapshot {
        let mut params = ParameterSnapshot::new();
        params.insert("weights", vec![step, step + 0.5]);
        params
    }

    #[test]
    fn test_save_then_restore_returns_the_next_epoch() {
        let mut manager = CheckpointManager::new(MemoryStore::new());
        manager.save(snapshot(1.0), 4).unwrap();

        let record = manager.restore().unwrap();
        assert_eq!(record.next_epoch, 5);
        assert_eq!(record.params, snapshot(1.0));
    }

    #[test]
    fn test_each_save_supersedes_the_previous_record() {
        let mut manager = CheckpointManager::new(MemoryStore::new());
        manager.save(snapshot(1.0), 0).unwrap();
        manager.save(snapshot(2.0), 1).unwrap();

        let record = manager.restore().unwrap();
        assert_eq!(record.next_epoch, 2);
        assert_eq!(record.params, snapshot(2.0));
    }

    #[test]
    fn test_restored_parameter_values_are_bit_exact() {
        // Full-precision values that a lossy float parse moves by one ulp.
        let mut params = ParameterSnapshot::new();
        params.insert(
            "weights",
            vec![927096.5358365043, -0.000123456789012345, 0.1 + 0.2],
        );
        params.insert("bias", vec![2.2250738585072014e-308]);

        let mut manager = CheckpointManager::new(MemoryStore::new());
        manager.save(params.clone(), 0).unwrap();

        let restored = manager.restore().unwrap().params;
        for (name, values) in params.iter() {
            let round_tripped = restored.get(name).unwrap();
            for (saved, back) in values.iter().zip(round_tripped) {
                assert_eq!(saved.to_bits(), back.to_bits(), "{name}: {saved} vs {back}");
            }
        }
    }

    #[test]
    fn test_restore_without_a_record_is_a_restore_error() {
        let manager = CheckpointManager::new(MemoryStore::new());
        assert!(!manager.has_checkpoint().unwrap());
        assert!(matches!(manager.restore(), Err(FitError::Restore(_))));
    }

    #[test]
    fn test_corrupt_record_is_a_restore_error() {
        let mut store = MemoryStore::new();
        store.write_record(b"definitely not json").unwrap();

        let manager = CheckpointManager::new(store);
        assert!(manager.has_checkpoint().unwrap());
        assert!(matches!(manager.restore(), Err(FitError::Restore(_))));
    }

    #[test]
    fn test_store_write_failures_surface_as_store_errors() {
        struct BrokenStore;

        impl SnapshotStore for BrokenStore {
            fn write_record(&mut self, _bytes: &[u8]) -> io::Result<()> {
                Err(io::Error::other("disk on fire"))
            }

            fn read_latest(&self) -> io::Result<Option<Vec<u8>>> {
                Ok(None)
            }
        }

        let mut manager = CheckpointManager::new(BrokenStore);
        assert!(matches!(
            manager.save(ParameterSnapshot::new(), 0),
            Err(FitError::Store(_))
        ));
    }
}
