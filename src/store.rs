//! Durable byte-blob storage for checkpoint records.
//!
//! A store holds at most one record. Writing replaces the previous record in
//! one atomic publish (write to a `.tmp` sibling, then rename), so a crashed
//! writer or concurrent reader never observes a half-written record.

use std::io;
use std::path::{Path, PathBuf};

/// Single-slot record storage, atomic at the byte-blob granularity.
pub trait SnapshotStore {
    /// Replaces the stored record with `bytes`. Last write wins.
    fn write_record(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Returns the most recently written record, or `None` if nothing was
    /// ever written.
    fn read_latest(&self) -> io::Result<Option<Vec<u8>>>;
}

/// Stores the record as a single file, published via tmp-file-then-rename.
///
/// Creates parent directories on first write if they don't exist.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileStore {
    fn write_record(&mut self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn read_latest(&self) -> io::Result<Option<Vec<u8>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        std::fs::read(&self.path).map(Some)
    }
}

/// Keeps the record in memory. Useful for tests and throwaway runs where
/// durability across processes doesn't matter.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    record: Option<Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn write_record(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.record = Some(bytes.to_vec());
        Ok(())
    }

    fn read_latest(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::new(dir.path().join("run.ckpt"));

        assert_eq!(store.read_latest().unwrap(), None);
        store.write_record(b"first").unwrap();
        assert_eq!(store.read_latest().unwrap(), Some(b"first".to_vec()));
    }

    #[test]
    fn test_file_store_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::new(dir.path().join("run.ckpt"));

        store.write_record(b"first").unwrap();
        store.write_record(b"second").unwrap();
        assert_eq!(store.read_latest().unwrap(), Some(b"second".to_vec()));
    }

    #[test]
    fn test_file_store_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("run.ckpt");
        let mut store = FileStore::new(&path);

        store.write_record(b"data").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_file_store_no_tmp_leftover() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.ckpt");
        let mut store = FileStore::new(&path);

        store.write_record(b"data").unwrap();

        // The .tmp file should not remain
        let tmp = path.with_extension("tmp");
        assert!(!tmp.exists());
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.read_latest().unwrap(), None);

        store.write_record(b"alpha").unwrap();
        store.write_record(b"beta").unwrap();
        assert_eq!(store.read_latest().unwrap(), Some(b"beta".to_vec()));
    }
}
