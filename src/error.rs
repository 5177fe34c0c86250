//! Error types for the fitloop crate.
//!
//! Uses `thiserror` for the public error enum. Four kinds carry the crate's
//! failure semantics: configuration errors fail fast at construction, restore
//! errors are fatal to a resumed run, train-step errors abort the epoch in
//! flight, and sequence errors flag caller bugs. The remaining variants are
//! passthroughs for store I/O and record encoding.

/// Convenience alias used throughout the crate.
pub type FitResult<T> = std::result::Result<T, FitError>;

/// Top-level error type for training orchestration.
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    /// Invalid construction parameters (non-positive epoch or batch counts).
    /// Never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resume was requested but no valid checkpoint record exists, or the
    /// stored record could not be decoded. The caller decides whether to
    /// start fresh.
    #[error("Restore error: {0}")]
    Restore(String),

    /// The model collaborator's train step failed. Propagated unmodified;
    /// the epoch it interrupted is never checkpointed.
    #[error("Train step error: {0}")]
    TrainStep(String),

    /// A component method was called out of its required order. This is a
    /// programming error in the caller, not a runtime condition.
    #[error("Sequence error: {0}")]
    Sequence(String),

    /// Durable-store I/O failure surfaced at an epoch boundary.
    #[error("Store error: {0}")]
    Store(#[from] std::io::Error),

    /// Checkpoint record failed to encode.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl FitError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn restore(msg: impl Into<String>) -> Self {
        Self::Restore(msg.into())
    }

    pub fn train_step(msg: impl Into<String>) -> Self {
        Self::TrainStep(msg.into())
    }

    pub fn sequence(msg: impl Into<String>) -> Self {
        Self::Sequence(msg.into())
    }
}
