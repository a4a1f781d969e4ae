//! Error types for armada-state

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the state persistence layer.
///
/// Readers must be able to tell "no record yet" (`NotFound`, a normal
/// condition) apart from "record present but unparsable" (`Corrupt`, which
/// must be surfaced, never treated as absence).
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record has been written for this key yet
    #[error("no {stage} record for {repo}")]
    NotFound { repo: String, stage: String },

    /// A record exists on disk but cannot be parsed
    #[error("corrupt {stage} record at {path}: {detail}")]
    Corrupt {
        stage: String,
        path: PathBuf,
        detail: String,
    },

    /// The (repo, stage) combination is not a valid store key
    #[error("invalid store key: {0}")]
    InvalidKey(String),

    /// Serialization error
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this error is the ordinary "not yet run" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
