use std::path::PathBuf;

use thiserror::Error;

/// Errors emitted by the verification engine.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
    #[error("unreadable file {path}: {message}")]
    UnreadableFile { path: PathBuf, message: String },
    #[error("row count mismatch: expected {expected}, found {observed}")]
    VerificationMismatch { expected: u64, observed: u64 },
    #[error("verification failed with {0} violation(s)")]
    Violations(u64),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
