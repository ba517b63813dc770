use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use dataforge_core::ConfigError;

use crate::model::GenerationReport;

/// Errors raised while building or drawing from a sampler.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplerError {
    #[error("invalid parameters for {sampler} sampler: {message}")]
    InvalidParameters {
        sampler: &'static str,
        message: String,
    },
    #[error("{sampler} sampler out of range: {message}")]
    OutOfRange {
        sampler: &'static str,
        message: String,
    },
}

/// Errors raised while publishing one partition file.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("path collision at {0}")]
    Collision(PathBuf),
}

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("sampler error: {0}")]
    Sampler(#[from] SamplerError),
    #[error("worker failure in batch {batch_id} [{start_index}, {end_index}): {cause}")]
    WorkerFailure {
        batch_id: u32,
        start_index: u64,
        end_index: u64,
        cause: String,
    },
    #[error("write of partition '{partition}' exceeded its deadline of {limit:?}")]
    WriteDeadline { partition: String, limit: Duration },
    #[error("output root {0} already contains parquet files; set output.overwrite to replace them")]
    OutputNotEmpty(PathBuf),
    #[error("worker pool error: {0}")]
    Pool(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("generation failed")]
    Failed(Box<GenerationReport>),
}

impl From<rayon::ThreadPoolBuildError> for GenerationError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        GenerationError::Pool(err.to_string())
    }
}
