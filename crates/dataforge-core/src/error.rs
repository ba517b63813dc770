use thiserror::Error;

/// Configuration errors. Raised before any generation work starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// The requested row count cannot be generated.
    #[error("invalid row count: {0}")]
    InvalidRowCount(String),
    /// A range whose start lies after its end.
    #[error("inverted range for '{field}': {start} > {end}")]
    InvertedRange {
        field: String,
        start: String,
        end: String,
    },
    /// Categorical weights that do not sum to 1.0.
    #[error("weights for '{field}' sum to {sum}, expected 1.0")]
    WeightsNotNormalized { field: String, sum: f64 },
    /// A distribution parameter outside its valid domain.
    #[error("invalid parameter for '{field}': {message}")]
    InvalidParameter { field: String, message: String },
    /// A partition or sort key naming a field the dataset does not have.
    #[error("unknown field '{field}' referenced by {context}")]
    UnknownField {
        context: &'static str,
        field: String,
    },
    /// A partition transform that does not apply to the field type.
    #[error("transform '{transform}' cannot be applied to field '{field}'")]
    IncompatibleTransform { field: String, transform: String },
    /// Invalid output settings.
    #[error("invalid output: {0}")]
    InvalidOutput(String),
    /// Invalid worker or batching settings.
    #[error("invalid parallelism: {0}")]
    InvalidParallelism(String),
}

impl ConfigError {
    pub(crate) fn parameter(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Convenience alias for results returned by configuration checks.
pub type Result<T> = std::result::Result<T, ConfigError>;
