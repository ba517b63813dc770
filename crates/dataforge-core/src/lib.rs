//! Core contracts and helpers for dataforge.
//!
//! This crate defines the generation configuration, the fixed field layouts
//! of every dataset profile, and the batch/artifact types shared by the
//! generator, the verifier and the CLI.

pub mod config;
pub mod datasets;
pub mod error;
pub mod sampling;
pub mod schema;
pub mod types;
pub mod validation;

pub use config::{
    Codec, Deadlines, GenerationConfig, KeyTransform, OutputConfig, PartitionKey, PartitionMode,
    VerifyConfig,
};
pub use datasets::{
    CategoricalExpectation, ConditionalMeasure, DatasetConfig, DatasetKind, EventsConfig, IdFormat,
    LeaderboardConfig, PropertiesConfig, StructuredEventsConfig, TenantActivityConfig,
    UsersConfig,
};
pub use error::{ConfigError, Result};
pub use sampling::{
    Categorical, DateRange, IntRange, NumericRange, PowerLaw, Skew, TimestampRange,
    WEIGHT_TOLERANCE,
};
pub use schema::{FieldDef, FieldRole, FieldType, field_index};
pub use types::{
    BatchDescriptor, DEFAULT_PARTITION_VALUE, OutputArtifact, PartitionValue, escape_partition_value,
    unescape_partition_value,
};
pub use validation::validate_config;

/// Current contract version for `config.json` and report artifacts.
pub const CONFIG_VERSION: &str = "0.1";
