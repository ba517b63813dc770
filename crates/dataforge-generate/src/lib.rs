//! Parallel, seeded generation of partitioned Parquet datasets.
//!
//! A run splits the row range into batches, generates them on a bounded
//! worker pool, groups the records by their partition key and publishes one
//! Parquet file per partition in a Hive-style layout.

pub mod batch;
pub mod datasets;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod model;
pub mod order;
pub mod output;
pub mod partition;
pub mod pool;
pub mod record;
pub mod samplers;
pub mod seed;

pub use batch::generate_batch;
pub use dispatch::{dispatch, plan_batches};
pub use engine::{GENERATION_REPORT_FILE, GenerationEngine, GenerationResult};
pub use errors::{GenerationError, SamplerError, WriteError};
pub use model::{BatchReport, GenerationReport, PartitionFailure, RunStatus};
pub use output::{PartitionWriter, list_parquet_files, partition_segments};
pub use partition::Partitioner;
pub use record::{DatasetRecord, FieldValue, RecordGenerator};
