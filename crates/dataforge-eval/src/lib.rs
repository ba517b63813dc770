//! Read-back verification of generated datasets.
//!
//! Re-opens every Parquet file under an output root, checks row counts,
//! row index completeness and partition placement, and summarizes the
//! distributions the generator was configured with.

pub mod engine;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod reader;
pub mod report;
pub mod stats;

pub use engine::{REPORT_FILE, VERIFICATION_FILE, VerificationEngine};
pub use errors::EvalError;
pub use metrics::{METRICS_VERSION, VerificationMetrics};
pub use model::{VerificationResult, VerifyOptions, Violation};
pub use report::render_report;
