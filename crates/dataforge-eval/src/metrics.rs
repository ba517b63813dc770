use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metrics contract version for `verification.json`.
pub const METRICS_VERSION: &str = "0.1";

/// Machine-readable result of re-reading a generated dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationMetrics {
    pub metrics_version: String,
    pub dataset: String,
    pub root: String,
    /// Run ids found in the file footers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub run_ids: Vec<String>,
    pub files: u64,
    pub bytes: u64,
    pub rows_expected: u64,
    pub rows_found: u64,
    pub row_index: RowIndexSummary,
    pub partitions: Vec<PartitionMetrics>,
    pub partition_check: PartitionCheckSummary,
    pub categories: Vec<CategoryMetrics>,
    pub measures: Vec<MeasureMetrics>,
    pub identifiers: Vec<IdentifierMetrics>,
    pub time_ranges: Vec<TimeRangeMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<ConditionalMetrics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payloads: Vec<PayloadMetrics>,
    /// Violation counts by code.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub violations: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<WarningItem>,
    pub performance: PerformanceMetrics,
}

/// Uniqueness and completeness of `row_index`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowIndexSummary {
    pub distinct: u64,
    pub duplicates: u64,
    pub missing: u64,
    pub out_of_range: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionMetrics {
    pub partition: String,
    pub files: u64,
    pub rows: u64,
}

/// Rows whose content disagrees with the partition path they were found in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionCheckSummary {
    pub keys: Vec<String>,
    pub rows_checked: u64,
    pub mismatches: u64,
    /// Key columns absent from the files and taken from the path.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_encoded: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryMetrics {
    pub field: String,
    pub total: u64,
    pub labels: Vec<CategoryShare>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryShare {
    pub label: String,
    pub count: u64,
    pub share: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureMetrics {
    pub field: String,
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierMetrics {
    pub field: String,
    pub distinct: u64,
    pub top: Vec<IdentifierCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierCount {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRangeMetrics {
    pub field: String,
    pub min: Option<String>,
    pub max: Option<String>,
}

/// A measure that must be zero outside a set of categories and within
/// bounds inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalMetrics {
    pub measure: String,
    pub category_field: String,
    pub categories: Vec<String>,
    pub rows_in_categories: u64,
    pub total: f64,
    pub mean: Option<f64>,
    /// Rows outside the categories with a nonzero measure.
    pub nonzero_outside: u64,
    /// Rows inside the categories with a measure out of bounds.
    pub out_of_bounds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadMetrics {
    pub field: String,
    pub rows: u64,
    pub invalid: u64,
}

/// Structured warning entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningItem {
    pub code: String,
    pub path: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Performance timings for the verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub load_ms: u128,
    pub total_ms: u128,
    pub rows_per_sec: f64,
}
