use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::datasets::DatasetConfig;

/// Complete, immutable description of one generation run.
///
/// Built once (defaults, then a TOML file, then environment and flags),
/// validated with [`GenerationConfig::validate`], and passed by reference to
/// every stage afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GenerationConfig {
    /// Number of records to generate across all batches.
    pub total_rows: u64,
    /// Run seed; batch seeds are derived from it.
    pub seed: u64,
    /// Worker count. Defaults to the available parallelism.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Upper bound on rows per batch; raises the batch count when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_batch_rows: Option<u64>,
    pub mode: PartitionMode,
    /// Partition keys. Defaults to the dataset's natural partitioning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_by: Option<Vec<PartitionKey>>,
    /// Field the records of each partition are ordered by.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    pub deadlines: Deadlines,
    pub output: OutputConfig,
    pub verify: VerifyConfig,
    pub dataset: DatasetConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            total_rows: 1_000_000,
            seed: 42,
            workers: None,
            max_batch_rows: None,
            mode: PartitionMode::Global,
            partition_by: None,
            sort_by: None,
            deadlines: Deadlines::default(),
            output: OutputConfig::default(),
            verify: VerifyConfig::default(),
            dataset: DatasetConfig::default(),
        }
    }
}

impl GenerationConfig {
    /// Resolved worker count, never zero.
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }

    /// Resolved writer pool size, never zero.
    pub fn write_worker_count(&self) -> usize {
        self.output
            .write_workers
            .unwrap_or_else(|| self.worker_count())
            .max(1)
    }

    pub fn partition_keys(&self) -> Vec<PartitionKey> {
        self.partition_by
            .clone()
            .unwrap_or_else(|| self.dataset.default_partition_keys())
    }

    pub fn sort_field(&self) -> &str {
        self.sort_by
            .as_deref()
            .unwrap_or_else(|| self.dataset.default_sort_field())
    }
}

/// When records are assigned to partitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PartitionMode {
    /// Collect every batch, then partition and write once.
    #[default]
    Global,
    /// Partition and write each batch as it arrives; one file per batch and
    /// partition.
    Streaming,
}

impl PartitionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PartitionMode::Global => "global",
            PartitionMode::Streaming => "streaming",
        }
    }
}

impl FromStr for PartitionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(PartitionMode::Global),
            "streaming" => Ok(PartitionMode::Streaming),
            other => Err(format!("unknown partition mode '{other}'")),
        }
    }
}

/// Derived partition key: `<name>=<transform(field)>` in the output path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PartitionKey {
    /// Directory key, e.g. `date`.
    pub name: String,
    /// Source field of the record.
    pub field: String,
    #[serde(default)]
    pub transform: KeyTransform,
}

impl PartitionKey {
    pub fn new(name: &str, field: &str, transform: KeyTransform) -> Self {
        Self {
            name: name.to_string(),
            field: field.to_string(),
            transform,
        }
    }
}

/// `[name=]field[:transform]`, e.g. `date=event_at:day` or `tenant`.
impl FromStr for PartitionKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let (name, rest) = match value.split_once('=') {
            Some((name, rest)) => (Some(name.trim()), rest.trim()),
            None => (None, value),
        };
        let (field, transform) = match rest.split_once(':') {
            Some((field, transform)) => (field.trim(), transform.parse()?),
            None => (rest, KeyTransform::Identity),
        };
        if field.is_empty() {
            return Err(format!("partition key '{value}' names no field"));
        }
        Ok(PartitionKey::new(name.unwrap_or(field), field, transform))
    }
}

/// How a partition value is derived from its source field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KeyTransform {
    /// Field value rendered as text.
    #[default]
    Identity,
    /// `YYYY`
    Year,
    /// `YYYY-MM`
    Month,
    /// `YYYY-MM-DD`
    Day,
    /// `YYYY-MM-DDTHH`
    Hour,
}

impl KeyTransform {
    /// Identity rendering of a timestamp; `:` is not allowed in a segment.
    pub const IDENTITY_TIMESTAMP_FORMAT: &'static str = "%Y-%m-%dT%H-%M-%S";

    pub fn as_str(self) -> &'static str {
        match self {
            KeyTransform::Identity => "identity",
            KeyTransform::Year => "year",
            KeyTransform::Month => "month",
            KeyTransform::Day => "day",
            KeyTransform::Hour => "hour",
        }
    }

    /// Partition value of a timestamp. `Identity` keeps second precision.
    pub fn render_timestamp(self, value: NaiveDateTime) -> String {
        let pattern = match self {
            KeyTransform::Identity => Self::IDENTITY_TIMESTAMP_FORMAT,
            KeyTransform::Year => "%Y",
            KeyTransform::Month => "%Y-%m",
            KeyTransform::Day => "%Y-%m-%d",
            KeyTransform::Hour => "%Y-%m-%dT%H",
        };
        value.format(pattern).to_string()
    }

    pub fn render_date(self, value: NaiveDate) -> String {
        let pattern = match self {
            KeyTransform::Identity | KeyTransform::Day => "%Y-%m-%d",
            KeyTransform::Year => "%Y",
            KeyTransform::Month => "%Y-%m",
            KeyTransform::Hour => "%Y-%m-%dT00",
        };
        value.format(pattern).to_string()
    }
}

impl FromStr for KeyTransform {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "identity" => Ok(KeyTransform::Identity),
            "year" => Ok(KeyTransform::Year),
            "month" => Ok(KeyTransform::Month),
            "day" => Ok(KeyTransform::Day),
            "hour" => Ok(KeyTransform::Hour),
            other => Err(format!("unknown key transform '{other}'")),
        }
    }
}

/// Columnar compression codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    #[default]
    Snappy,
    Zstd,
    Gzip,
    Lz4,
    Uncompressed,
}

impl Codec {
    pub fn as_str(self) -> &'static str {
        match self {
            Codec::Snappy => "snappy",
            Codec::Zstd => "zstd",
            Codec::Gzip => "gzip",
            Codec::Lz4 => "lz4",
            Codec::Uncompressed => "uncompressed",
        }
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "snappy" => Ok(Codec::Snappy),
            "zstd" => Ok(Codec::Zstd),
            "gzip" => Ok(Codec::Gzip),
            "lz4" => Ok(Codec::Lz4),
            "uncompressed" | "none" => Ok(Codec::Uncompressed),
            other => Err(format!("unknown codec '{other}'")),
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional deadlines; an expired deadline fails the run like a worker error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Deadlines {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_timeout_secs: Option<u64>,
}

impl Deadlines {
    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_secs.map(Duration::from_secs)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_secs.map(Duration::from_secs)
    }
}

/// Output layout and file settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OutputConfig {
    pub root: PathBuf,
    pub codec: Codec,
    /// File name prefix; the unique token is appended.
    pub file_prefix: String,
    /// Drop columns that are fully encoded in the partition path.
    pub omit_partition_columns: bool,
    /// Clear existing Parquet output under `root` before writing.
    pub overwrite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_workers: Option<usize>,
    pub row_group_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/events"),
            codec: Codec::Snappy,
            file_prefix: "part".to_string(),
            omit_partition_columns: false,
            overwrite: false,
            write_workers: None,
            row_group_size: 32 * 1024,
        }
    }
}

/// Read-back verification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct VerifyConfig {
    pub enabled: bool,
    /// Allowed absolute drift between observed and configured shares.
    pub tolerance: f64,
    /// Number of most frequent identifiers listed per identifier field.
    pub top_identifiers: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance: 0.01,
            top_identifiers: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_keys_parse_from_flag_syntax() {
        let key: PartitionKey = "date=event_at:day".parse().expect("full form");
        assert_eq!(key, PartitionKey::new("date", "event_at", KeyTransform::Day));

        let key: PartitionKey = "tenant".parse().expect("bare field");
        assert_eq!(key, PartitionKey::new("tenant", "tenant", KeyTransform::Identity));

        assert!("date=event_at:week".parse::<PartitionKey>().is_err());
        assert!("date=".parse::<PartitionKey>().is_err());
    }

    #[test]
    fn codec_parses_case_insensitively() {
        assert_eq!("ZSTD".parse::<Codec>(), Ok(Codec::Zstd));
        assert_eq!("none".parse::<Codec>(), Ok(Codec::Uncompressed));
        assert!("brotli".parse::<Codec>().is_err());
    }

    #[test]
    fn default_events_partition_by_day() {
        let config = GenerationConfig::default();
        let keys = config.partition_keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name, "date");
        assert_eq!(keys[0].field, "event_at");
        assert_eq!(keys[0].transform, KeyTransform::Day);
        assert_eq!(config.sort_field(), "event_at");
    }

    #[test]
    fn timestamps_truncate_to_granularity() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(17, 45, 12))
            .unwrap();
        assert_eq!(KeyTransform::Day.render_timestamp(ts), "2024-03-09");
        assert_eq!(KeyTransform::Month.render_timestamp(ts), "2024-03");
        assert_eq!(KeyTransform::Year.render_timestamp(ts), "2024");
        assert_eq!(KeyTransform::Hour.render_timestamp(ts), "2024-03-09T17");
        assert_eq!(KeyTransform::Identity.render_date(ts.date()), "2024-03-09");
    }

    #[test]
    fn explicit_workers_win() {
        let config = GenerationConfig {
            workers: Some(3),
            ..GenerationConfig::default()
        };
        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.write_worker_count(), 3);
    }
}
