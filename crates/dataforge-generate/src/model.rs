use serde::{Deserialize, Serialize};

use dataforge_core::{BatchDescriptor, GenerationConfig, OutputArtifact};

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every partition was written.
    Succeeded,
    /// Some partitions failed to write; the others are in place.
    Degraded,
    /// A batch failed or a deadline expired; the run stopped.
    Aborted,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Degraded => "degraded",
            RunStatus::Aborted => "aborted",
        }
    }
}

/// Outcome of one completed batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: u32,
    pub start_index: u64,
    pub end_index: u64,
    pub seed: u64,
    pub rows: u64,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn new(batch: &BatchDescriptor, duration_ms: u64) -> Self {
        Self {
            batch_id: batch.batch_id,
            start_index: batch.start_index,
            end_index: batch.end_index,
            seed: batch.seed,
            rows: batch.len(),
            duration_ms,
        }
    }
}

/// A partition that could not be written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionFailure {
    pub partition: String,
    pub rows: u64,
    pub error: String,
}

/// Report for a generation run, written as `generation_report.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub dataset: String,
    pub status: RunStatus,
    pub seed: u64,
    pub total_rows: u64,
    pub rows_generated: u64,
    pub rows_written: u64,
    pub workers: usize,
    pub write_workers: usize,
    pub mode: String,
    pub codec: String,
    pub partition_keys: Vec<String>,
    pub sort_by: String,
    pub batches: Vec<BatchReport>,
    pub artifacts: Vec<OutputArtifact>,
    pub failed_partitions: Vec<PartitionFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub generation_ms: u64,
    pub write_ms: u64,
    pub duration_ms: u64,
    pub bytes_written: u64,
    pub rows_per_sec: f64,
    pub throughput_bytes_per_sec: f64,
}

impl GenerationReport {
    pub fn new(run_id: String, config: &GenerationConfig) -> Self {
        Self {
            run_id,
            dataset: config.dataset.kind().to_string(),
            status: RunStatus::Succeeded,
            seed: config.seed,
            total_rows: config.total_rows,
            rows_generated: 0,
            rows_written: 0,
            workers: config.worker_count(),
            write_workers: config.write_worker_count(),
            mode: config.mode.as_str().to_string(),
            codec: config.output.codec.to_string(),
            partition_keys: config
                .partition_keys()
                .into_iter()
                .map(|key| key.name)
                .collect(),
            sort_by: config.sort_field().to_string(),
            batches: Vec::new(),
            artifacts: Vec::new(),
            failed_partitions: Vec::new(),
            error: None,
            generation_ms: 0,
            write_ms: 0,
            duration_ms: 0,
            bytes_written: 0,
            rows_per_sec: 0.0,
            throughput_bytes_per_sec: 0.0,
        }
    }

    pub fn record_batch(&mut self, batch: BatchReport) {
        self.rows_generated += batch.rows;
        self.batches.push(batch);
    }

    pub fn record_artifact(&mut self, artifact: OutputArtifact) {
        self.rows_written += artifact.row_count;
        self.bytes_written += artifact.byte_size;
        self.artifacts.push(artifact);
    }

    pub fn record_partition_failure(&mut self, partition: String, rows: u64, error: String) {
        self.status = RunStatus::Degraded;
        self.failed_partitions.push(PartitionFailure {
            partition,
            rows,
            error,
        });
    }

    pub fn record_abort(&mut self, error: String) {
        self.status = RunStatus::Aborted;
        self.error = Some(error);
    }

    pub fn record_timing(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
        let seconds = duration_ms as f64 / 1000.0;
        if seconds > 0.0 {
            self.rows_per_sec = self.rows_written as f64 / seconds;
            self.throughput_bytes_per_sec = self.bytes_written as f64 / seconds;
        }
    }
}
