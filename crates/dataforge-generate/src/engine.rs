use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use dataforge_core::{
    BatchDescriptor, ConfigError, DatasetConfig, GenerationConfig, PartitionMode, PartitionValue,
    field_index,
};

use crate::batch::generate_batch;
use crate::datasets::{
    EventsGenerator, LeaderboardGenerator, StructuredEventsGenerator, TenantActivityGenerator,
    UsersGenerator,
};
use crate::dispatch::{dispatch, plan_batches};
use crate::errors::GenerationError;
use crate::model::{GenerationReport, RunStatus};
use crate::order::{concat_in_batch_order, sort_records};
use crate::output::{PartitionWriter, prepare_output_root};
use crate::partition::Partitioner;
use crate::pool::{BoundedPool, TaskFailure, panic_message};
use crate::record::{DatasetRecord, RecordGenerator};

pub const GENERATION_REPORT_FILE: &str = "generation_report.json";

/// Result of a generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub run_dir: PathBuf,
    pub report: GenerationReport,
}

/// Entry point for generating a partitioned dataset from a configuration.
#[derive(Debug, Clone)]
pub struct GenerationEngine {
    config: GenerationConfig,
}

impl GenerationEngine {
    /// Fails with [`GenerationError::Config`] before any work is scheduled.
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Generate the configured dataset. `run_dir` receives
    /// `generation_report.json`; data files go to `output.root`.
    pub fn run(&self, run_dir: &Path, run_id: &str) -> Result<GenerationResult, GenerationError> {
        match &self.config.dataset {
            DatasetConfig::Users(config) => {
                self.run_generator(UsersGenerator::new(config)?, run_dir, run_id)
            }
            DatasetConfig::Events(config) => {
                self.run_generator(EventsGenerator::new(config)?, run_dir, run_id)
            }
            DatasetConfig::StructuredEvents(config) => {
                self.run_generator(StructuredEventsGenerator::new(config)?, run_dir, run_id)
            }
            DatasetConfig::Leaderboard(config) => {
                self.run_generator(LeaderboardGenerator::new(config)?, run_dir, run_id)
            }
            DatasetConfig::TenantActivity(config) => {
                self.run_generator(TenantActivityGenerator::new(config)?, run_dir, run_id)
            }
        }
    }

    /// Run the pipeline with an explicit record generator.
    pub fn run_generator<G: RecordGenerator>(
        &self,
        generator: G,
        run_dir: &Path,
        run_id: &str,
    ) -> Result<GenerationResult, GenerationError> {
        let start = Instant::now();
        std::fs::create_dir_all(run_dir)?;

        let mut report = GenerationReport::new(run_id.to_string(), &self.config);
        info!(
            run_id = %run_id,
            dataset = %report.dataset,
            total_rows = self.config.total_rows,
            workers = report.workers,
            write_workers = report.write_workers,
            mode = %report.mode,
            seed = self.config.seed,
            "generation started"
        );

        let generator = Arc::new(generator);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.run_pipeline(generator, run_id, &mut report)
        }));

        report.record_timing(start.elapsed().as_millis() as u64);

        let report_path = run_dir.join(GENERATION_REPORT_FILE);
        let write_report = |report: &GenerationReport| -> Result<(), GenerationError> {
            std::fs::write(&report_path, serde_json::to_vec_pretty(report)?)?;
            Ok(())
        };

        match outcome {
            Ok(Ok(())) => {
                write_report(&report)?;
                if report.status == RunStatus::Degraded {
                    warn!(
                        run_id = %run_id,
                        failed_partitions = report.failed_partitions.len(),
                        rows_written = report.rows_written,
                        "generation degraded"
                    );
                } else {
                    info!(
                        run_id = %run_id,
                        files = report.artifacts.len(),
                        rows_written = report.rows_written,
                        bytes_written = report.bytes_written,
                        duration_ms = report.duration_ms,
                        rows_per_sec = report.rows_per_sec,
                        "generation completed"
                    );
                }
                Ok(GenerationResult {
                    run_dir: run_dir.to_path_buf(),
                    report,
                })
            }
            Ok(Err(err)) => {
                report.record_abort(err.to_string());
                write_report(&report)?;
                warn!(
                    run_id = %run_id,
                    files = report.artifacts.len(),
                    error = %err,
                    "generation aborted"
                );
                Err(err)
            }
            Err(panic) => {
                report.record_abort(panic_message(panic));
                write_report(&report)?;
                warn!(run_id = %run_id, "generation panicked");
                Err(GenerationError::Failed(Box::new(report)))
            }
        }
    }

    fn run_pipeline<G: RecordGenerator>(
        &self,
        generator: Arc<G>,
        run_id: &str,
        report: &mut GenerationReport,
    ) -> Result<(), GenerationError> {
        let config = &self.config;
        let fields = G::Record::fields();
        let partitioner = Partitioner::new(fields, &config.partition_keys())?;
        let sort_field = config.sort_field();
        let sort_column =
            field_index(fields, sort_field).ok_or_else(|| ConfigError::UnknownField {
                context: "sort_by",
                field: sort_field.to_string(),
            })?;
        let batches = plan_batches(
            config.total_rows,
            config.worker_count(),
            config.max_batch_rows,
            config.seed,
        )?;

        prepare_output_root(&config.output)?;

        let omitted = if config.output.omit_partition_columns {
            partitioner.path_encoded_columns()
        } else {
            Vec::new()
        };
        let writer = Arc::new(PartitionWriter::new(
            &config.output,
            fields,
            &omitted,
            file_metadata(config, run_id),
        ));
        let write_pool = BoundedPool::new(
            "dataforge-write",
            config.write_worker_count(),
            config.deadlines.write_timeout(),
        )?;

        debug!(
            run_id = %run_id,
            batches = batches.len(),
            partition_keys = ?partitioner.key_names(),
            sort_by = %sort_field,
            root = %writer.root().display(),
            "pipeline planned"
        );

        let job = move |batch: &BatchDescriptor| {
            generate_batch(generator.as_ref(), batch).map(|records| (*batch, records))
        };

        match config.mode {
            PartitionMode::Global => {
                let generation_start = Instant::now();
                let mut outputs = Vec::with_capacity(batches.len());
                dispatch(
                    &batches,
                    config.worker_count(),
                    config.deadlines.batch_timeout(),
                    job,
                    |batch_report, output| {
                        report.record_batch(batch_report);
                        outputs.push(output);
                        Ok(())
                    },
                )?;
                report.generation_ms = elapsed_ms(generation_start);
                info!(
                    run_id = %run_id,
                    batches = outputs.len(),
                    rows = report.rows_generated,
                    duration_ms = report.generation_ms,
                    "batches collected"
                );

                let mut records = concat_in_batch_order(outputs);
                sort_records(&mut records, sort_column);
                let partitions = partitioner.partition(records);
                info!(
                    run_id = %run_id,
                    partitions = partitions.len(),
                    "writing partitions"
                );
                write_partitions(&write_pool, &writer, partitions, report)?;
            }
            PartitionMode::Streaming => {
                let generation_start = Instant::now();
                dispatch(
                    &batches,
                    config.worker_count(),
                    config.deadlines.batch_timeout(),
                    job,
                    |batch_report, (_, mut records)| {
                        report.record_batch(batch_report);
                        sort_records(&mut records, sort_column);
                        let partitions = partitioner.partition(records);
                        write_partitions(&write_pool, &writer, partitions, report)
                    },
                )?;
                report.generation_ms = elapsed_ms(generation_start).saturating_sub(report.write_ms);
            }
        }

        Ok(())
    }
}

/// Write every partition on the write pool and record the outcome.
///
/// A failed or panicking write only marks that partition as failed; an
/// expired write deadline aborts the run.
fn write_partitions<R: DatasetRecord>(
    pool: &BoundedPool,
    writer: &Arc<PartitionWriter>,
    partitions: BTreeMap<PartitionValue, Vec<R>>,
    report: &mut GenerationReport,
) -> Result<(), GenerationError> {
    let write_start = Instant::now();
    let labels: Vec<(String, u64)> = partitions
        .iter()
        .map(|(partition, records)| (partition.to_string(), records.len() as u64))
        .collect();
    let jobs: Vec<(PartitionValue, Vec<R>)> = partitions.into_iter().collect();

    let writer = Arc::clone(writer);
    let work = Arc::new(move |(partition, records): (PartitionValue, Vec<R>)| {
        writer.write(&partition, &records)
    });

    let result = pool.run(jobs, work, |done| {
        let (partition, rows) = &labels[done.index];
        let error = match done.outcome {
            Ok(Ok(artifact)) => {
                debug!(
                    partition = %partition,
                    rows = *rows,
                    bytes = artifact.byte_size,
                    duration_ms = done.elapsed.as_millis() as u64,
                    path = %artifact.path.display(),
                    "partition written"
                );
                report.record_artifact(artifact);
                return Ok(());
            }
            Ok(Err(err)) => err.to_string(),
            Err(TaskFailure::Panicked(message)) => format!("panicked: {message}"),
            Err(TaskFailure::TimedOut(limit)) => {
                warn!(partition = %partition, rows = *rows, "partition write timed out");
                return Err(write_deadline(partition, limit));
            }
        };
        warn!(partition = %partition, rows = *rows, error = %error, "partition write failed");
        report.record_partition_failure(partition.clone(), *rows, error);
        Ok(())
    });

    report.write_ms += elapsed_ms(write_start);
    result
}

fn write_deadline(partition: &str, limit: Duration) -> GenerationError {
    GenerationError::WriteDeadline {
        partition: partition.to_string(),
        limit,
    }
}

/// Key/value metadata embedded in every file footer.
fn file_metadata(config: &GenerationConfig, run_id: &str) -> Vec<(String, String)> {
    vec![
        (
            "dataforge.version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        ),
        (
            "dataforge.dataset".to_string(),
            config.dataset.kind().to_string(),
        ),
        ("dataforge.run_id".to_string(), run_id.to_string()),
        ("dataforge.seed".to_string(), config.seed.to_string()),
    ]
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
