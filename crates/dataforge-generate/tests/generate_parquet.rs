use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{Array, UInt64Array};
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rand::RngCore;

use dataforge_core::{
    DatasetConfig, DatasetKind, GenerationConfig, KeyTransform, PartitionKey, PartitionMode,
};
use dataforge_generate::datasets::EventRecord;
use dataforge_generate::{
    GenerationEngine, GenerationError, RecordGenerator, RunStatus, SamplerError,
    list_parquet_files, partition_segments,
};

fn temp_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "dataforge_generate_{label}_{}",
        uuid::Uuid::new_v4()
    ))
}

fn events_config(root: &Path, total_rows: u64, workers: usize) -> GenerationConfig {
    let mut config = GenerationConfig {
        total_rows,
        workers: Some(workers),
        ..GenerationConfig::default()
    };
    config.output.root = root.to_path_buf();
    config
}

fn read_row_indexes(path: &Path) -> Vec<u64> {
    let file = File::open(path).expect("open parquet file");
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .expect("parquet reader")
        .build()
        .expect("build reader");
    let mut indexes = Vec::new();
    for batch in reader {
        let batch = batch.expect("record batch");
        let column = batch
            .column_by_name("row_index")
            .expect("row_index column")
            .as_any()
            .downcast_ref::<UInt64Array>()
            .expect("u64 row_index");
        indexes.extend(column.values().iter().copied());
    }
    indexes
}

fn read_column_names(path: &Path) -> Vec<String> {
    let file = File::open(path).expect("open parquet file");
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).expect("parquet reader");
    builder
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect()
}

/// Events spread evenly over three consecutive days.
struct ThreeDayEvents;

impl RecordGenerator for ThreeDayEvents {
    type Record = EventRecord;

    fn generate(&self, row_index: u64, rng: &mut dyn RngCore) -> Result<EventRecord, SamplerError> {
        let day = 1 + (row_index % 3) as u32;
        let event_at = NaiveDate::from_ymd_opt(2024, 5, day)
            .and_then(|date| date.and_hms_opt(rng.next_u32() % 24, 0, 0))
            .ok_or(SamplerError::OutOfRange {
                sampler: "three_day_events",
                message: "invalid day".to_string(),
            })?;
        Ok(EventRecord {
            row_index,
            user_id: format!("u_{:04}", row_index % 50),
            event_at,
            event_type: "view".to_string(),
            revenue: 0.0,
        })
    }
}

/// Fails every row in `[failing_start, failing_end)`.
struct FailingEvents {
    failing_start: u64,
    failing_end: u64,
}

impl RecordGenerator for FailingEvents {
    type Record = EventRecord;

    fn generate(&self, row_index: u64, rng: &mut dyn RngCore) -> Result<EventRecord, SamplerError> {
        if (self.failing_start..self.failing_end).contains(&row_index) {
            return Err(SamplerError::OutOfRange {
                sampler: "failing_events",
                message: format!("forced failure at row {row_index}"),
            });
        }
        ThreeDayEvents.generate(row_index, rng)
    }
}

#[test]
fn three_days_produce_three_partitions() {
    let root = temp_dir("three_days");
    let run_dir = temp_dir("three_days_run");
    let engine = GenerationEngine::new(events_config(&root, 300, 4)).expect("engine");

    let result = engine
        .run_generator(ThreeDayEvents, &run_dir, "run-three-days")
        .expect("run generation");
    assert_eq!(result.report.status, RunStatus::Succeeded);
    assert_eq!(result.report.rows_written, 300);

    let files = list_parquet_files(&root).expect("list files");
    assert_eq!(files.len(), 3);

    let mut days = HashSet::new();
    for file in &files {
        let segments = partition_segments(&root, file);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].0, "date");
        days.insert(segments[0].1.clone());

        let indexes = read_row_indexes(file);
        assert_eq!(indexes.len(), 100);
        let day = segments[0].1.trim_start_matches("2024-05-0");
        let day: u64 = day.parse().expect("day number");
        assert!(indexes.iter().all(|index| index % 3 + 1 == day));
    }
    let expected: HashSet<String> = ["2024-05-01", "2024-05-02", "2024-05-03"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(days, expected);

    assert!(run_dir.join("generation_report.json").exists());
}

#[test]
fn every_row_is_written_exactly_once() {
    let root = temp_dir("exactly_once");
    let run_dir = temp_dir("exactly_once_run");
    let engine = GenerationEngine::new(events_config(&root, 5_000, 3)).expect("engine");

    let result = engine.run(&run_dir, "run-exactly-once").expect("run generation");
    assert_eq!(result.report.rows_generated, 5_000);
    assert_eq!(result.report.batches.len(), 3);

    let mut seen = HashSet::new();
    for file in list_parquet_files(&root).expect("list files") {
        for index in read_row_indexes(&file) {
            assert!(seen.insert(index), "row {index} written twice");
        }
    }
    assert_eq!(seen.len(), 5_000);
    assert!((0..5_000).all(|index| seen.contains(&index)));
}

#[test]
fn failing_batch_aborts_without_artifacts() {
    let root = temp_dir("failing");
    let run_dir = temp_dir("failing_run");
    let engine = GenerationEngine::new(events_config(&root, 800, 8)).expect("engine");

    let err = engine
        .run_generator(
            FailingEvents {
                failing_start: 500,
                failing_end: 600,
            },
            &run_dir,
            "run-failing",
        )
        .expect_err("run should fail");

    match err {
        GenerationError::WorkerFailure {
            batch_id,
            start_index,
            end_index,
            ..
        } => {
            assert_eq!(batch_id, 5);
            assert_eq!((start_index, end_index), (500, 600));
        }
        other => panic!("expected worker failure, got {other:?}"),
    }

    assert!(list_parquet_files(&root).expect("list files").is_empty());

    let report: serde_json::Value = serde_json::from_slice(
        &std::fs::read(run_dir.join("generation_report.json")).expect("read report"),
    )
    .expect("parse report");
    assert_eq!(report["status"], "aborted");
    assert_eq!(report["artifacts"].as_array().map(Vec::len), Some(0));
}

#[test]
fn existing_output_requires_overwrite() {
    let root = temp_dir("overwrite");
    let run_dir = temp_dir("overwrite_run");
    let config = events_config(&root, 200, 2);

    let engine = GenerationEngine::new(config.clone()).expect("engine");
    engine.run(&run_dir, "run-first").expect("first run");
    let first_files = list_parquet_files(&root).expect("list files").len();

    let err = engine.run(&run_dir, "run-second").expect_err("second run rejected");
    assert!(matches!(err, GenerationError::OutputNotEmpty(_)));

    let mut config = config;
    config.output.overwrite = true;
    let engine = GenerationEngine::new(config).expect("engine");
    engine.run(&run_dir, "run-third").expect("overwrite run");
    assert_eq!(list_parquet_files(&root).expect("list files").len(), first_files);
}

#[test]
fn streaming_mode_writes_every_batch() {
    let root = temp_dir("streaming");
    let run_dir = temp_dir("streaming_run");
    let mut config = events_config(&root, 1_200, 4);
    config.mode = PartitionMode::Streaming;
    config.partition_by = Some(vec![PartitionKey::new(
        "month",
        "event_at",
        KeyTransform::Month,
    )]);

    let engine = GenerationEngine::new(config).expect("engine");
    let result = engine.run(&run_dir, "run-streaming").expect("run generation");
    assert_eq!(result.report.rows_written, 1_200);

    let mut total = 0;
    for file in list_parquet_files(&root).expect("list files") {
        let segments = partition_segments(&root, &file);
        assert_eq!(segments[0].0, "month");
        assert_eq!(segments[0].1.len(), "2024-05".len());
        total += read_row_indexes(&file).len();
    }
    assert_eq!(total, 1_200);
}

#[test]
fn identity_keys_can_be_omitted_from_files() {
    let root = temp_dir("omit");
    let run_dir = temp_dir("omit_run");
    let mut config = GenerationConfig {
        total_rows: 500,
        workers: Some(2),
        dataset: DatasetConfig::default_for(DatasetKind::TenantActivity),
        ..GenerationConfig::default()
    };
    config.output.root = root.clone();
    config.output.omit_partition_columns = true;

    let engine = GenerationEngine::new(config).expect("engine");
    engine.run(&run_dir, "run-omit").expect("run generation");

    let files = list_parquet_files(&root).expect("list files");
    assert!(!files.is_empty());
    for file in &files {
        let segments = partition_segments(&root, file);
        let keys: Vec<&str> = segments.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["dt", "tenant"]);
        assert_eq!(
            read_column_names(file),
            vec!["row_index", "user_id", "country"]
        );
    }
}

#[test]
fn blocked_partition_degrades_the_run() {
    let root = temp_dir("degraded");
    let run_dir = temp_dir("degraded_run");
    std::fs::create_dir_all(&root).expect("create root");
    // A plain file where a partition directory has to go.
    std::fs::write(root.join("date=2024-05-02"), b"blocked").expect("write blocker");

    let engine = GenerationEngine::new(events_config(&root, 300, 2)).expect("engine");
    let result = engine
        .run_generator(ThreeDayEvents, &run_dir, "run-degraded")
        .expect("degraded run still returns a report");

    assert_eq!(result.report.status, RunStatus::Degraded);
    assert_eq!(result.report.failed_partitions.len(), 1);
    assert_eq!(result.report.failed_partitions[0].partition, "date=2024-05-02");
    assert_eq!(result.report.failed_partitions[0].rows, 100);
    assert_eq!(result.report.rows_written, 200);
    assert_eq!(list_parquet_files(&root).expect("list files").len(), 2);
}

#[test]
fn invalid_config_is_rejected_before_running() {
    let root = temp_dir("invalid");
    let config = events_config(&root, 0, 2);
    let err = GenerationEngine::new(config).expect_err("zero rows rejected");
    assert!(matches!(err, GenerationError::Config(_)));
    assert!(!root.exists());
}
