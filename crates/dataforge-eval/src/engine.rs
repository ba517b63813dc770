use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, warn};

use dataforge_core::{
    FieldDef, GenerationConfig, KeyTransform, escape_partition_value, field_index,
};
use dataforge_generate::partition::render_value;
use dataforge_generate::{FieldValue, list_parquet_files, partition_segments};

use crate::errors::EvalError;
use crate::metrics::{
    METRICS_VERSION, PartitionCheckSummary, PartitionMetrics, PerformanceMetrics,
    VerificationMetrics, WarningItem,
};
use crate::model::{VerificationResult, VerifyOptions, Violation, ViolationLog};
use crate::reader::{BatchView, PathConstant, open_parquet, unreadable};
use crate::report::render_report;
use crate::stats::{DatasetStats, StatsSummary};

pub const VERIFICATION_FILE: &str = "verification.json";
pub const REPORT_FILE: &str = "report.md";

#[derive(Debug, Clone)]
struct ResolvedKey {
    name: String,
    column: usize,
    transform: KeyTransform,
}

/// Re-reads a generated output root and checks it against its configuration.
#[derive(Debug, Clone)]
pub struct VerificationEngine {
    options: VerifyOptions,
}

impl VerificationEngine {
    pub fn new(options: VerifyOptions) -> Self {
        Self { options }
    }

    /// Verify `config.output.root` holds exactly `expected_rows` records.
    ///
    /// A row count mismatch fails with [`EvalError::VerificationMismatch`];
    /// integrity violations fail with [`EvalError::Violations`] in strict
    /// mode. Distribution drift is only ever a warning. Reports are written
    /// before any error is returned.
    pub fn run(
        &self,
        config: &GenerationConfig,
        expected_rows: u64,
    ) -> Result<VerificationResult, EvalError> {
        let total_start = Instant::now();
        let root = &config.output.root;
        let fields = config.dataset.fields();
        let keys = resolve_keys(fields, config)?;

        info!(
            root = %root.display(),
            dataset = %config.dataset.kind(),
            expected_rows,
            "verification started"
        );

        let files = list_parquet_files(root)?;
        let mut stats = DatasetStats::new(fields, config.dataset.conditional_measure());
        let mut violations = ViolationLog::new(self.options.max_examples);
        let mut warnings = Vec::new();
        let mut partitions: BTreeMap<String, PartitionMetrics> = BTreeMap::new();
        let mut run_ids = BTreeSet::new();
        let mut partition_check = PartitionCheckSummary {
            keys: keys.iter().map(|key| key.name.clone()).collect(),
            ..PartitionCheckSummary::default()
        };
        let mut path_encoded = BTreeSet::new();
        let mut rows_found = 0_u64;
        let mut bytes = 0_u64;

        if files.is_empty() {
            warnings.push(WarningItem {
                code: "no_files".to_string(),
                path: root.display().to_string(),
                message: "no parquet files found under the output root".to_string(),
                hint: None,
            });
        }

        for path in &files {
            let opened = open_parquet(path)?;
            let segments = partition_segments(root, path);
            let partition_label = segments
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join("/");
            let entry = partitions
                .entry(partition_label.clone())
                .or_insert_with(|| PartitionMetrics {
                    partition: partition_label.clone(),
                    files: 0,
                    rows: 0,
                });
            entry.files += 1;
            entry.rows += opened.num_rows;
            bytes += opened.byte_size;
            if let Some(run_id) = &opened.run_id {
                run_ids.insert(run_id.clone());
            }

            let file_label = path.display().to_string();
            let mut expected_segments = Vec::with_capacity(keys.len());
            for key in &keys {
                match segments.iter().find(|(name, _)| *name == key.name) {
                    Some((_, value)) => expected_segments.push(Some(value.clone())),
                    None => {
                        violations.record(
                            Violation {
                                code: "partition_missing".to_string(),
                                path: file_label.clone(),
                                message: format!("path has no '{}=' segment", key.name),
                                row_index: None,
                                example: None,
                            },
                            opened.num_rows,
                        );
                        expected_segments.push(None);
                    }
                }
            }

            let constants = path_constants(fields, &keys, &segments, path)?;
            for (column, constant) in constants.iter().enumerate() {
                if constant.is_some() && opened.schema.field_with_name(fields[column].name).is_err()
                {
                    path_encoded.insert(fields[column].name.to_string());
                }
            }

            let mut file_rows = 0_u64;
            for batch in opened.reader {
                let batch = batch.map_err(|err| unreadable(path, err.to_string()))?;
                let view = BatchView::new(&batch, fields, &constants)
                    .map_err(|message| unreadable(path, message))?;
                file_rows += view.num_rows() as u64;
                stats.observe(&view);
                check_partition_rows(
                    &view,
                    &keys,
                    &expected_segments,
                    &file_label,
                    &mut partition_check,
                    &mut violations,
                );
            }
            rows_found += file_rows;
            debug!(path = %file_label, rows = file_rows, "file verified");
        }

        let load_ms = total_start.elapsed().as_millis();
        partition_check.path_encoded = path_encoded.into_iter().collect();

        let summary = stats.finish(
            expected_rows,
            &config.dataset.categorical_expectations(),
            self.options.tolerance,
            self.options.top_identifiers,
        );
        record_summary_violations(&summary, &mut violations);
        warnings.extend(summary.warnings.iter().cloned());

        let total_ms = total_start.elapsed().as_millis();
        let elapsed_secs = total_start.elapsed().as_secs_f64();
        let metrics = VerificationMetrics {
            metrics_version: METRICS_VERSION.to_string(),
            dataset: config.dataset.kind().to_string(),
            root: root.display().to_string(),
            run_ids: run_ids.into_iter().collect(),
            files: files.len() as u64,
            bytes,
            rows_expected: expected_rows,
            rows_found,
            row_index: summary.row_index,
            partitions: partitions.into_values().collect(),
            partition_check,
            categories: summary.categories,
            measures: summary.measures,
            identifiers: summary.identifiers,
            time_ranges: summary.time_ranges,
            conditional: summary.conditional,
            payloads: summary.payloads,
            violations: violations.counts().clone(),
            warnings,
            performance: PerformanceMetrics {
                load_ms,
                total_ms,
                rows_per_sec: if elapsed_secs > 0.0 {
                    rows_found as f64 / elapsed_secs
                } else {
                    0.0
                },
            },
        };

        let violation_total = violations.total();
        let violations = violations.into_examples();
        let report = render_report(&metrics, &violations, self.options.max_examples);

        let (metrics_path, report_path) = match &self.options.out_dir {
            Some(out_dir) => {
                std::fs::create_dir_all(out_dir)?;
                let metrics_path = out_dir.join(VERIFICATION_FILE);
                std::fs::write(&metrics_path, serde_json::to_vec_pretty(&metrics)?)?;
                let report_path = out_dir.join(REPORT_FILE);
                std::fs::write(&report_path, report.as_bytes())?;
                (Some(metrics_path), Some(report_path))
            }
            None => (None, None),
        };

        for warning in &metrics.warnings {
            warn!(code = %warning.code, path = %warning.path, "{}", warning.message);
        }

        if rows_found != expected_rows {
            warn!(expected = expected_rows, observed = rows_found, "row count mismatch");
            return Err(EvalError::VerificationMismatch {
                expected: expected_rows,
                observed: rows_found,
            });
        }
        if self.options.strict && violation_total > 0 {
            warn!(violations = violation_total, "verification failed");
            return Err(EvalError::Violations(violation_total));
        }

        info!(
            files = metrics.files,
            rows = rows_found,
            warnings = metrics.warnings.len(),
            violations = violation_total,
            duration_ms = total_ms as u64,
            "verification completed"
        );

        Ok(VerificationResult {
            metrics_path,
            report_path,
            metrics,
            report,
            violations,
        })
    }
}

fn resolve_keys(
    fields: &[FieldDef],
    config: &GenerationConfig,
) -> Result<Vec<ResolvedKey>, EvalError> {
    config
        .partition_keys()
        .into_iter()
        .map(|key| {
            let column = field_index(fields, &key.field).ok_or_else(|| {
                EvalError::InvalidDataset(format!(
                    "partition key '{}' refers to unknown field '{}'",
                    key.name, key.field
                ))
            })?;
            Ok(ResolvedKey {
                name: key.name,
                column,
                transform: key.transform,
            })
        })
        .collect()
}

/// Typed values of identity-key columns, read back from the path.
fn path_constants(
    fields: &[FieldDef],
    keys: &[ResolvedKey],
    segments: &[(String, String)],
    path: &Path,
) -> Result<Vec<Option<PathConstant>>, EvalError> {
    let mut constants = vec![None; fields.len()];
    for key in keys {
        if key.transform != KeyTransform::Identity {
            continue;
        }
        let Some((_, segment)) = segments.iter().find(|(name, _)| *name == key.name) else {
            continue;
        };
        let constant =
            PathConstant::parse(&fields[key.column], segment).map_err(|m| unreadable(path, m))?;
        constants[key.column] = Some(constant);
    }
    Ok(constants)
}

/// Every row must derive the partition value of the directory it sits in.
fn check_partition_rows(
    view: &BatchView<'_>,
    keys: &[ResolvedKey],
    expected_segments: &[Option<String>],
    file_label: &str,
    summary: &mut PartitionCheckSummary,
    violations: &mut ViolationLog,
) {
    let checked: Vec<(&ResolvedKey, &str)> = keys
        .iter()
        .zip(expected_segments)
        .filter(|(key, _)| !view.is_path_encoded(key.column))
        .filter_map(|(key, segment)| segment.as_deref().map(|segment| (key, segment)))
        .collect();
    if checked.is_empty() {
        return;
    }

    for row in 0..view.num_rows() {
        summary.rows_checked += 1;
        for (key, segment) in &checked {
            let derived = escape_partition_value(&render_value(
                view.value(key.column, row),
                key.transform,
            ));
            if derived != *segment {
                summary.mismatches += 1;
                violations.record(
                    Violation {
                        code: "partition_mismatch".to_string(),
                        path: file_label.to_string(),
                        message: format!(
                            "row belongs to {}={} but sits under {}={}",
                            key.name, derived, key.name, segment
                        ),
                        row_index: row_index_of(view, row),
                        example: None,
                    },
                    1,
                );
            }
        }
    }
}

fn row_index_of(view: &BatchView<'_>, row: usize) -> Option<u64> {
    match view.value(0, row) {
        FieldValue::UInt(index) => Some(index),
        _ => None,
    }
}

fn record_summary_violations(summary: &StatsSummary, violations: &mut ViolationLog) {
    let join = |indexes: &[u64]| {
        indexes
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };

    violations.record(
        Violation {
            code: "row_index_duplicate".to_string(),
            path: "row_index".to_string(),
            message: format!("{} duplicate row index(es)", summary.row_index.duplicates),
            row_index: summary.duplicate_examples.first().copied(),
            example: Some(join(&summary.duplicate_examples)),
        },
        summary.row_index.duplicates,
    );
    violations.record(
        Violation {
            code: "row_index_missing".to_string(),
            path: "row_index".to_string(),
            message: format!("{} row index(es) missing", summary.row_index.missing),
            row_index: summary.missing_examples.first().copied(),
            example: Some(join(&summary.missing_examples)),
        },
        summary.row_index.missing,
    );
    violations.record(
        Violation {
            code: "row_index_out_of_range".to_string(),
            path: "row_index".to_string(),
            message: format!(
                "{} row index(es) beyond the expected range",
                summary.row_index.out_of_range
            ),
            row_index: None,
            example: None,
        },
        summary.row_index.out_of_range,
    );

    if let Some(conditional) = &summary.conditional {
        violations.record(
            Violation {
                code: "conditional_nonzero".to_string(),
                path: conditional.measure.clone(),
                message: format!(
                    "{} row(s) outside [{}] have a nonzero {}",
                    conditional.nonzero_outside,
                    conditional.categories.join(", "),
                    conditional.measure
                ),
                row_index: None,
                example: None,
            },
            conditional.nonzero_outside,
        );
        violations.record(
            Violation {
                code: "conditional_out_of_bounds".to_string(),
                path: conditional.measure.clone(),
                message: format!(
                    "{} row(s) in [{}] have {} out of bounds",
                    conditional.out_of_bounds,
                    conditional.categories.join(", "),
                    conditional.measure
                ),
                row_index: None,
                example: None,
            },
            conditional.out_of_bounds,
        );
    }

    for payload in &summary.payloads {
        violations.record(
            Violation {
                code: "payload_invalid".to_string(),
                path: payload.field.clone(),
                message: format!("{} payload(s) are not JSON objects", payload.invalid),
                row_index: None,
                example: None,
            },
            payload.invalid,
        );
    }
}
