//! Streaming accumulators for the summary statistics of a dataset.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;

use dataforge_core::{
    CategoricalExpectation, ConditionalMeasure, FieldDef, FieldRole, FieldType, KeyTransform,
    field_index,
};
use dataforge_generate::FieldValue;
use dataforge_generate::partition::render_value;

use crate::metrics::{
    CategoryMetrics, CategoryShare, ConditionalMetrics, IdentifierCount, IdentifierMetrics,
    MeasureMetrics, PayloadMetrics, RowIndexSummary, TimeRangeMetrics, WarningItem,
};
use crate::reader::BatchView;

/// Indexes listed when reporting gaps or duplicates.
const INDEX_EXAMPLES: usize = 5;

#[derive(Debug, Default)]
struct MeasureAcc {
    count: u64,
    min: Option<f64>,
    max: Option<f64>,
    total: f64,
}

impl MeasureAcc {
    fn observe(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.min = Some(self.min.map_or(value, |min| min.min(value)));
        self.max = Some(self.max.map_or(value, |max| max.max(value)));
    }
}

#[derive(Debug, Default)]
struct TimeAcc {
    min: Option<NaiveDateTime>,
    max: Option<NaiveDateTime>,
}

#[derive(Debug)]
struct ConditionalAcc {
    rule: ConditionalMeasure,
    measure_column: usize,
    category_column: usize,
    rows_in_categories: u64,
    total: f64,
    nonzero_outside: u64,
    out_of_bounds: u64,
}

/// Everything the accumulators learned, ready for the report.
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub row_index: RowIndexSummary,
    pub missing_examples: Vec<u64>,
    pub duplicate_examples: Vec<u64>,
    pub categories: Vec<CategoryMetrics>,
    pub measures: Vec<MeasureMetrics>,
    pub identifiers: Vec<IdentifierMetrics>,
    pub time_ranges: Vec<TimeRangeMetrics>,
    pub conditional: Option<ConditionalMetrics>,
    pub payloads: Vec<PayloadMetrics>,
    pub warnings: Vec<WarningItem>,
}

/// Per-field accumulators, chosen by field role.
#[derive(Debug)]
pub struct DatasetStats {
    fields: &'static [FieldDef],
    row_index_column: Option<usize>,
    row_indexes: Vec<u64>,
    categories: Vec<(usize, BTreeMap<String, u64>)>,
    measures: Vec<(usize, MeasureAcc)>,
    identifiers: Vec<(usize, HashMap<String, u64>)>,
    times: Vec<(usize, TimeAcc)>,
    payloads: Vec<(usize, u64, u64)>,
    conditional: Option<ConditionalAcc>,
}

impl DatasetStats {
    pub fn new(fields: &'static [FieldDef], conditional: Option<ConditionalMeasure>) -> Self {
        let mut stats = Self {
            fields,
            row_index_column: None,
            row_indexes: Vec::new(),
            categories: Vec::new(),
            measures: Vec::new(),
            identifiers: Vec::new(),
            times: Vec::new(),
            payloads: Vec::new(),
            conditional: None,
        };
        for (column, field) in fields.iter().enumerate() {
            match field.role {
                FieldRole::RowIndex => stats.row_index_column = Some(column),
                FieldRole::Category => stats.categories.push((column, BTreeMap::new())),
                FieldRole::Measure => stats.measures.push((column, MeasureAcc::default())),
                FieldRole::Identifier => stats.identifiers.push((column, HashMap::new())),
                FieldRole::Time => stats.times.push((column, TimeAcc::default())),
                FieldRole::Payload => stats.payloads.push((column, 0, 0)),
            }
        }
        stats.conditional = conditional.and_then(|rule| {
            Some(ConditionalAcc {
                measure_column: field_index(fields, &rule.measure)?,
                category_column: field_index(fields, &rule.category_field)?,
                rule,
                rows_in_categories: 0,
                total: 0.0,
                nonzero_outside: 0,
                out_of_bounds: 0,
            })
        });
        stats
    }

    pub fn observe(&mut self, view: &BatchView<'_>) {
        for row in 0..view.num_rows() {
            if let Some(column) = self.row_index_column {
                if let Some(index) = as_u64(view.value(column, row)) {
                    self.row_indexes.push(index);
                }
            }
            for (column, counts) in &mut self.categories {
                count_label(counts, view.value(*column, row));
            }
            for (column, acc) in &mut self.measures {
                if let Some(value) = as_f64(view.value(*column, row)) {
                    acc.observe(value);
                }
            }
            for (column, counts) in &mut self.identifiers {
                let value = view.value(*column, row);
                if value != FieldValue::Null {
                    let key = render_value(value, KeyTransform::Identity);
                    *counts.entry(key).or_default() += 1;
                }
            }
            for (column, acc) in &mut self.times {
                if let Some(instant) = as_datetime(view.value(*column, row)) {
                    acc.min = Some(acc.min.map_or(instant, |min| min.min(instant)));
                    acc.max = Some(acc.max.map_or(instant, |max| max.max(instant)));
                }
            }
            for (column, rows, invalid) in &mut self.payloads {
                *rows += 1;
                if !is_json_object(view.value(*column, row)) {
                    *invalid += 1;
                }
            }
            if let Some(acc) = &mut self.conditional {
                let measure = as_f64(view.value(acc.measure_column, row)).unwrap_or(0.0);
                let in_categories = match view.value(acc.category_column, row) {
                    FieldValue::Text(label) => acc.rule.categories.iter().any(|c| c == label),
                    _ => false,
                };
                if in_categories {
                    acc.rows_in_categories += 1;
                    acc.total += measure;
                    if measure < acc.rule.min || measure > acc.rule.max {
                        acc.out_of_bounds += 1;
                    }
                } else if measure != 0.0 {
                    acc.nonzero_outside += 1;
                }
            }
        }
    }

    pub fn finish(
        mut self,
        expected_rows: u64,
        expectations: &[CategoricalExpectation],
        tolerance: f64,
        top_identifiers: usize,
    ) -> StatsSummary {
        let mut summary = StatsSummary::default();
        let fields = self.fields;

        self.row_indexes.sort_unstable();
        summarize_row_indexes(&self.row_indexes, expected_rows, &mut summary);

        for (column, counts) in self.categories {
            let name = fields[column].name;
            let expectation = expectations.iter().find(|e| e.field == name);
            let (metrics, warnings) = category_metrics(name, counts, expectation, tolerance);
            summary.categories.push(metrics);
            summary.warnings.extend(warnings);
        }

        for (column, acc) in self.measures {
            summary.measures.push(MeasureMetrics {
                field: fields[column].name.to_string(),
                count: acc.count,
                min: acc.min,
                max: acc.max,
                mean: (acc.count > 0).then(|| acc.total / acc.count as f64),
                total: acc.total,
            });
        }

        for (column, counts) in self.identifiers {
            let distinct = counts.len() as u64;
            let mut top: Vec<IdentifierCount> = counts
                .into_iter()
                .map(|(value, count)| IdentifierCount { value, count })
                .collect();
            top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
            top.truncate(top_identifiers);
            summary.identifiers.push(IdentifierMetrics {
                field: fields[column].name.to_string(),
                distinct,
                top,
            });
        }

        for (column, acc) in self.times {
            let field = &fields[column];
            let render = |instant: NaiveDateTime| match field.field_type {
                FieldType::Date => instant.date().to_string(),
                _ => instant.to_string(),
            };
            summary.time_ranges.push(TimeRangeMetrics {
                field: field.name.to_string(),
                min: acc.min.map(render),
                max: acc.max.map(render),
            });
        }

        summary.conditional = self.conditional.map(|acc| ConditionalMetrics {
            measure: acc.rule.measure,
            category_field: acc.rule.category_field,
            categories: acc.rule.categories,
            rows_in_categories: acc.rows_in_categories,
            total: acc.total,
            mean: (acc.rows_in_categories > 0).then(|| acc.total / acc.rows_in_categories as f64),
            nonzero_outside: acc.nonzero_outside,
            out_of_bounds: acc.out_of_bounds,
        });

        summary.payloads = self
            .payloads
            .into_iter()
            .map(|(column, rows, invalid)| PayloadMetrics {
                field: fields[column].name.to_string(),
                rows,
                invalid,
            })
            .collect();

        summary
    }
}

fn summarize_row_indexes(sorted: &[u64], expected_rows: u64, summary: &mut StatsSummary) {
    let mut next_expected = 0_u64;
    let mut previous: Option<u64> = None;

    for &index in sorted {
        if previous == Some(index) {
            summary.row_index.duplicates += 1;
            if summary.duplicate_examples.last() != Some(&index)
                && summary.duplicate_examples.len() < INDEX_EXAMPLES
            {
                summary.duplicate_examples.push(index);
            }
            continue;
        }
        previous = Some(index);
        summary.row_index.distinct += 1;

        if index >= expected_rows {
            summary.row_index.out_of_range += 1;
            continue;
        }
        push_gap(summary, next_expected, index);
        next_expected = index + 1;
    }
    push_gap(summary, next_expected, expected_rows);
}

fn push_gap(summary: &mut StatsSummary, from: u64, to: u64) {
    if to <= from {
        return;
    }
    summary.row_index.missing += to - from;
    let room = INDEX_EXAMPLES.saturating_sub(summary.missing_examples.len()) as u64;
    summary
        .missing_examples
        .extend(from..from + room.min(to - from));
}

fn category_metrics(
    field: &str,
    mut counts: BTreeMap<String, u64>,
    expectation: Option<&CategoricalExpectation>,
    tolerance: f64,
) -> (CategoryMetrics, Vec<WarningItem>) {
    let total: u64 = counts.values().sum();
    let share = |count: u64| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    };
    let mut labels = Vec::new();
    let mut warnings = Vec::new();

    if let Some(expectation) = expectation {
        for (label, expected) in expectation.values.iter().zip(&expectation.probabilities) {
            let count = counts.remove(label).unwrap_or(0);
            let observed = share(count);
            let drift = (observed - expected).abs();
            if total > 0 && drift > tolerance {
                warnings.push(WarningItem {
                    code: "distribution_drift".to_string(),
                    path: format!("{field}.{label}"),
                    message: format!(
                        "observed share {observed:.4} differs from configured {expected:.4}"
                    ),
                    hint: Some("small samples drift more; raise total_rows or tolerance".into()),
                });
            }
            labels.push(CategoryShare {
                label: label.clone(),
                count,
                share: observed,
                expected: Some(*expected),
                drift: Some(drift),
            });
        }
    }

    for (label, count) in counts {
        if expectation.is_some() {
            warnings.push(WarningItem {
                code: "unexpected_category".to_string(),
                path: format!("{field}.{label}"),
                message: format!("{count} row(s) carry a label that is not configured"),
                hint: None,
            });
        }
        labels.push(CategoryShare {
            label,
            count,
            share: share(count),
            expected: None,
            drift: None,
        });
    }

    (
        CategoryMetrics {
            field: field.to_string(),
            total,
            labels,
        },
        warnings,
    )
}

fn count_label(counts: &mut BTreeMap<String, u64>, value: FieldValue<'_>) {
    if let FieldValue::Text(label) = value {
        if let Some(count) = counts.get_mut(label) {
            *count += 1;
            return;
        }
        counts.insert(label.to_string(), 1);
    } else if value != FieldValue::Null {
        *counts
            .entry(render_value(value, KeyTransform::Identity))
            .or_default() += 1;
    }
}

fn as_u64(value: FieldValue<'_>) -> Option<u64> {
    match value {
        FieldValue::UInt(value) => Some(value),
        FieldValue::Int(value) => u64::try_from(value).ok(),
        _ => None,
    }
}

fn as_f64(value: FieldValue<'_>) -> Option<f64> {
    match value {
        FieldValue::Float(value) => Some(value),
        FieldValue::Int(value) => Some(value as f64),
        FieldValue::UInt(value) => Some(value as f64),
        _ => None,
    }
}

fn as_datetime(value: FieldValue<'_>) -> Option<NaiveDateTime> {
    match value {
        FieldValue::Timestamp(value) => Some(value),
        FieldValue::Date(value) => value.and_hms_opt(0, 0, 0),
        _ => None,
    }
}

fn is_json_object(value: FieldValue<'_>) -> bool {
    match value {
        FieldValue::Text(text) => serde_json::from_str::<serde_json::Value>(text)
            .map(|parsed| parsed.is_object())
            .unwrap_or(false),
        _ => false,
    }
}
