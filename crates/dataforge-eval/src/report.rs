use crate::metrics::VerificationMetrics;
use crate::model::Violation;

/// Render a deterministic markdown report from metrics and violations.
pub fn render_report(
    metrics: &VerificationMetrics,
    violations: &[Violation],
    max_examples: usize,
) -> String {
    let mut lines = Vec::new();

    lines.push("# Dataforge Verification Report".to_string());
    lines.push(String::new());
    lines.push("## Run summary".to_string());
    lines.push(format!("- dataset: {}", metrics.dataset));
    lines.push(format!("- root: {}", metrics.root));
    if !metrics.run_ids.is_empty() {
        lines.push(format!("- run_ids: {}", metrics.run_ids.join(", ")));
    }
    lines.push(format!("- files: {}", metrics.files));
    lines.push(format!("- bytes: {}", metrics.bytes));
    lines.push(format!("- rows_expected: {}", metrics.rows_expected));
    lines.push(format!("- rows_found: {}", metrics.rows_found));
    lines.push(format!(
        "- row_index: {} distinct, {} duplicate, {} missing",
        metrics.row_index.distinct, metrics.row_index.duplicates, metrics.row_index.missing
    ));
    lines.push(String::new());

    lines.push("## Partitions".to_string());
    lines.push("| partition | files | rows |".to_string());
    lines.push("| --- | --- | --- |".to_string());
    for partition in &metrics.partitions {
        let label = if partition.partition.is_empty() {
            "(root)"
        } else {
            partition.partition.as_str()
        };
        lines.push(format!(
            "| {} | {} | {} |",
            label, partition.files, partition.rows
        ));
    }
    lines.push(format!(
        "- keys: {}; rows checked: {}; mismatches: {}",
        metrics.partition_check.keys.join(", "),
        metrics.partition_check.rows_checked,
        metrics.partition_check.mismatches
    ));
    lines.push(String::new());

    if !metrics.categories.is_empty() {
        lines.push("## Category distribution".to_string());
        lines.push("| field | label | count | share | expected | drift |".to_string());
        lines.push("| --- | --- | --- | --- | --- | --- |".to_string());
        for category in &metrics.categories {
            for label in &category.labels {
                lines.push(format!(
                    "| {} | {} | {} | {:.4} | {} | {} |",
                    category.field,
                    label.label,
                    label.count,
                    label.share,
                    optional(label.expected),
                    optional(label.drift)
                ));
            }
        }
        lines.push(String::new());
    }

    if !metrics.measures.is_empty() {
        lines.push("## Measures".to_string());
        lines.push("| field | count | min | max | mean | total |".to_string());
        lines.push("| --- | --- | --- | --- | --- | --- |".to_string());
        for measure in &metrics.measures {
            lines.push(format!(
                "| {} | {} | {} | {} | {} | {:.2} |",
                measure.field,
                measure.count,
                optional(measure.min),
                optional(measure.max),
                optional(measure.mean),
                measure.total
            ));
        }
        lines.push(String::new());
    }

    if let Some(conditional) = &metrics.conditional {
        lines.push(format!(
            "## {} by {}",
            conditional.measure, conditional.category_field
        ));
        lines.push(format!("- categories: {}", conditional.categories.join(", ")));
        lines.push(format!("- rows: {}", conditional.rows_in_categories));
        lines.push(format!("- total: {:.2}", conditional.total));
        lines.push(format!("- mean: {}", optional(conditional.mean)));
        lines.push(String::new());
    }

    if !metrics.identifiers.is_empty() {
        lines.push("## Identifiers".to_string());
        for identifier in &metrics.identifiers {
            let top = identifier
                .top
                .iter()
                .map(|entry| format!("{} ({})", entry.value, entry.count))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!(
                "- {}: {} distinct; top: {}",
                identifier.field, identifier.distinct, top
            ));
        }
        lines.push(String::new());
    }

    if !metrics.time_ranges.is_empty() {
        lines.push("## Time ranges".to_string());
        for range in &metrics.time_ranges {
            lines.push(format!(
                "- {}: {} .. {}",
                range.field,
                range.min.as_deref().unwrap_or("-"),
                range.max.as_deref().unwrap_or("-")
            ));
        }
        lines.push(String::new());
    }

    if !metrics.warnings.is_empty() {
        lines.push("## Warnings".to_string());
        for warning in &metrics.warnings {
            let hint = warning
                .hint
                .as_ref()
                .map(|hint| format!(" (hint: {hint})"))
                .unwrap_or_default();
            lines.push(format!("- {}: {}{}", warning.path, warning.message, hint));
        }
        lines.push(String::new());
    }

    if !violations.is_empty() {
        lines.push("## Top violations".to_string());
        for violation in violations.iter().take(max_examples) {
            let row = violation
                .row_index
                .map(|row| format!(" row {row}"))
                .unwrap_or_default();
            let example = violation
                .example
                .as_ref()
                .filter(|value| !value.is_empty())
                .map(|value| format!(" example={value}"))
                .unwrap_or_default();
            lines.push(format!(
                "- {}{}: {}{}",
                violation.path, row, violation.message, example
            ));
        }
        lines.push(String::new());
    }

    lines.push("## Performance".to_string());
    lines.push(format!("- load_ms: {}", metrics.performance.load_ms));
    lines.push(format!("- total_ms: {}", metrics.performance.total_ms));
    lines.push(format!(
        "- rows_per_sec: {:.0}",
        metrics.performance.rows_per_sec
    ));
    lines.join("\n")
}

fn optional(value: Option<f64>) -> String {
    value
        .map(|value| format!("{value:.4}"))
        .unwrap_or_else(|| "-".to_string())
}
