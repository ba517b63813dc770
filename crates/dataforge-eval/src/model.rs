use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use dataforge_core::VerifyConfig;

use crate::metrics::VerificationMetrics;

/// Options for re-reading and checking a generated dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOptions {
    /// Fail on integrity violations (duplicates, omissions, misplaced rows).
    pub strict: bool,
    /// Allowed absolute drift of a category share before a warning.
    pub tolerance: f64,
    /// Identifiers listed per identifier field, most frequent first.
    pub top_identifiers: usize,
    /// Violations kept per code; the counts always cover every row.
    pub max_examples: usize,
    /// Where `verification.json` and `report.md` go. Nothing is written
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            strict: true,
            tolerance: 0.01,
            top_identifiers: 10,
            max_examples: 20,
            out_dir: None,
        }
    }
}

impl VerifyOptions {
    pub fn from_config(config: &VerifyConfig) -> Self {
        Self {
            tolerance: config.tolerance,
            top_identifiers: config.top_identifiers,
            ..Self::default()
        }
    }
}

/// Structured violation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub code: String,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

/// Violations by code, with a bounded number of examples each.
#[derive(Debug, Clone, Default)]
pub struct ViolationLog {
    examples: Vec<Violation>,
    counts: BTreeMap<String, u64>,
    max_examples: usize,
}

impl ViolationLog {
    pub fn new(max_examples: usize) -> Self {
        Self {
            max_examples,
            ..Self::default()
        }
    }

    /// Count `occurrences` of `code`; keep `violation` as an example while
    /// the code is under its example cap.
    pub fn record(&mut self, violation: Violation, occurrences: u64) {
        if occurrences == 0 {
            return;
        }
        let count = self.counts.entry(violation.code.clone()).or_default();
        let kept = *count;
        *count += occurrences;
        if (kept as usize) < self.max_examples {
            self.examples.push(violation);
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    pub fn into_examples(self) -> Vec<Violation> {
        self.examples
    }
}

/// Result of a verification.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub metrics_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub metrics: VerificationMetrics,
    pub report: String,
    pub violations: Vec<Violation>,
}
