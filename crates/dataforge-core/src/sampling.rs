//! Configuration-time sampler parameters.
//!
//! These are the serializable halves of the distribution samplers: each
//! struct is validated once, before generation, and then turned into a
//! runtime sampler by `dataforge-generate`.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Maximum distance from 1.0 accepted for categorical weights.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Instants drawn uniformly in `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimestampRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimestampRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn validate(&self, field: &str) -> Result<()> {
        if self.start >= self.end {
            return Err(ConfigError::InvertedRange {
                field: field.to_string(),
                start: self.start.to_string(),
                end: self.end.to_string(),
            });
        }
        Ok(())
    }
}

/// Calendar days drawn uniformly in `[start, end]` (both inclusive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn validate(&self, field: &str) -> Result<()> {
        if self.start > self.end {
            return Err(ConfigError::InvertedRange {
                field: field.to_string(),
                start: self.start.to_string(),
                end: self.end.to_string(),
            });
        }
        Ok(())
    }
}

/// Labeled categories with optional probabilities.
///
/// Without `weights` every label is equally likely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Categorical {
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
}

impl Categorical {
    pub fn uniform<S: AsRef<str>>(values: &[S]) -> Self {
        Self {
            values: values.iter().map(|v| v.as_ref().to_string()).collect(),
            weights: None,
        }
    }

    pub fn weighted<S: AsRef<str>>(pairs: &[(S, f64)]) -> Self {
        Self {
            values: pairs.iter().map(|(v, _)| v.as_ref().to_string()).collect(),
            weights: Some(pairs.iter().map(|(_, w)| *w).collect()),
        }
    }

    /// Probabilities aligned with `values`.
    pub fn probabilities(&self) -> Vec<f64> {
        match &self.weights {
            Some(weights) => weights.clone(),
            None => {
                let share = 1.0 / self.values.len().max(1) as f64;
                vec![share; self.values.len()]
            }
        }
    }

    pub fn validate(&self, field: &str) -> Result<()> {
        if self.values.is_empty() {
            return Err(ConfigError::parameter(field, "at least one category is required"));
        }

        let mut seen = HashSet::new();
        for value in &self.values {
            if !seen.insert(value.as_str()) {
                return Err(ConfigError::parameter(
                    field,
                    format!("duplicate category '{value}'"),
                ));
            }
        }

        let Some(weights) = &self.weights else {
            return Ok(());
        };

        if weights.len() != self.values.len() {
            return Err(ConfigError::parameter(
                field,
                format!(
                    "{} weights for {} categories",
                    weights.len(),
                    self.values.len()
                ),
            ));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::parameter(
                field,
                "weights must be finite and non-negative",
            ));
        }

        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::WeightsNotNormalized {
                field: field.to_string(),
                sum,
            });
        }
        Ok(())
    }
}

/// Skewed identifier index over a fixed population.
///
/// `exponent` is the Pareto shape; smaller values give a heavier tail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PowerLaw {
    pub population: u64,
    pub exponent: f64,
}

impl PowerLaw {
    pub fn validate(&self, field: &str) -> Result<()> {
        if self.population == 0 {
            return Err(ConfigError::parameter(field, "population must be > 0"));
        }
        if !self.exponent.is_finite() || self.exponent <= 0.0 {
            return Err(ConfigError::parameter(field, "exponent must be > 0"));
        }
        Ok(())
    }
}

/// Bias applied to a bounded numeric draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Skew {
    /// Share of draws landing in the lower slice.
    pub low_share: f64,
    /// Width of the lower slice as a fraction of the range.
    pub low_fraction: f64,
}

impl Default for Skew {
    fn default() -> Self {
        Self {
            low_share: 0.8,
            low_fraction: 0.3,
        }
    }
}

/// Floating point measure drawn from `[min, max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skew: Option<Skew>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

impl NumericRange {
    pub fn validate(&self, field: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(ConfigError::parameter(field, "bounds must be finite"));
        }
        if self.min > self.max {
            return Err(ConfigError::InvertedRange {
                field: field.to_string(),
                start: self.min.to_string(),
                end: self.max.to_string(),
            });
        }
        if let Some(skew) = &self.skew {
            if !(0.0..=1.0).contains(&skew.low_share) {
                return Err(ConfigError::parameter(field, "low_share must be within [0, 1]"));
            }
            if !(skew.low_fraction > 0.0 && skew.low_fraction < 1.0) {
                return Err(ConfigError::parameter(
                    field,
                    "low_fraction must be within (0, 1)",
                ));
            }
        }
        if self.decimals.is_some_and(|d| d > 9) {
            return Err(ConfigError::parameter(field, "decimals must be <= 9"));
        }
        Ok(())
    }
}

/// Integer drawn uniformly from `[min, max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IntRange {
    pub min: i64,
    pub max: i64,
}

impl IntRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, field: &str) -> Result<()> {
        if self.min > self.max {
            return Err(ConfigError::InvertedRange {
                field: field.to_string(),
                start: self.min.to_string(),
                end: self.max.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_must_sum_to_one() {
        let cat = Categorical::weighted(&[("a", 0.5), ("b", 0.49)]);
        assert!(matches!(
            cat.validate("kind"),
            Err(ConfigError::WeightsNotNormalized { .. })
        ));

        let cat = Categorical::weighted(&[("a", 0.5), ("b", 0.5 + 1e-9)]);
        assert!(cat.validate("kind").is_ok());
    }

    #[test]
    fn uniform_probabilities_are_equal() {
        let cat = Categorical::uniform(&["a", "b", "c", "d"]);
        assert_eq!(cat.probabilities(), vec![0.25; 4]);
    }

    #[test]
    fn duplicate_categories_are_rejected() {
        let cat = Categorical::uniform(&["a", "a"]);
        assert!(matches!(
            cat.validate("kind"),
            Err(ConfigError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn inverted_timestamp_range_is_rejected() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 2)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let range = TimestampRange::new(start, end);
        assert!(matches!(
            range.validate("event_at"),
            Err(ConfigError::InvertedRange { .. })
        ));
    }

    #[test]
    fn skew_bounds_are_checked() {
        let range = NumericRange {
            min: 5.0,
            max: 500.0,
            skew: Some(Skew {
                low_share: 0.8,
                low_fraction: 1.0,
            }),
            decimals: Some(2),
        };
        assert!(range.validate("revenue").is_err());
    }
}
