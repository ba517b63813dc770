//! Runtime distribution samplers.
//!
//! Each sampler is built once from its validated configuration and then
//! draws values from a caller-provided RNG. Given the same RNG state and call
//! sequence a sampler always returns the same values.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rand::{Rng, RngCore};

use dataforge_core::{Categorical, DateRange, IntRange, NumericRange, PowerLaw, TimestampRange};

use crate::errors::SamplerError;

const SECONDS_PER_DAY: i64 = 86_400;

/// One field value per call.
pub trait Sampler {
    type Value;

    fn sample(&self, rng: &mut dyn RngCore) -> Result<Self::Value, SamplerError>;
}

/// Uniform instant in `[start, end)`: a day and a second of day, drawn
/// independently.
#[derive(Debug, Clone)]
pub struct UniformTimestamp {
    start: NaiveDateTime,
    total_seconds: i64,
    days: i64,
}

impl UniformTimestamp {
    pub fn new(range: &TimestampRange) -> Result<Self, SamplerError> {
        let total_seconds = (range.end - range.start).num_seconds();
        if total_seconds <= 0 {
            return Err(SamplerError::InvalidParameters {
                sampler: "uniform_timestamp",
                message: format!(
                    "range [{}, {}) spans less than one second",
                    range.start, range.end
                ),
            });
        }
        Ok(Self {
            start: range.start,
            total_seconds,
            days: (total_seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY,
        })
    }
}

impl Sampler for UniformTimestamp {
    type Value = NaiveDateTime;

    fn sample(&self, rng: &mut dyn RngCore) -> Result<NaiveDateTime, SamplerError> {
        let offset = if self.days == 1 {
            rng.random_range(0..self.total_seconds)
        } else {
            // A draw past the end of a partial last day is redrawn whole;
            // at least half of all draws are accepted.
            loop {
                let day = rng.random_range(0..self.days);
                let second = rng.random_range(0..SECONDS_PER_DAY);
                let offset = day * SECONDS_PER_DAY + second;
                if offset < self.total_seconds {
                    break offset;
                }
            }
        };

        self.start
            .checked_add_signed(TimeDelta::seconds(offset))
            .ok_or_else(|| SamplerError::OutOfRange {
                sampler: "uniform_timestamp",
                message: format!("offset of {offset} seconds overflows"),
            })
    }
}

/// Uniform calendar day in `[start, end]`.
#[derive(Debug, Clone)]
pub struct UniformDate {
    start: NaiveDate,
    span_days: i64,
}

impl UniformDate {
    pub fn new(range: &DateRange) -> Result<Self, SamplerError> {
        let span_days = (range.end - range.start).num_days();
        if span_days < 0 {
            return Err(SamplerError::InvalidParameters {
                sampler: "uniform_date",
                message: format!("start {} is after end {}", range.start, range.end),
            });
        }
        Ok(Self {
            start: range.start,
            span_days,
        })
    }
}

impl Sampler for UniformDate {
    type Value = NaiveDate;

    fn sample(&self, rng: &mut dyn RngCore) -> Result<NaiveDate, SamplerError> {
        let offset = rng.random_range(0..=self.span_days);
        self.start
            .checked_add_signed(TimeDelta::days(offset))
            .ok_or_else(|| SamplerError::OutOfRange {
                sampler: "uniform_date",
                message: format!("offset of {offset} days overflows"),
            })
    }
}

/// One of N labels, chosen proportionally to its weight.
#[derive(Debug, Clone)]
pub struct WeightedCategorical {
    labels: Vec<String>,
    cumulative: Vec<f64>,
}

impl WeightedCategorical {
    pub fn new(params: &Categorical) -> Result<Self, SamplerError> {
        let probabilities = params.probabilities();
        if params.values.is_empty() || probabilities.len() != params.values.len() {
            return Err(SamplerError::InvalidParameters {
                sampler: "weighted_categorical",
                message: "labels and weights must be non-empty and aligned".to_string(),
            });
        }

        let mut cumulative = Vec::with_capacity(probabilities.len());
        let mut running = 0.0;
        for weight in probabilities {
            if !weight.is_finite() || weight < 0.0 {
                return Err(SamplerError::InvalidParameters {
                    sampler: "weighted_categorical",
                    message: format!("weight {weight} is not a probability"),
                });
            }
            running += weight;
            cumulative.push(running);
        }
        if running <= 0.0 {
            return Err(SamplerError::InvalidParameters {
                sampler: "weighted_categorical",
                message: "weights sum to zero".to_string(),
            });
        }

        Ok(Self {
            labels: params.values.clone(),
            cumulative,
        })
    }

    pub fn label(&self, index: usize) -> &str {
        &self.labels[index]
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Sampler for WeightedCategorical {
    /// Index into [`WeightedCategorical::labels`].
    type Value = usize;

    fn sample(&self, rng: &mut dyn RngCore) -> Result<usize, SamplerError> {
        let total = self.cumulative[self.cumulative.len() - 1];
        let draw = rng.random::<f64>() * total;
        let index = self.cumulative.partition_point(|bound| *bound <= draw);
        Ok(index.min(self.labels.len() - 1))
    }
}

/// Largest rank an `f64` still represents exactly (2^53).
const MAX_EXACT_RANK: f64 = 9_007_199_254_740_992.0;

/// Zero-based index into a fixed population; low indexes dominate.
///
/// A Pareto variate with shape `exponent` is floored, shifted to start at
/// zero and folded into the population.
#[derive(Debug, Clone)]
pub struct PowerLawIndex {
    population: u64,
    inverse_exponent: f64,
}

impl PowerLawIndex {
    pub fn new(params: &PowerLaw) -> Result<Self, SamplerError> {
        if params.population == 0 || !params.exponent.is_finite() || params.exponent <= 0.0 {
            return Err(SamplerError::InvalidParameters {
                sampler: "power_law",
                message: format!(
                    "population {} and exponent {} must be positive",
                    params.population, params.exponent
                ),
            });
        }
        Ok(Self {
            population: params.population,
            inverse_exponent: 1.0 / params.exponent,
        })
    }
}

impl Sampler for PowerLawIndex {
    type Value = u64;

    fn sample(&self, rng: &mut dyn RngCore) -> Result<u64, SamplerError> {
        let u = rng.random::<f64>();
        let pareto = (1.0 - u).powf(-self.inverse_exponent);
        let rank = pareto.floor() - 1.0;
        if rank.is_finite() && rank < MAX_EXACT_RANK {
            return Ok(rank as u64 % self.population);
        }
        // Past float precision the fold carries no information; spread the
        // tail uniformly instead of overflowing.
        Ok(rng.random_range(0..self.population))
    }
}

/// Float in `[min, max]`, optionally skewed toward the low end and rounded.
#[derive(Debug, Clone)]
pub struct BoundedNumeric {
    min: f64,
    max: f64,
    split: Option<(f64, f64)>,
    scale: Option<f64>,
}

impl BoundedNumeric {
    pub fn new(params: &NumericRange) -> Result<Self, SamplerError> {
        if !params.min.is_finite() || !params.max.is_finite() || params.min > params.max {
            return Err(SamplerError::InvalidParameters {
                sampler: "bounded_numeric",
                message: format!("bounds [{}, {}] are not a finite range", params.min, params.max),
            });
        }
        let split = params.skew.as_ref().map(|skew| {
            (
                skew.low_share,
                params.min + skew.low_fraction * (params.max - params.min),
            )
        });
        Ok(Self {
            min: params.min,
            max: params.max,
            split,
            scale: params.decimals.map(|d| 10f64.powi(d as i32)),
        })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

impl Sampler for BoundedNumeric {
    type Value = f64;

    fn sample(&self, rng: &mut dyn RngCore) -> Result<f64, SamplerError> {
        let (low, high) = match self.split {
            Some((share, split)) if rng.random::<f64>() < share => (self.min, split),
            Some((_, split)) => (split, self.max),
            None => (self.min, self.max),
        };
        let raw = low + (high - low) * rng.random::<f64>();
        let value = match self.scale {
            Some(scale) => (raw * scale).round() / scale,
            None => raw,
        };
        Ok(value.clamp(self.min, self.max))
    }
}

/// Integer in `[min, max]`.
#[derive(Debug, Clone)]
pub struct UniformInt {
    min: i64,
    max: i64,
}

impl UniformInt {
    pub fn new(range: &IntRange) -> Result<Self, SamplerError> {
        if range.min > range.max {
            return Err(SamplerError::InvalidParameters {
                sampler: "uniform_int",
                message: format!("min {} is greater than max {}", range.min, range.max),
            });
        }
        Ok(Self {
            min: range.min,
            max: range.max,
        })
    }
}

impl Sampler for UniformInt {
    type Value = i64;

    fn sample(&self, rng: &mut dyn RngCore) -> Result<i64, SamplerError> {
        Ok(rng.random_range(self.min..=self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataforge_core::Skew;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, s))
            .unwrap()
    }

    #[test]
    fn timestamps_stay_inside_half_open_range() {
        let range = TimestampRange::new(ts(2024, 1, 1, 0, 0, 0), ts(2024, 1, 3, 6, 0, 0));
        let sampler = UniformTimestamp::new(&range).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut saw_partial_day = false;
        for _ in 0..20_000 {
            let value = sampler.sample(&mut rng).unwrap();
            assert!(value >= range.start && value < range.end, "{value}");
            if value.date() == range.end.date() {
                saw_partial_day = true;
            }
        }
        assert!(saw_partial_day);
    }

    #[test]
    fn partial_last_day_gets_its_proportional_share() {
        // 30 hours: the trailing 6 hours hold a fifth of the range.
        let range = TimestampRange::new(ts(2024, 1, 1, 0, 0, 0), ts(2024, 1, 2, 6, 0, 0));
        let sampler = UniformTimestamp::new(&range).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(19);
        let n = 100_000;
        let last_day = (0..n)
            .filter(|_| sampler.sample(&mut rng).unwrap().date() == range.end.date())
            .count();
        let share = last_day as f64 / n as f64;
        assert!((share - 0.2).abs() < 0.01, "last day share {share}");
    }

    #[test]
    fn short_range_within_one_day() {
        let start = ts(2024, 1, 1, 12, 0, 0);
        let range = TimestampRange::new(start, ts(2024, 1, 1, 12, 0, 3));
        let sampler = UniformTimestamp::new(&range).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        for _ in 0..1_000 {
            let value = sampler.sample(&mut rng).unwrap();
            assert!(value >= start && value < range.end);
        }
    }

    #[test]
    fn sub_second_range_is_rejected() {
        let start = ts(2024, 1, 1, 0, 0, 0);
        assert!(UniformTimestamp::new(&TimestampRange::new(start, start)).is_err());
    }

    #[test]
    fn dates_include_both_ends() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 3).unwrap(),
        );
        let sampler = UniformDate::new(&range).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..1_000 {
            seen.insert(sampler.sample(&mut rng).unwrap());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn categorical_halves_stay_within_one_percent() {
        let sampler =
            WeightedCategorical::new(&Categorical::weighted(&[("a", 0.5), ("b", 0.5)])).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let n = 1_000_000;
        let mut counts = [0u64; 2];
        for _ in 0..n {
            counts[sampler.sample(&mut rng).unwrap()] += 1;
        }
        for count in counts {
            let deviation = (count as f64 - 0.5 * n as f64).abs() / (0.5 * n as f64);
            assert!(deviation < 0.01, "count {count} deviates by {deviation}");
        }
    }

    #[test]
    fn categorical_follows_uneven_weights_and_skips_zero() {
        let sampler = WeightedCategorical::new(&Categorical::weighted(&[
            ("rare", 0.1),
            ("never", 0.0),
            ("common", 0.9),
        ]))
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut counts = [0u64; 3];
        for _ in 0..100_000 {
            counts[sampler.sample(&mut rng).unwrap()] += 1;
        }
        assert_eq!(counts[1], 0);
        assert!(counts[2] > counts[0] * 5);
        assert_eq!(sampler.label(2), "common");
    }

    #[test]
    fn heavy_tailed_power_law_never_fails() {
        let params = PowerLaw {
            population: 1500,
            exponent: 0.01,
        };
        assert!(params.validate("player_id").is_ok());
        let sampler = PowerLawIndex::new(&params).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..100_000 {
            let index = sampler.sample(&mut rng).expect("every draw folds into the population");
            assert!(index < 1500);
        }
    }

    #[test]
    fn power_law_concentrates_on_low_ranks() {
        let sampler = PowerLawIndex::new(&PowerLaw {
            population: 1500,
            exponent: 1.5,
        })
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let n = 100_000;
        let mut top_ten = 0;
        for _ in 0..n {
            let index = sampler.sample(&mut rng).unwrap();
            assert!(index < 1500);
            if index < 10 {
                top_ten += 1;
            }
        }
        // Ten of 1500 identifiers take well over half of the draws.
        assert!(top_ten > n / 2, "top ten drew {top_ten}");
    }

    #[test]
    fn skewed_numeric_favors_low_slice() {
        let sampler = BoundedNumeric::new(&NumericRange {
            min: 5.0,
            max: 500.0,
            skew: Some(Skew::default()),
            decimals: Some(2),
        })
        .unwrap();
        let split = 5.0 + 0.3 * 495.0;
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let n = 100_000;
        let mut low = 0;
        for _ in 0..n {
            let value = sampler.sample(&mut rng).unwrap();
            assert!((5.0..=500.0).contains(&value));
            assert_eq!((value * 100.0).round() / 100.0, value);
            if value <= split {
                low += 1;
            }
        }
        let share = low as f64 / n as f64;
        assert!((share - 0.8).abs() < 0.01, "low share {share}");
    }

    #[test]
    fn samplers_are_reproducible() {
        let sampler = UniformInt::new(&IntRange::new(0, 1_000_000)).unwrap();
        let draw = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..100)
                .map(|_| sampler.sample(&mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(9), draw(9));
        assert_ne!(draw(9), draw(10));
    }
}
