//! Dataset profiles: the fixed record layouts the generator can produce and
//! the per-field sampler parameters of each.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{KeyTransform, PartitionKey};
use crate::error::{ConfigError, Result};
use crate::sampling::{Categorical, DateRange, IntRange, NumericRange, PowerLaw, Skew, TimestampRange};
use crate::schema::{
    EVENTS_FIELDS, FieldDef, LEADERBOARD_FIELDS, STRUCTURED_EVENTS_FIELDS,
    TENANT_ACTIVITY_FIELDS, USERS_FIELDS,
};

/// Dataset selector, mirrors the `kind` tag of [`DatasetConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Users,
    Events,
    StructuredEvents,
    Leaderboard,
    TenantActivity,
}

impl DatasetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKind::Users => "users",
            DatasetKind::Events => "events",
            DatasetKind::StructuredEvents => "structured_events",
            DatasetKind::Leaderboard => "leaderboard",
            DatasetKind::TenantActivity => "tenant_activity",
        }
    }

    pub fn fields(self) -> &'static [FieldDef] {
        match self {
            DatasetKind::Users => USERS_FIELDS,
            DatasetKind::Events => EVENTS_FIELDS,
            DatasetKind::StructuredEvents => STRUCTURED_EVENTS_FIELDS,
            DatasetKind::Leaderboard => LEADERBOARD_FIELDS,
            DatasetKind::TenantActivity => TENANT_ACTIVITY_FIELDS,
        }
    }
}

impl std::str::FromStr for DatasetKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "users" => Ok(DatasetKind::Users),
            "events" => Ok(DatasetKind::Events),
            "structured_events" => Ok(DatasetKind::StructuredEvents),
            "leaderboard" => Ok(DatasetKind::Leaderboard),
            "tenant_activity" => Ok(DatasetKind::TenantActivity),
            other => Err(format!("unknown dataset '{other}'")),
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dataset profile with its sampler parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetConfig {
    Users(UsersConfig),
    Events(EventsConfig),
    StructuredEvents(StructuredEventsConfig),
    Leaderboard(LeaderboardConfig),
    TenantActivity(TenantActivityConfig),
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig::Events(EventsConfig::default())
    }
}

/// Expected label distribution of a categorical column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalExpectation {
    pub field: String,
    pub values: Vec<String>,
    pub probabilities: Vec<f64>,
}

/// A measure that is zero unless its category is in `categories`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionalMeasure {
    pub measure: String,
    pub category_field: String,
    pub categories: Vec<String>,
    pub min: f64,
    pub max: f64,
}

impl DatasetConfig {
    pub fn default_for(kind: DatasetKind) -> Self {
        match kind {
            DatasetKind::Users => DatasetConfig::Users(UsersConfig::default()),
            DatasetKind::Events => DatasetConfig::Events(EventsConfig::default()),
            DatasetKind::StructuredEvents => {
                DatasetConfig::StructuredEvents(StructuredEventsConfig::default())
            }
            DatasetKind::Leaderboard => DatasetConfig::Leaderboard(LeaderboardConfig::default()),
            DatasetKind::TenantActivity => {
                DatasetConfig::TenantActivity(TenantActivityConfig::default())
            }
        }
    }

    pub fn kind(&self) -> DatasetKind {
        match self {
            DatasetConfig::Users(_) => DatasetKind::Users,
            DatasetConfig::Events(_) => DatasetKind::Events,
            DatasetConfig::StructuredEvents(_) => DatasetKind::StructuredEvents,
            DatasetConfig::Leaderboard(_) => DatasetKind::Leaderboard,
            DatasetConfig::TenantActivity(_) => DatasetKind::TenantActivity,
        }
    }

    pub fn fields(&self) -> &'static [FieldDef] {
        self.kind().fields()
    }

    /// Partitioning used when the configuration does not name one.
    pub fn default_partition_keys(&self) -> Vec<PartitionKey> {
        match self {
            DatasetConfig::Users(_) => vec![PartitionKey::new(
                "signup_date",
                "signup_date",
                KeyTransform::Identity,
            )],
            DatasetConfig::Events(_) => {
                vec![PartitionKey::new("date", "event_at", KeyTransform::Day)]
            }
            DatasetConfig::StructuredEvents(_) => {
                vec![PartitionKey::new("date", "event_time", KeyTransform::Day)]
            }
            DatasetConfig::Leaderboard(_) => {
                vec![PartitionKey::new("day", "day", KeyTransform::Identity)]
            }
            DatasetConfig::TenantActivity(_) => vec![
                PartitionKey::new("dt", "dt", KeyTransform::Identity),
                PartitionKey::new("tenant", "tenant", KeyTransform::Identity),
            ],
        }
    }

    /// Field the output is ordered by when the configuration does not name one.
    pub fn default_sort_field(&self) -> &'static str {
        match self {
            DatasetConfig::Events(_) => "event_at",
            DatasetConfig::StructuredEvents(_) => "event_time",
            _ => "row_index",
        }
    }

    /// Configured distributions the verifier compares observed counts to.
    pub fn categorical_expectations(&self) -> Vec<CategoricalExpectation> {
        let pairs: Vec<(&str, &Categorical)> = match self {
            DatasetConfig::Users(cfg) => vec![
                ("acquisition_channel", &cfg.acquisition_channel),
                ("country", &cfg.country),
                ("status", &cfg.status),
            ],
            DatasetConfig::Events(cfg) => vec![("event_type", &cfg.event_type)],
            DatasetConfig::StructuredEvents(cfg) => vec![("event_name", &cfg.event_name)],
            DatasetConfig::Leaderboard(cfg) => {
                vec![("game_id", &cfg.game_id), ("region", &cfg.region)]
            }
            DatasetConfig::TenantActivity(cfg) => {
                vec![("tenant", &cfg.tenant), ("country", &cfg.country)]
            }
        };

        pairs
            .into_iter()
            .map(|(field, categorical)| CategoricalExpectation {
                field: field.to_string(),
                values: categorical.values.clone(),
                probabilities: categorical.probabilities(),
            })
            .collect()
    }

    pub fn conditional_measure(&self) -> Option<ConditionalMeasure> {
        match self {
            DatasetConfig::Events(cfg) => Some(ConditionalMeasure {
                measure: "revenue".to_string(),
                category_field: "event_type".to_string(),
                categories: cfg.transaction_types.clone(),
                min: cfg.revenue.min,
                max: cfg.revenue.max,
            }),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            DatasetConfig::Users(cfg) => cfg.validate(),
            DatasetConfig::Events(cfg) => cfg.validate(),
            DatasetConfig::StructuredEvents(cfg) => cfg.validate(),
            DatasetConfig::Leaderboard(cfg) => cfg.validate(),
            DatasetConfig::TenantActivity(cfg) => cfg.validate(),
        }
    }
}

/// Zero-padded textual identifier, e.g. `u_0042`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IdFormat {
    pub prefix: String,
    pub width: usize,
}

impl IdFormat {
    pub fn new(prefix: &str, width: usize) -> Self {
        Self {
            prefix: prefix.to_string(),
            width,
        }
    }

    pub fn render(&self, value: u64) -> String {
        format!("{}{:0width$}", self.prefix, value, width = self.width)
    }

    fn validate(&self, field: &str) -> Result<()> {
        if self.width > 32 {
            return Err(ConfigError::parameter(field, "id width must be <= 32"));
        }
        Ok(())
    }
}

/// Identity and signup records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct UsersConfig {
    /// Users are numbered from their row index, starting at 1.
    pub user_id: IdFormat,
    pub signup_at: TimestampRange,
    pub acquisition_channel: Categorical,
    pub country: Categorical,
    pub status: Categorical,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            user_id: IdFormat::new("u_", 4),
            signup_at: TimestampRange::new(midnight(2022, 1, 1), midnight(2025, 1, 31)),
            acquisition_channel: Categorical::uniform(&[
                "organic",
                "paid_search",
                "social",
                "referral",
                "email",
                "direct",
            ]),
            country: Categorical::uniform(&[
                "US", "GB", "CA", "AU", "DE", "FR", "IN", "BR", "JP", "SG", "NL", "ES", "IT", "MX",
                "AR",
            ]),
            status: Categorical::weighted(&[
                ("active", 0.70),
                ("inactive", 0.15),
                ("suspended", 0.05),
                ("deactivated", 0.10),
            ]),
        }
    }
}

impl UsersConfig {
    fn validate(&self) -> Result<()> {
        self.user_id.validate("user_id")?;
        self.signup_at.validate("signup_at")?;
        self.acquisition_channel.validate("acquisition_channel")?;
        self.country.validate("country")?;
        self.status.validate("status")
    }
}

/// Behavioral events with a revenue measure on transaction types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EventsConfig {
    pub user_id: PowerLaw,
    pub user_id_format: IdFormat,
    pub event_at: TimestampRange,
    pub event_type: Categorical,
    pub revenue: NumericRange,
    /// Event types that carry revenue; every other type has revenue 0.
    pub transaction_types: Vec<String>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            user_id: PowerLaw {
                population: 1500,
                exponent: 1.5,
            },
            user_id_format: IdFormat::new("u_", 4),
            event_at: TimestampRange::new(midnight(2022, 1, 1), midnight(2025, 2, 1)),
            event_type: Categorical::weighted(&[
                ("purchase", 0.05),
                ("session", 0.50),
                ("activation", 0.03),
                ("signup", 0.02),
                ("view", 0.25),
                ("click", 0.10),
                ("add_to_cart", 0.03),
                ("checkout", 0.02),
            ]),
            revenue: NumericRange {
                min: 5.0,
                max: 500.0,
                skew: Some(Skew::default()),
                decimals: Some(2),
            },
            transaction_types: vec!["purchase".to_string(), "checkout".to_string()],
        }
    }
}

impl EventsConfig {
    fn validate(&self) -> Result<()> {
        self.user_id.validate("user_id")?;
        self.user_id_format.validate("user_id")?;
        self.event_at.validate("event_at")?;
        self.event_type.validate("event_type")?;
        self.revenue.validate("revenue")?;
        if self.revenue.min <= 0.0 {
            return Err(ConfigError::parameter(
                "revenue",
                "min must be > 0 so transactions are distinguishable from zero revenue",
            ));
        }
        for kind in &self.transaction_types {
            if !self.event_type.values.contains(kind) {
                return Err(ConfigError::parameter(
                    "transaction_types",
                    format!("'{kind}' is not an event_type value"),
                ));
            }
        }
        Ok(())
    }
}

/// Shape of the random JSON `properties` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PropertiesConfig {
    pub keys: Vec<String>,
    pub min_keys: u32,
    pub max_keys: u32,
    pub text_len: IntRange,
    pub number: NumericRange,
}

impl Default for PropertiesConfig {
    fn default() -> Self {
        Self {
            keys: [
                "page_url",
                "button_id",
                "form_id",
                "video_id",
                "product_id",
                "category",
                "price",
                "quantity",
                "search_term",
                "filter_type",
                "platform",
                "browser",
                "device_type",
                "session_id",
            ]
            .iter()
            .map(|key| key.to_string())
            .collect(),
            min_keys: 2,
            max_keys: 5,
            text_len: IntRange::new(5, 15),
            number: NumericRange {
                min: 1.0,
                max: 1000.0,
                skew: None,
                decimals: Some(2),
            },
        }
    }
}

impl PropertiesConfig {
    fn validate(&self) -> Result<()> {
        if self.keys.is_empty() {
            return Err(ConfigError::parameter("properties", "keys must not be empty"));
        }
        if self.min_keys == 0 || self.min_keys > self.max_keys {
            return Err(ConfigError::parameter(
                "properties",
                "require 0 < min_keys <= max_keys",
            ));
        }
        self.text_len.validate("properties.text_len")?;
        if self.text_len.min < 1 {
            return Err(ConfigError::parameter(
                "properties.text_len",
                "min must be >= 1",
            ));
        }
        self.number.validate("properties.number")
    }
}

/// Product-analytics events with a nested JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StructuredEventsConfig {
    pub event_time: TimestampRange,
    pub user_id: IntRange,
    pub team_id: IntRange,
    pub event_name: Categorical,
    pub properties: PropertiesConfig,
}

impl Default for StructuredEventsConfig {
    fn default() -> Self {
        Self {
            event_time: TimestampRange::new(midnight(2023, 1, 1), midnight(2025, 12, 31)),
            user_id: IntRange::new(1, 99_999),
            team_id: IntRange::new(1, 999),
            event_name: Categorical::uniform(&[
                "page_view",
                "button_click",
                "form_submit",
                "video_play",
                "video_pause",
                "add_to_cart",
                "remove_from_cart",
                "checkout",
                "purchase",
                "sign_up",
                "sign_in",
                "sign_out",
                "search",
                "filter_apply",
                "share",
            ]),
            properties: PropertiesConfig::default(),
        }
    }
}

impl StructuredEventsConfig {
    fn validate(&self) -> Result<()> {
        self.event_time.validate("event_time")?;
        self.user_id.validate("user_id")?;
        self.team_id.validate("team_id")?;
        self.event_name.validate("event_name")?;
        self.properties.validate()
    }
}

/// Game leaderboard scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LeaderboardConfig {
    pub game_id: Categorical,
    pub region: Categorical,
    pub day: DateRange,
    pub player_id: IntRange,
    pub player_id_format: IdFormat,
    pub score: IntRange,
    pub ts: TimestampRange,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            game_id: Categorical::uniform(&[
                "space_racers",
                "battle_arena",
                "dragon_legends",
                "turbo_drift",
                "shadow_strike",
                "dungeon_quest",
                "candy_cascade",
                "galaxy_wars",
                "tower_defense",
                "cyber_warriors",
            ]),
            region: Categorical::uniform(&["NA", "EU", "ASIA", "SA", "OCE"]),
            day: DateRange::new(date(2025, 12, 1), date(2025, 12, 31)),
            player_id: IntRange::new(1, 5000),
            player_id_format: IdFormat::new("player_", 6),
            score: IntRange::new(0, 1_000_000),
            ts: TimestampRange::new(midnight(2025, 12, 1), midnight(2025, 12, 31)),
        }
    }
}

impl LeaderboardConfig {
    fn validate(&self) -> Result<()> {
        self.game_id.validate("game_id")?;
        self.region.validate("region")?;
        self.day.validate("day")?;
        self.player_id.validate("player_id")?;
        if self.player_id.min < 0 {
            return Err(ConfigError::parameter("player_id", "min must be >= 0"));
        }
        self.player_id_format.validate("player_id")?;
        self.score.validate("score")?;
        self.ts.validate("ts")
    }
}

/// Multi-tenant activity rows partitioned by day and tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TenantActivityConfig {
    pub user_id: IntRange,
    pub user_id_format: IdFormat,
    pub dt: DateRange,
    pub tenant: Categorical,
    pub country: Categorical,
}

impl Default for TenantActivityConfig {
    fn default() -> Self {
        Self {
            user_id: IntRange::new(1, 9_999),
            user_id_format: IdFormat::new("user_", 8),
            dt: DateRange::new(date(2026, 1, 1), date(2026, 1, 18)),
            tenant: Categorical::uniform(&["acme", "globex", "initech", "umbrella"]),
            country: Categorical::uniform(&[
                "US", "CA", "GB", "DE", "FR", "AU", "JP", "IN", "BR", "ZA",
            ]),
        }
    }
}

impl TenantActivityConfig {
    fn validate(&self) -> Result<()> {
        self.user_id.validate("user_id")?;
        if self.user_id.min < 0 {
            return Err(ConfigError::parameter("user_id", "min must be >= 0"));
        }
        self.user_id_format.validate("user_id")?;
        self.dt.validate("dt")?;
        self.tenant.validate("tenant")?;
        self.country.validate("country")
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    date(year, month, day).and_time(NaiveTime::MIN)
}
