use serde::Serialize;

/// Physical type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    UInt64,
    Int64,
    Float64,
    Text,
    /// JSON document stored as text.
    Json,
    Timestamp,
    Date,
}

impl FieldType {
    pub fn is_temporal(self) -> bool {
        matches!(self, FieldType::Timestamp | FieldType::Date)
    }
}

/// What a column means, used to pick summary statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    /// Global row index, unique across a run.
    RowIndex,
    /// Entity identifier; reported by cardinality.
    Identifier,
    /// Enumerated label; reported by distribution.
    Category,
    /// Numeric measure; reported by min/max/mean.
    Measure,
    /// Event or signup time; reported by range.
    Time,
    /// Opaque payload; not summarized.
    Payload,
}

/// Column definition of a fixed dataset layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: &'static str,
    pub field_type: FieldType,
    pub role: FieldRole,
}

impl FieldDef {
    pub const fn new(name: &'static str, field_type: FieldType, role: FieldRole) -> Self {
        Self {
            name,
            field_type,
            role,
        }
    }
}

/// Position of `name` in a field layout.
pub fn field_index(fields: &[FieldDef], name: &str) -> Option<usize> {
    fields.iter().position(|field| field.name == name)
}

pub const ROW_INDEX: FieldDef = FieldDef::new("row_index", FieldType::UInt64, FieldRole::RowIndex);

pub const USERS_FIELDS: &[FieldDef] = &[
    ROW_INDEX,
    FieldDef::new("user_id", FieldType::Text, FieldRole::Identifier),
    FieldDef::new("signup_at", FieldType::Timestamp, FieldRole::Time),
    FieldDef::new("signup_date", FieldType::Date, FieldRole::Time),
    FieldDef::new("acquisition_channel", FieldType::Text, FieldRole::Category),
    FieldDef::new("country", FieldType::Text, FieldRole::Category),
    FieldDef::new("status", FieldType::Text, FieldRole::Category),
];

pub const EVENTS_FIELDS: &[FieldDef] = &[
    ROW_INDEX,
    FieldDef::new("user_id", FieldType::Text, FieldRole::Identifier),
    FieldDef::new("event_at", FieldType::Timestamp, FieldRole::Time),
    FieldDef::new("event_type", FieldType::Text, FieldRole::Category),
    FieldDef::new("revenue", FieldType::Float64, FieldRole::Measure),
];

pub const STRUCTURED_EVENTS_FIELDS: &[FieldDef] = &[
    ROW_INDEX,
    FieldDef::new("event_time", FieldType::Timestamp, FieldRole::Time),
    FieldDef::new("user_id", FieldType::Int64, FieldRole::Identifier),
    FieldDef::new("team_id", FieldType::Int64, FieldRole::Identifier),
    FieldDef::new("event_name", FieldType::Text, FieldRole::Category),
    FieldDef::new("properties", FieldType::Json, FieldRole::Payload),
];

pub const LEADERBOARD_FIELDS: &[FieldDef] = &[
    ROW_INDEX,
    FieldDef::new("game_id", FieldType::Text, FieldRole::Category),
    FieldDef::new("region", FieldType::Text, FieldRole::Category),
    FieldDef::new("day", FieldType::Date, FieldRole::Time),
    FieldDef::new("player_id", FieldType::Text, FieldRole::Identifier),
    FieldDef::new("score", FieldType::Int64, FieldRole::Measure),
    FieldDef::new("ts", FieldType::Timestamp, FieldRole::Time),
];

pub const TENANT_ACTIVITY_FIELDS: &[FieldDef] = &[
    ROW_INDEX,
    FieldDef::new("user_id", FieldType::Text, FieldRole::Identifier),
    FieldDef::new("dt", FieldType::Date, FieldRole::Time),
    FieldDef::new("tenant", FieldType::Text, FieldRole::Category),
    FieldDef::new("country", FieldType::Text, FieldRole::Category),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_layout_starts_with_row_index() {
        for fields in [
            USERS_FIELDS,
            EVENTS_FIELDS,
            STRUCTURED_EVENTS_FIELDS,
            LEADERBOARD_FIELDS,
            TENANT_ACTIVITY_FIELDS,
        ] {
            assert_eq!(fields[0], ROW_INDEX);
            assert_eq!(
                fields
                    .iter()
                    .filter(|f| f.role == FieldRole::RowIndex)
                    .count(),
                1
            );
        }
    }

    #[test]
    fn field_index_finds_columns() {
        assert_eq!(field_index(EVENTS_FIELDS, "event_at"), Some(2));
        assert_eq!(field_index(EVENTS_FIELDS, "missing"), None);
    }
}
