use std::collections::BTreeMap;

use dataforge_core::{
    ConfigError, FieldDef, KeyTransform, PartitionKey, PartitionValue, escape_partition_value,
    field_index,
};

use crate::record::{DatasetRecord, FieldValue};

#[derive(Debug, Clone)]
struct ResolvedKey {
    name: String,
    column: usize,
    transform: KeyTransform,
}

/// Derives partition values from record content.
#[derive(Debug, Clone)]
pub struct Partitioner {
    keys: Vec<ResolvedKey>,
}

impl Partitioner {
    pub fn new(fields: &[FieldDef], keys: &[PartitionKey]) -> Result<Self, ConfigError> {
        let keys = keys
            .iter()
            .map(|key| {
                let column =
                    field_index(fields, &key.field).ok_or_else(|| ConfigError::UnknownField {
                        context: "partition_by",
                        field: key.field.clone(),
                    })?;
                Ok(ResolvedKey {
                    name: key.name.clone(),
                    column,
                    transform: key.transform,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { keys })
    }

    /// Partition value of one record. Depends on nothing but the record.
    pub fn key_for<R: DatasetRecord>(&self, record: &R) -> PartitionValue {
        PartitionValue::new(
            self.keys
                .iter()
                .map(|key| {
                    let raw = render_value(record.value(key.column), key.transform);
                    (key.name.clone(), escape_partition_value(&raw))
                })
                .collect(),
        )
    }

    /// Group records by partition value, keeping their relative order.
    pub fn partition<R: DatasetRecord>(&self, records: Vec<R>) -> BTreeMap<PartitionValue, Vec<R>> {
        let mut partitions: BTreeMap<PartitionValue, Vec<R>> = BTreeMap::new();
        for record in records {
            partitions
                .entry(self.key_for(&record))
                .or_default()
                .push(record);
        }
        partitions
    }

    /// Columns whose whole value is carried by an identity key in the path.
    pub fn path_encoded_columns(&self) -> Vec<usize> {
        self.keys
            .iter()
            .filter(|key| key.transform == KeyTransform::Identity)
            .map(|key| key.column)
            .collect()
    }

    pub fn key_names(&self) -> Vec<String> {
        self.keys.iter().map(|key| key.name.clone()).collect()
    }
}

/// Unescaped text of a field under a key transform.
pub fn render_value(value: FieldValue<'_>, transform: KeyTransform) -> String {
    match value {
        FieldValue::Timestamp(ts) => transform.render_timestamp(ts),
        FieldValue::Date(date) => transform.render_date(date),
        FieldValue::Text(text) => text.to_string(),
        FieldValue::UInt(value) => value.to_string(),
        FieldValue::Int(value) => value.to_string(),
        FieldValue::Float(value) => value.to_string(),
        FieldValue::Null => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{EventRecord, TenantActivityRecord};
    use chrono::NaiveDate;
    use dataforge_core::schema::{EVENTS_FIELDS, TENANT_ACTIVITY_FIELDS};

    fn event(row_index: u64, day: u32, hour: u32) -> EventRecord {
        EventRecord {
            row_index,
            user_id: format!("u_{row_index:04}"),
            event_at: NaiveDate::from_ymd_opt(2024, 5, day)
                .and_then(|d| d.and_hms_opt(hour, 30, 0))
                .unwrap(),
            event_type: "view".to_string(),
            revenue: 0.0,
        }
    }

    #[test]
    fn day_partitions_follow_timestamp() {
        let partitioner = Partitioner::new(
            EVENTS_FIELDS,
            &[PartitionKey::new("date", "event_at", KeyTransform::Day)],
        )
        .unwrap();
        let records: Vec<EventRecord> = (0..300)
            .map(|i| event(i, 1 + (i % 3) as u32, (i % 24) as u32))
            .collect();
        let partitions = partitioner.partition(records);
        assert_eq!(partitions.len(), 3);
        for (value, records) in &partitions {
            assert_eq!(records.len(), 100);
            for record in records {
                assert_eq!(
                    value.get("date"),
                    Some(record.event_at.format("%Y-%m-%d").to_string().as_str())
                );
            }
            assert!(records.windows(2).all(|w| w[0].row_index < w[1].row_index));
        }
    }

    #[test]
    fn two_keys_nest_in_declared_order() {
        let partitioner = Partitioner::new(
            TENANT_ACTIVITY_FIELDS,
            &[
                PartitionKey::new("dt", "dt", KeyTransform::Identity),
                PartitionKey::new("tenant", "tenant", KeyTransform::Identity),
            ],
        )
        .unwrap();
        let record = TenantActivityRecord {
            row_index: 0,
            user_id: "user_00000001".to_string(),
            dt: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
            tenant: "acme".to_string(),
            country: "US".to_string(),
        };
        assert_eq!(
            partitioner.key_for(&record).to_string(),
            "dt=2026-01-02/tenant=acme"
        );
        assert_eq!(partitioner.path_encoded_columns(), vec![2, 3]);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = Partitioner::new(
            EVENTS_FIELDS,
            &[PartitionKey::new("date", "missing", KeyTransform::Day)],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField { .. }));
    }
}
