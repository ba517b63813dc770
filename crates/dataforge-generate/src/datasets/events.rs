use chrono::NaiveDateTime;
use rand::RngCore;

use dataforge_core::schema::EVENTS_FIELDS;
use dataforge_core::{EventsConfig, FieldDef, IdFormat};

use crate::errors::SamplerError;
use crate::record::{DatasetRecord, FieldValue, RecordGenerator};
use crate::samplers::{
    BoundedNumeric, PowerLawIndex, Sampler, UniformTimestamp, WeightedCategorical,
};

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub row_index: u64,
    pub user_id: String,
    pub event_at: NaiveDateTime,
    pub event_type: String,
    pub revenue: f64,
}

impl DatasetRecord for EventRecord {
    fn fields() -> &'static [FieldDef] {
        EVENTS_FIELDS
    }

    fn row_index(&self) -> u64 {
        self.row_index
    }

    fn value(&self, column: usize) -> FieldValue<'_> {
        match column {
            0 => FieldValue::UInt(self.row_index),
            1 => FieldValue::Text(&self.user_id),
            2 => FieldValue::Timestamp(self.event_at),
            3 => FieldValue::Text(&self.event_type),
            4 => FieldValue::Float(self.revenue),
            _ => FieldValue::Null,
        }
    }
}

/// Behavioral events. Revenue is drawn only for transaction types and is
/// exactly zero otherwise.
#[derive(Debug, Clone)]
pub struct EventsGenerator {
    user: PowerLawIndex,
    user_format: IdFormat,
    event_at: UniformTimestamp,
    event_type: WeightedCategorical,
    revenue: BoundedNumeric,
    /// Indexed like the event type labels.
    is_transaction: Vec<bool>,
}

impl EventsGenerator {
    pub fn new(config: &EventsConfig) -> Result<Self, SamplerError> {
        let event_type = WeightedCategorical::new(&config.event_type)?;
        let is_transaction = event_type
            .labels()
            .iter()
            .map(|label| config.transaction_types.contains(label))
            .collect();

        Ok(Self {
            user: PowerLawIndex::new(&config.user_id)?,
            user_format: config.user_id_format.clone(),
            event_at: UniformTimestamp::new(&config.event_at)?,
            event_type,
            revenue: BoundedNumeric::new(&config.revenue)?,
            is_transaction,
        })
    }
}

impl RecordGenerator for EventsGenerator {
    type Record = EventRecord;

    fn generate(&self, row_index: u64, rng: &mut dyn RngCore) -> Result<EventRecord, SamplerError> {
        let user = self.user.sample(rng)?;
        let event_at = self.event_at.sample(rng)?;
        let kind = self.event_type.sample(rng)?;
        let revenue = if self.is_transaction[kind] {
            self.revenue.sample(rng)?
        } else {
            0.0
        };

        Ok(EventRecord {
            row_index,
            user_id: self.user_format.render(user + 1),
            event_at,
            event_type: self.event_type.label(kind).to_string(),
            revenue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn revenue_follows_event_type() {
        let config = EventsConfig::default();
        let generator = EventsGenerator::new(&config).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut transactions = 0;
        for row_index in 0..50_000 {
            let record = generator.generate(row_index, &mut rng).unwrap();
            if config.transaction_types.contains(&record.event_type) {
                transactions += 1;
                assert!(record.revenue >= config.revenue.min);
                assert!(record.revenue <= config.revenue.max);
            } else {
                assert_eq!(record.revenue, 0.0);
            }
        }
        assert!(transactions > 0);
    }
}
