use chrono::NaiveDateTime;
use rand::distr::{Alphanumeric, Distribution};
use rand::{Rng, RngCore};
use serde_json::{Map, Value};

use dataforge_core::schema::STRUCTURED_EVENTS_FIELDS;
use dataforge_core::{FieldDef, StructuredEventsConfig};

use crate::errors::SamplerError;
use crate::record::{DatasetRecord, FieldValue, RecordGenerator};
use crate::samplers::{BoundedNumeric, Sampler, UniformInt, UniformTimestamp, WeightedCategorical};

#[derive(Debug, Clone, PartialEq)]
pub struct StructuredEventRecord {
    pub row_index: u64,
    pub event_time: NaiveDateTime,
    pub user_id: i64,
    pub team_id: i64,
    pub event_name: String,
    /// JSON object text.
    pub properties: String,
}

impl DatasetRecord for StructuredEventRecord {
    fn fields() -> &'static [FieldDef] {
        STRUCTURED_EVENTS_FIELDS
    }

    fn row_index(&self) -> u64 {
        self.row_index
    }

    fn value(&self, column: usize) -> FieldValue<'_> {
        match column {
            0 => FieldValue::UInt(self.row_index),
            1 => FieldValue::Timestamp(self.event_time),
            2 => FieldValue::Int(self.user_id),
            3 => FieldValue::Int(self.team_id),
            4 => FieldValue::Text(&self.event_name),
            5 => FieldValue::Text(&self.properties),
            _ => FieldValue::Null,
        }
    }
}

/// Random flat JSON objects: a few distinct keys, each holding a string, a
/// number or a boolean.
#[derive(Debug, Clone)]
struct PropertiesSampler {
    keys: Vec<String>,
    min_keys: usize,
    max_keys: usize,
    text_len: UniformInt,
    number: BoundedNumeric,
}

impl PropertiesSampler {
    fn sample(&self, rng: &mut dyn RngCore) -> Result<String, SamplerError> {
        let count = rng.random_range(self.min_keys..=self.max_keys);
        let mut object = Map::new();
        for index in rand::seq::index::sample(rng, self.keys.len(), count) {
            let value = match rng.random_range(0..3u8) {
                0 => {
                    let len = self.text_len.sample(rng)? as usize;
                    let text: String = (0..len)
                        .map(|_| Alphanumeric.sample(rng) as char)
                        .collect();
                    Value::String(text)
                }
                1 => Value::from(self.number.sample(rng)?),
                _ => Value::Bool(rng.random_bool(0.5)),
            };
            object.insert(self.keys[index].clone(), value);
        }

        serde_json::to_string(&Value::Object(object)).map_err(|err| SamplerError::OutOfRange {
            sampler: "properties",
            message: err.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct StructuredEventsGenerator {
    event_time: UniformTimestamp,
    user_id: UniformInt,
    team_id: UniformInt,
    event_name: WeightedCategorical,
    properties: PropertiesSampler,
}

impl StructuredEventsGenerator {
    pub fn new(config: &StructuredEventsConfig) -> Result<Self, SamplerError> {
        let props = &config.properties;
        let max_keys = (props.max_keys as usize).min(props.keys.len());
        let min_keys = props.min_keys as usize;
        if props.keys.is_empty() || min_keys == 0 || min_keys > max_keys {
            return Err(SamplerError::InvalidParameters {
                sampler: "properties",
                message: format!(
                    "cannot draw {}..={} keys from {} candidates",
                    props.min_keys,
                    props.max_keys,
                    props.keys.len()
                ),
            });
        }
        if props.text_len.min < 1 {
            return Err(SamplerError::InvalidParameters {
                sampler: "properties",
                message: "text length must be at least 1".to_string(),
            });
        }

        Ok(Self {
            event_time: UniformTimestamp::new(&config.event_time)?,
            user_id: UniformInt::new(&config.user_id)?,
            team_id: UniformInt::new(&config.team_id)?,
            event_name: WeightedCategorical::new(&config.event_name)?,
            properties: PropertiesSampler {
                keys: props.keys.clone(),
                min_keys,
                max_keys,
                text_len: UniformInt::new(&props.text_len)?,
                number: BoundedNumeric::new(&props.number)?,
            },
        })
    }
}

impl RecordGenerator for StructuredEventsGenerator {
    type Record = StructuredEventRecord;

    fn generate(
        &self,
        row_index: u64,
        rng: &mut dyn RngCore,
    ) -> Result<StructuredEventRecord, SamplerError> {
        let event_time = self.event_time.sample(rng)?;
        let user_id = self.user_id.sample(rng)?;
        let team_id = self.team_id.sample(rng)?;
        let event_name = self.event_name.sample(rng)?;
        let properties = self.properties.sample(rng)?;

        Ok(StructuredEventRecord {
            row_index,
            event_time,
            user_id,
            team_id,
            event_name: self.event_name.label(event_name).to_string(),
            properties,
        })
    }
}
