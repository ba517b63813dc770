use chrono::{NaiveDate, NaiveDateTime};
use rand::RngCore;

use dataforge_core::schema::USERS_FIELDS;
use dataforge_core::{FieldDef, IdFormat, UsersConfig};

use crate::errors::SamplerError;
use crate::record::{DatasetRecord, FieldValue, RecordGenerator};
use crate::samplers::{Sampler, UniformTimestamp, WeightedCategorical};

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub row_index: u64,
    pub user_id: String,
    pub signup_at: NaiveDateTime,
    pub signup_date: NaiveDate,
    pub acquisition_channel: String,
    pub country: String,
    pub status: String,
}

impl DatasetRecord for UserRecord {
    fn fields() -> &'static [FieldDef] {
        USERS_FIELDS
    }

    fn row_index(&self) -> u64 {
        self.row_index
    }

    fn value(&self, column: usize) -> FieldValue<'_> {
        match column {
            0 => FieldValue::UInt(self.row_index),
            1 => FieldValue::Text(&self.user_id),
            2 => FieldValue::Timestamp(self.signup_at),
            3 => FieldValue::Date(self.signup_date),
            4 => FieldValue::Text(&self.acquisition_channel),
            5 => FieldValue::Text(&self.country),
            6 => FieldValue::Text(&self.status),
            _ => FieldValue::Null,
        }
    }
}

/// Users numbered from their row index; `signup_date` is the day of
/// `signup_at`.
#[derive(Debug, Clone)]
pub struct UsersGenerator {
    user_id: IdFormat,
    signup_at: UniformTimestamp,
    acquisition_channel: WeightedCategorical,
    country: WeightedCategorical,
    status: WeightedCategorical,
}

impl UsersGenerator {
    pub fn new(config: &UsersConfig) -> Result<Self, SamplerError> {
        Ok(Self {
            user_id: config.user_id.clone(),
            signup_at: UniformTimestamp::new(&config.signup_at)?,
            acquisition_channel: WeightedCategorical::new(&config.acquisition_channel)?,
            country: WeightedCategorical::new(&config.country)?,
            status: WeightedCategorical::new(&config.status)?,
        })
    }
}

impl RecordGenerator for UsersGenerator {
    type Record = UserRecord;

    fn generate(&self, row_index: u64, rng: &mut dyn RngCore) -> Result<UserRecord, SamplerError> {
        let signup_at = self.signup_at.sample(rng)?;
        let channel = self.acquisition_channel.sample(rng)?;
        let country = self.country.sample(rng)?;
        let status = self.status.sample(rng)?;

        Ok(UserRecord {
            row_index,
            user_id: self.user_id.render(row_index + 1),
            signup_at,
            signup_date: signup_at.date(),
            acquisition_channel: self.acquisition_channel.label(channel).to_string(),
            country: self.country.label(country).to_string(),
            status: self.status.label(status).to_string(),
        })
    }
}
