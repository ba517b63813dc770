use chrono::NaiveDate;
use rand::RngCore;

use dataforge_core::schema::TENANT_ACTIVITY_FIELDS;
use dataforge_core::{FieldDef, IdFormat, TenantActivityConfig};

use crate::errors::SamplerError;
use crate::record::{DatasetRecord, FieldValue, RecordGenerator};
use crate::samplers::{Sampler, UniformDate, UniformInt, WeightedCategorical};

#[derive(Debug, Clone, PartialEq)]
pub struct TenantActivityRecord {
    pub row_index: u64,
    pub user_id: String,
    pub dt: NaiveDate,
    pub tenant: String,
    pub country: String,
}

impl DatasetRecord for TenantActivityRecord {
    fn fields() -> &'static [FieldDef] {
        TENANT_ACTIVITY_FIELDS
    }

    fn row_index(&self) -> u64 {
        self.row_index
    }

    fn value(&self, column: usize) -> FieldValue<'_> {
        match column {
            0 => FieldValue::UInt(self.row_index),
            1 => FieldValue::Text(&self.user_id),
            2 => FieldValue::Date(self.dt),
            3 => FieldValue::Text(&self.tenant),
            4 => FieldValue::Text(&self.country),
            _ => FieldValue::Null,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TenantActivityGenerator {
    user: UniformInt,
    user_format: IdFormat,
    dt: UniformDate,
    tenant: WeightedCategorical,
    country: WeightedCategorical,
}

impl TenantActivityGenerator {
    pub fn new(config: &TenantActivityConfig) -> Result<Self, SamplerError> {
        Ok(Self {
            user: UniformInt::new(&config.user_id)?,
            user_format: config.user_id_format.clone(),
            dt: UniformDate::new(&config.dt)?,
            tenant: WeightedCategorical::new(&config.tenant)?,
            country: WeightedCategorical::new(&config.country)?,
        })
    }
}

impl RecordGenerator for TenantActivityGenerator {
    type Record = TenantActivityRecord;

    fn generate(
        &self,
        row_index: u64,
        rng: &mut dyn RngCore,
    ) -> Result<TenantActivityRecord, SamplerError> {
        let user = self.user.sample(rng)?;
        let user = u64::try_from(user).map_err(|_| SamplerError::OutOfRange {
            sampler: "user_id",
            message: format!("negative user number {user}"),
        })?;
        let dt = self.dt.sample(rng)?;
        let tenant = self.tenant.sample(rng)?;
        let country = self.country.sample(rng)?;

        Ok(TenantActivityRecord {
            row_index,
            user_id: self.user_format.render(user),
            dt,
            tenant: self.tenant.label(tenant).to_string(),
            country: self.country.label(country).to_string(),
        })
    }
}
