use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime};
use rand::RngCore;

use dataforge_core::FieldDef;

use crate::errors::SamplerError;

/// Borrowed view of one field of a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Null,
    UInt(u64),
    Int(i64),
    Float(f64),
    Text(&'a str),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
}

impl FieldValue<'_> {
    /// Total order; values of different kinds order by kind.
    pub fn total_cmp(&self, other: &FieldValue<'_>) -> Ordering {
        match (self, other) {
            (FieldValue::UInt(a), FieldValue::UInt(b)) => a.cmp(b),
            (FieldValue::Int(a), FieldValue::Int(b)) => a.cmp(b),
            (FieldValue::Float(a), FieldValue::Float(b)) => a.total_cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => a.cmp(b),
            (FieldValue::Date(a), FieldValue::Date(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::UInt(_) => 1,
            FieldValue::Int(_) => 2,
            FieldValue::Float(_) => 3,
            FieldValue::Text(_) => 4,
            FieldValue::Timestamp(_) => 5,
            FieldValue::Date(_) => 6,
        }
    }
}

/// A fixed-schema record of one dataset.
pub trait DatasetRecord: Send + 'static {
    /// Column layout; `value(i)` returns the field at `fields()[i]`.
    fn fields() -> &'static [FieldDef];

    fn row_index(&self) -> u64;

    /// Field at `column`, or `Null` when the column does not exist.
    fn value(&self, column: usize) -> FieldValue<'_>;
}

/// Builds one record per row index.
///
/// Implementations hold only immutable, pre-validated samplers; all
/// randomness comes from the RNG passed in, so the records of a batch are a
/// pure function of the batch seed and its index range.
pub trait RecordGenerator: Send + Sync + 'static {
    type Record: DatasetRecord;

    fn generate(
        &self,
        row_index: u64,
        rng: &mut dyn RngCore,
    ) -> Result<Self::Record, SamplerError>;
}
