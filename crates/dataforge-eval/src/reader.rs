//! Typed access to the columns of generated Parquet files.
//!
//! Columns left out of a file because the partition path carries them are
//! reconstructed from the path as per-file constants.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{
    Array, Date32Array, Float64Array, Int64Array, RecordBatch, StringArray,
    TimestampMicrosecondArray, UInt64Array,
};
use arrow::datatypes::SchemaRef;
use chrono::{NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};

use dataforge_core::{FieldDef, FieldType, KeyTransform, unescape_partition_value};
use dataforge_generate::FieldValue;

use crate::errors::EvalError;

/// Footer key holding the id of the run that wrote a file.
pub const RUN_ID_KEY: &str = "dataforge.run_id";

/// An opened file: footer facts plus a batch reader.
pub struct OpenedFile {
    pub path: PathBuf,
    pub byte_size: u64,
    pub num_rows: u64,
    pub run_id: Option<String>,
    pub schema: SchemaRef,
    pub reader: ParquetRecordBatchReader,
}

pub fn open_parquet(path: &Path) -> Result<OpenedFile, EvalError> {
    let file = File::open(path)?;
    let byte_size = file.metadata()?.len();
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|err| unreadable(path, err.to_string()))?;

    let file_metadata = builder.metadata().file_metadata();
    let num_rows = file_metadata.num_rows().max(0) as u64;
    let run_id = file_metadata.key_value_metadata().and_then(|entries| {
        entries
            .iter()
            .find(|entry| entry.key == RUN_ID_KEY)
            .and_then(|entry| entry.value.clone())
    });
    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .map_err(|err| unreadable(path, err.to_string()))?;

    Ok(OpenedFile {
        path: path.to_path_buf(),
        byte_size,
        num_rows,
        run_id,
        schema,
        reader,
    })
}

pub(crate) fn unreadable(path: &Path, message: String) -> EvalError {
    EvalError::UnreadableFile {
        path: path.to_path_buf(),
        message,
    }
}

/// Value of a column taken from the partition path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathConstant {
    Null,
    UInt(u64),
    Int(i64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl PathConstant {
    /// Parse an escaped identity segment back into a typed value.
    pub fn parse(field: &FieldDef, segment: &str) -> Result<Self, String> {
        let Some(raw) = unescape_partition_value(segment) else {
            return Ok(PathConstant::Null);
        };
        let parsed = match field.field_type {
            FieldType::UInt64 => raw.parse().map(PathConstant::UInt).map_err(|e| e.to_string()),
            FieldType::Int64 => raw.parse().map(PathConstant::Int).map_err(|e| e.to_string()),
            FieldType::Text | FieldType::Json => Ok(PathConstant::Text(raw)),
            FieldType::Date => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map(PathConstant::Date)
                .map_err(|e| e.to_string()),
            FieldType::Timestamp => {
                NaiveDateTime::parse_from_str(&raw, KeyTransform::IDENTITY_TIMESTAMP_FORMAT)
                    .map(PathConstant::Timestamp)
                    .map_err(|e| e.to_string())
            }
            FieldType::Float64 => Err("float columns cannot be path-encoded".to_string()),
        };
        parsed.map_err(|err| format!("segment '{segment}' of '{}': {err}", field.name))
    }

    fn as_field_value(&self) -> FieldValue<'_> {
        match self {
            PathConstant::Null => FieldValue::Null,
            PathConstant::UInt(value) => FieldValue::UInt(*value),
            PathConstant::Int(value) => FieldValue::Int(*value),
            PathConstant::Text(value) => FieldValue::Text(value),
            PathConstant::Date(value) => FieldValue::Date(*value),
            PathConstant::Timestamp(value) => FieldValue::Timestamp(*value),
        }
    }
}

enum TypedColumn<'a> {
    UInt(&'a UInt64Array),
    Int(&'a Int64Array),
    Float(&'a Float64Array),
    Text(&'a StringArray),
    Timestamp(&'a TimestampMicrosecondArray),
    Date(&'a Date32Array),
    Constant(&'a PathConstant),
    Missing,
}

/// A record batch viewed through a dataset's field layout.
pub struct BatchView<'a> {
    columns: Vec<TypedColumn<'a>>,
    num_rows: usize,
}

impl<'a> BatchView<'a> {
    /// `constants[i]` stands in for field `i` when the batch lacks it.
    pub fn new(
        batch: &'a RecordBatch,
        fields: &[FieldDef],
        constants: &'a [Option<PathConstant>],
    ) -> Result<Self, String> {
        let columns = fields
            .iter()
            .enumerate()
            .map(|(index, field)| match batch.column_by_name(field.name) {
                Some(array) => typed_column(array.as_ref(), field),
                None => Ok(match constants.get(index).and_then(Option::as_ref) {
                    Some(constant) => TypedColumn::Constant(constant),
                    None => TypedColumn::Missing,
                }),
            })
            .collect::<Result<Vec<_>, String>>()?;

        Ok(Self {
            columns,
            num_rows: batch.num_rows(),
        })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// True when the column comes from the path rather than the file.
    pub fn is_path_encoded(&self, column: usize) -> bool {
        matches!(self.columns.get(column), Some(TypedColumn::Constant(_)))
    }

    pub fn value(&self, column: usize, row: usize) -> FieldValue<'a> {
        let Some(typed) = self.columns.get(column) else {
            return FieldValue::Null;
        };
        match *typed {
            TypedColumn::UInt(array) if !array.is_null(row) => FieldValue::UInt(array.value(row)),
            TypedColumn::Int(array) if !array.is_null(row) => FieldValue::Int(array.value(row)),
            TypedColumn::Float(array) if !array.is_null(row) => {
                FieldValue::Float(array.value(row))
            }
            TypedColumn::Text(array) if !array.is_null(row) => FieldValue::Text(array.value(row)),
            TypedColumn::Timestamp(array) if !array.is_null(row) => array
                .value_as_datetime(row)
                .map_or(FieldValue::Null, FieldValue::Timestamp),
            TypedColumn::Date(array) if !array.is_null(row) => array
                .value_as_date(row)
                .map_or(FieldValue::Null, FieldValue::Date),
            TypedColumn::Constant(constant) => constant.as_field_value(),
            _ => FieldValue::Null,
        }
    }
}

fn typed_column<'a>(array: &'a dyn Array, field: &FieldDef) -> Result<TypedColumn<'a>, String> {
    let any = array.as_any();
    let typed = match field.field_type {
        FieldType::UInt64 => any.downcast_ref::<UInt64Array>().map(TypedColumn::UInt),
        FieldType::Int64 => any.downcast_ref::<Int64Array>().map(TypedColumn::Int),
        FieldType::Float64 => any.downcast_ref::<Float64Array>().map(TypedColumn::Float),
        FieldType::Text | FieldType::Json => {
            any.downcast_ref::<StringArray>().map(TypedColumn::Text)
        }
        FieldType::Timestamp => any
            .downcast_ref::<TimestampMicrosecondArray>()
            .map(TypedColumn::Timestamp),
        FieldType::Date => any.downcast_ref::<Date32Array>().map(TypedColumn::Date),
    };
    typed.ok_or_else(|| {
        format!(
            "column '{}' has type {} but {:?} was expected",
            field.name,
            array.data_type(),
            field.field_type
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataforge_core::FieldRole;

    const DT: FieldDef = FieldDef::new("dt", FieldType::Date, FieldRole::Time);
    const TENANT: FieldDef = FieldDef::new("tenant", FieldType::Text, FieldRole::Category);

    #[test]
    fn path_constants_parse_by_field_type() {
        assert_eq!(
            PathConstant::parse(&DT, "2026-01-05").unwrap(),
            PathConstant::Date(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())
        );
        assert_eq!(
            PathConstant::parse(&TENANT, "a%2Fb").unwrap(),
            PathConstant::Text("a/b".to_string())
        );
        assert_eq!(
            PathConstant::parse(&TENANT, dataforge_core::DEFAULT_PARTITION_VALUE).unwrap(),
            PathConstant::Null
        );
        assert!(PathConstant::parse(&DT, "not-a-date").is_err());
    }
}
