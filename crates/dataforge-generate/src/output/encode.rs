// Arrow conversion and Parquet encoding of dataset records.

use std::io::Write;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, Date32Builder, Float64Builder, Int64Builder, RecordBatch, StringBuilder,
    TimestampMicrosecondBuilder, UInt64Builder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use chrono::Datelike;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::errors::ParquetError;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::{EnabledStatistics, WriterProperties};

use dataforge_core::{Codec, FieldDef, FieldType};

use crate::record::{DatasetRecord, FieldValue};

/// Days between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub fn compression(codec: Codec) -> Compression {
    match codec {
        Codec::Snappy => Compression::SNAPPY,
        Codec::Zstd => Compression::ZSTD(ZstdLevel::default()),
        Codec::Gzip => Compression::GZIP(GzipLevel::default()),
        Codec::Lz4 => Compression::LZ4_RAW,
        Codec::Uncompressed => Compression::UNCOMPRESSED,
    }
}

/// Writer properties shared by every file of a run.
pub fn writer_properties(
    codec: Codec,
    row_group_size: usize,
    metadata: Vec<(String, String)>,
) -> WriterProperties {
    let key_values = metadata
        .into_iter()
        .map(|(key, value)| KeyValue::new(key, value))
        .collect();

    WriterProperties::builder()
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Page)
        .set_compression(compression(codec))
        .set_data_page_size_limit(256 * 1024)
        .set_write_batch_size(32 * 1024)
        .set_max_row_group_size(row_group_size)
        .set_dictionary_page_size_limit(128 * 1024)
        .set_key_value_metadata(Some(key_values))
        .build()
}

pub fn data_type(field_type: FieldType) -> DataType {
    match field_type {
        FieldType::UInt64 => DataType::UInt64,
        FieldType::Int64 => DataType::Int64,
        FieldType::Float64 => DataType::Float64,
        FieldType::Text | FieldType::Json => DataType::Utf8,
        FieldType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        FieldType::Date => DataType::Date32,
    }
}

/// Arrow schema of the selected columns, in the given order.
pub fn arrow_schema(fields: &[FieldDef], columns: &[usize]) -> SchemaRef {
    Arc::new(Schema::new(
        columns
            .iter()
            .map(|&column| {
                let field = &fields[column];
                Field::new(field.name, data_type(field.field_type), false)
            })
            .collect::<Vec<_>>(),
    ))
}

/// Build one record batch holding the selected columns of `records`.
pub fn records_to_batch<R: DatasetRecord>(
    records: &[R],
    schema: SchemaRef,
    columns: &[usize],
) -> Result<RecordBatch, ArrowError> {
    let fields = R::fields();
    let arrays = columns
        .iter()
        .map(|&column| {
            let field = fields.get(column).ok_or_else(|| {
                ArrowError::SchemaError(format!("column {column} is not part of the layout"))
            })?;
            Ok(build_column(records, column, field.field_type))
        })
        .collect::<Result<Vec<ArrayRef>, ArrowError>>()?;
    RecordBatch::try_new(schema, arrays)
}

fn build_column<R: DatasetRecord>(records: &[R], column: usize, field_type: FieldType) -> ArrayRef {
    let len = records.len();
    match field_type {
        FieldType::UInt64 => {
            let mut builder = UInt64Builder::with_capacity(len);
            for record in records {
                match record.value(column) {
                    FieldValue::UInt(value) => builder.append_value(value),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        FieldType::Int64 => {
            let mut builder = Int64Builder::with_capacity(len);
            for record in records {
                match record.value(column) {
                    FieldValue::Int(value) => builder.append_value(value),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        FieldType::Float64 => {
            let mut builder = Float64Builder::with_capacity(len);
            for record in records {
                match record.value(column) {
                    FieldValue::Float(value) => builder.append_value(value),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        FieldType::Text | FieldType::Json => {
            let mut builder = StringBuilder::with_capacity(len, len * 16);
            for record in records {
                match record.value(column) {
                    FieldValue::Text(value) => builder.append_value(value),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        FieldType::Timestamp => {
            let mut builder = TimestampMicrosecondBuilder::with_capacity(len);
            for record in records {
                match record.value(column) {
                    FieldValue::Timestamp(value) => {
                        builder.append_value(value.and_utc().timestamp_micros())
                    }
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        FieldType::Date => {
            let mut builder = Date32Builder::with_capacity(len);
            for record in records {
                match record.value(column) {
                    FieldValue::Date(value) => {
                        builder.append_value(value.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
                    }
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
    }
}

/// Encode one batch as a complete Parquet file into `writer`.
pub fn write_parquet_into<W>(
    batch: &RecordBatch,
    writer: W,
    props: WriterProperties,
) -> Result<(), ParquetError>
where
    W: Write + Send,
{
    let mut arrow_writer = ArrowWriter::try_new(writer, batch.schema(), Some(props))?;
    arrow_writer.write(batch)?;
    arrow_writer.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::EventRecord;
    use arrow::array::{Array, Float64Array, TimestampMicrosecondArray};
    use chrono::NaiveDate;
    use dataforge_core::schema::EVENTS_FIELDS;

    fn records() -> Vec<EventRecord> {
        (0..3)
            .map(|i| EventRecord {
                row_index: i,
                user_id: format!("u_{:04}", i + 1),
                event_at: NaiveDate::from_ymd_opt(1970, 1, 2)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .unwrap(),
                event_type: "purchase".to_string(),
                revenue: 10.5,
            })
            .collect()
    }

    #[test]
    fn batch_matches_layout() {
        let columns: Vec<usize> = (0..EVENTS_FIELDS.len()).collect();
        let schema = arrow_schema(EVENTS_FIELDS, &columns);
        let batch = records_to_batch(&records(), schema, &columns).unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 5);

        let event_at = batch
            .column(2)
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        assert_eq!(event_at.value(0), 86_400_000_000);
        let revenue = batch
            .column(4)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(revenue.null_count(), 0);
        assert_eq!(revenue.value(2), 10.5);
    }

    #[test]
    fn projection_drops_columns() {
        let columns = vec![0, 1, 4];
        let schema = arrow_schema(EVENTS_FIELDS, &columns);
        let batch = records_to_batch(&records(), schema, &columns).unwrap();
        assert_eq!(batch.schema().field(2).name(), "revenue");
    }

    #[test]
    fn encoded_file_starts_with_magic() {
        let columns: Vec<usize> = (0..EVENTS_FIELDS.len()).collect();
        let schema = arrow_schema(EVENTS_FIELDS, &columns);
        let batch = records_to_batch(&records(), schema, &columns).unwrap();
        let mut buffer = Vec::new();
        let props = writer_properties(Codec::Zstd, 1024, vec![("k".into(), "v".into())]);
        write_parquet_into(&batch, &mut buffer, props).unwrap();
        assert_eq!(&buffer[0..4], b"PAR1");
    }
}
