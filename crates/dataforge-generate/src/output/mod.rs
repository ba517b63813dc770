//! Partition writer: Parquet files in a Hive-style directory layout.

pub mod atomic;
pub mod encode;
pub mod layout;

use std::path::{Path, PathBuf};

use arrow::datatypes::SchemaRef;
use parquet::file::properties::WriterProperties;

use dataforge_core::{FieldDef, OutputArtifact, OutputConfig, PartitionValue};

use crate::errors::{GenerationError, WriteError};
use crate::record::DatasetRecord;

pub use layout::{list_parquet_files, partition_segments, unique_file_name};

/// Writes one file per partition under a fixed output root.
#[derive(Debug, Clone)]
pub struct PartitionWriter {
    root: PathBuf,
    file_prefix: String,
    columns: Vec<usize>,
    schema: SchemaRef,
    props: WriterProperties,
}

impl PartitionWriter {
    /// `omitted` lists columns left out of the files because the partition
    /// path already carries them.
    pub fn new(
        output: &OutputConfig,
        fields: &[FieldDef],
        omitted: &[usize],
        metadata: Vec<(String, String)>,
    ) -> Self {
        let columns: Vec<usize> = (0..fields.len())
            .filter(|column| !omitted.contains(column))
            .collect();
        let schema = encode::arrow_schema(fields, &columns);
        let props = encode::writer_properties(output.codec, output.row_group_size, metadata);

        Self {
            root: output.root.clone(),
            file_prefix: output.file_prefix.clone(),
            columns,
            schema,
            props,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write<R: DatasetRecord>(
        &self,
        partition: &PartitionValue,
        records: &[R],
    ) -> Result<OutputArtifact, WriteError> {
        let batch = encode::records_to_batch(records, self.schema.clone(), &self.columns)?;
        let dir = layout::partition_dir(&self.root, partition);
        let file_name = unique_file_name(&self.file_prefix);

        let (path, byte_size) = atomic::publish(&dir, &file_name, |writer| {
            encode::write_parquet_into(&batch, writer, self.props.clone())?;
            Ok(())
        })?;

        Ok(OutputArtifact {
            path,
            partition_key: partition.clone(),
            row_count: records.len() as u64,
            byte_size,
        })
    }
}

/// Make `output.root` ready for a new run.
///
/// An existing root holding Parquet files is an error unless
/// `output.overwrite` is set, in which case its partition directories and
/// top-level Parquet files are removed. Entries starting with `_` or `.`
/// are left alone.
pub fn prepare_output_root(output: &OutputConfig) -> Result<(), GenerationError> {
    let root = &output.root;
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        return Ok(());
    }
    if list_parquet_files(root)?.is_empty() {
        return Ok(());
    }
    if !output.overwrite {
        return Err(GenerationError::OutputNotEmpty(root.clone()));
    }

    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if layout::is_hidden(&name) {
            continue;
        }
        let file_type = entry.file_type()?;
        if file_type.is_dir() && name.contains('=') {
            std::fs::remove_dir_all(entry.path())?;
        } else if file_type.is_file() && name.ends_with(".parquet") {
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
