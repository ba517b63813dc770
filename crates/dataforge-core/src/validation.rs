use std::collections::HashSet;

use crate::config::{GenerationConfig, KeyTransform, PartitionKey};
use crate::error::{ConfigError, Result};
use crate::schema::{FieldDef, FieldType, field_index};

/// Validate a configuration before any work starts.
pub fn validate_config(config: &GenerationConfig) -> Result<()> {
    if config.total_rows == 0 {
        return Err(ConfigError::InvalidRowCount(
            "total_rows must be greater than zero".to_string(),
        ));
    }
    if config.workers == Some(0) {
        return Err(ConfigError::InvalidParallelism(
            "workers must be greater than zero".to_string(),
        ));
    }
    if config.output.write_workers == Some(0) {
        return Err(ConfigError::InvalidParallelism(
            "output.write_workers must be greater than zero".to_string(),
        ));
    }
    if config.max_batch_rows == Some(0) {
        return Err(ConfigError::InvalidParallelism(
            "max_batch_rows must be greater than zero".to_string(),
        ));
    }
    if config.deadlines.batch_timeout_secs == Some(0)
        || config.deadlines.write_timeout_secs == Some(0)
    {
        return Err(ConfigError::InvalidParallelism(
            "deadlines must be at least one second".to_string(),
        ));
    }

    config.dataset.validate()?;

    let fields = config.dataset.fields();
    validate_partition_keys(fields, &config.partition_keys())?;
    validate_sort_field(fields, config.sort_field())?;

    if config.output.root.as_os_str().is_empty() {
        return Err(ConfigError::InvalidOutput(
            "output.root must not be empty".to_string(),
        ));
    }
    if config.output.file_prefix.is_empty()
        || config
            .output
            .file_prefix
            .contains(|c: char| c == '/' || c == '\\' || c == '=')
    {
        return Err(ConfigError::InvalidOutput(format!(
            "output.file_prefix '{}' must be non-empty and contain no '/', '\\' or '='",
            config.output.file_prefix
        )));
    }
    if config.output.row_group_size == 0 {
        return Err(ConfigError::InvalidOutput(
            "output.row_group_size must be greater than zero".to_string(),
        ));
    }

    let tolerance = config.verify.tolerance;
    if !(tolerance > 0.0 && tolerance < 1.0) {
        return Err(ConfigError::parameter(
            "verify.tolerance",
            "must be within (0, 1)",
        ));
    }

    Ok(())
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<()> {
        validate_config(self)
    }
}

fn validate_partition_keys(fields: &[FieldDef], keys: &[PartitionKey]) -> Result<()> {
    if keys.is_empty() {
        return Err(ConfigError::InvalidOutput(
            "at least one partition key is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for key in keys {
        // Readers skip `_`- and `.`-prefixed directories as hidden.
        if key.name.is_empty()
            || key.name.starts_with(['_', '.'])
            || key.name.contains(['/', '=', '\\'])
        {
            return Err(ConfigError::InvalidOutput(format!(
                "partition key name '{}' is not a valid directory key",
                key.name
            )));
        }
        if !names.insert(key.name.as_str()) {
            return Err(ConfigError::InvalidOutput(format!(
                "partition key '{}' is declared twice",
                key.name
            )));
        }

        let index = field_index(fields, &key.field).ok_or_else(|| ConfigError::UnknownField {
            context: "partition_by",
            field: key.field.clone(),
        })?;
        let field_type = fields[index].field_type;

        let compatible = match key.transform {
            KeyTransform::Identity => matches!(
                field_type,
                FieldType::Text | FieldType::Date | FieldType::Int64 | FieldType::UInt64
            ),
            KeyTransform::Year | KeyTransform::Month | KeyTransform::Day => {
                field_type.is_temporal()
            }
            KeyTransform::Hour => field_type == FieldType::Timestamp,
        };
        if !compatible {
            return Err(ConfigError::IncompatibleTransform {
                field: key.field.clone(),
                transform: key.transform.as_str().to_string(),
            });
        }
    }
    Ok(())
}

fn validate_sort_field(fields: &[FieldDef], sort_field: &str) -> Result<()> {
    let index = field_index(fields, sort_field).ok_or_else(|| ConfigError::UnknownField {
        context: "sort_by",
        field: sort_field.to_string(),
    })?;
    if fields[index].field_type == FieldType::Json {
        return Err(ConfigError::parameter(
            "sort_by",
            format!("'{sort_field}' is a JSON payload and cannot be ordered"),
        ));
    }
    Ok(())
}
