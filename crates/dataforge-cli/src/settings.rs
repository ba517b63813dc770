use std::path::{Path, PathBuf};

use clap::Args;
use thiserror::Error;

use dataforge_core::{
    Codec, DatasetConfig, DatasetKind, GenerationConfig, OutputConfig, PartitionKey, PartitionMode,
};

/// Errors raised while loading or rendering a configuration file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("toml serialization error: {0}")]
    Render(#[from] toml::ser::Error),
}

pub type SettingsResult<T> = std::result::Result<T, SettingsError>;

/// Configuration inputs shared by every subcommand that needs a
/// `GenerationConfig`. Flags win over environment variables, which win over
/// the TOML file, which wins over the built-in defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// TOML configuration file.
    #[arg(long, env = "DATAFORGE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Dataset profile: users, events, structured_events, leaderboard, tenant_activity.
    #[arg(long, env = "DATAFORGE_DATASET")]
    pub dataset: Option<DatasetKind>,
    /// Total number of records.
    #[arg(long, env = "DATAFORGE_ROWS")]
    pub rows: Option<u64>,
    /// Run seed.
    #[arg(long, env = "DATAFORGE_SEED")]
    pub seed: Option<u64>,
    /// Generation workers (defaults to available parallelism).
    #[arg(long, env = "DATAFORGE_WORKERS")]
    pub workers: Option<usize>,
    /// Writer pool size (defaults to the worker count).
    #[arg(long, env = "DATAFORGE_WRITE_WORKERS")]
    pub write_workers: Option<usize>,
    /// Upper bound on rows per batch.
    #[arg(long, env = "DATAFORGE_MAX_BATCH_ROWS")]
    pub max_batch_rows: Option<u64>,
    /// Partitioning mode: global or streaming.
    #[arg(long, env = "DATAFORGE_MODE")]
    pub mode: Option<PartitionMode>,
    /// Output root directory.
    #[arg(long, env = "DATAFORGE_OUTPUT", value_name = "DIR")]
    pub output: Option<PathBuf>,
    /// Parquet codec: snappy, zstd, gzip, lz4, uncompressed.
    #[arg(long, env = "DATAFORGE_CODEC")]
    pub codec: Option<Codec>,
    /// Field the records of each partition are sorted by.
    #[arg(long, env = "DATAFORGE_SORT_BY", value_name = "FIELD")]
    pub sort_by: Option<String>,
    /// Partition key, repeatable or comma separated.
    #[arg(
        long,
        env = "DATAFORGE_PARTITION_BY",
        value_name = "NAME=FIELD[:TRANSFORM]",
        value_delimiter = ','
    )]
    pub partition_by: Vec<PartitionKey>,
    /// Replace existing Parquet output under the output root.
    #[arg(long, env = "DATAFORGE_OVERWRITE")]
    pub overwrite: bool,
    /// Drop columns that are fully encoded in the partition path.
    #[arg(long, env = "DATAFORGE_OMIT_PARTITION_COLUMNS")]
    pub omit_partition_columns: bool,
    /// Rows per Parquet row group.
    #[arg(long, env = "DATAFORGE_ROW_GROUP_SIZE")]
    pub row_group_size: Option<usize>,
    /// Per-batch deadline in seconds.
    #[arg(long, env = "DATAFORGE_BATCH_TIMEOUT_SECS")]
    pub batch_timeout_secs: Option<u64>,
    /// Per-partition write deadline in seconds.
    #[arg(long, env = "DATAFORGE_WRITE_TIMEOUT_SECS")]
    pub write_timeout_secs: Option<u64>,
}

impl ConfigArgs {
    /// Defaults, then the config file, then these arguments.
    pub fn resolve(&self) -> SettingsResult<GenerationConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => GenerationConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut GenerationConfig) {
        if let Some(kind) = self.dataset {
            if kind != config.dataset.kind() {
                config.dataset = DatasetConfig::default_for(kind);
                if self.output.is_none() && config.output.root == OutputConfig::default().root {
                    config.output.root = default_root_for(kind);
                }
            }
        }
        if let Some(rows) = self.rows {
            config.total_rows = rows;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        if self.write_workers.is_some() {
            config.output.write_workers = self.write_workers;
        }
        if self.max_batch_rows.is_some() {
            config.max_batch_rows = self.max_batch_rows;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(output) = &self.output {
            config.output.root = output.clone();
        }
        if let Some(codec) = self.codec {
            config.output.codec = codec;
        }
        if let Some(sort_by) = &self.sort_by {
            config.sort_by = Some(sort_by.clone());
        }
        if !self.partition_by.is_empty() {
            config.partition_by = Some(self.partition_by.clone());
        }
        if self.overwrite {
            config.output.overwrite = true;
        }
        if self.omit_partition_columns {
            config.output.omit_partition_columns = true;
        }
        if let Some(row_group_size) = self.row_group_size {
            config.output.row_group_size = row_group_size;
        }
        if self.batch_timeout_secs.is_some() {
            config.deadlines.batch_timeout_secs = self.batch_timeout_secs;
        }
        if self.write_timeout_secs.is_some() {
            config.deadlines.write_timeout_secs = self.write_timeout_secs;
        }
    }
}

pub fn load_config(path: &Path) -> SettingsResult<GenerationConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Default configuration of `kind`, rendered as TOML.
pub fn render_default_config(kind: DatasetKind) -> SettingsResult<String> {
    let mut config = GenerationConfig {
        dataset: DatasetConfig::default_for(kind),
        ..GenerationConfig::default()
    };
    if kind != DatasetKind::Events {
        config.output.root = default_root_for(kind);
    }
    Ok(toml::to_string_pretty(&config)?)
}

fn default_root_for(kind: DatasetKind) -> PathBuf {
    PathBuf::from("data").join(kind.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataforge_core::KeyTransform;

    fn temp_file(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dataforge_settings_{label}_{}.toml", uuid::Uuid::new_v4()))
    }

    #[test]
    fn flags_override_the_config_file() {
        let path = temp_file("layering");
        std::fs::write(
            &path,
            "total_rows = 5000\nseed = 7\nmode = \"streaming\"\n\n[output]\nroot = \"file/root\"\ncodec = \"zstd\"\n",
        )
        .expect("write config");

        let args = ConfigArgs {
            config: Some(path),
            rows: Some(900),
            codec: Some(Codec::Gzip),
            partition_by: vec![PartitionKey::new("month", "event_at", KeyTransform::Month)],
            ..ConfigArgs::default()
        };
        let config = args.resolve().expect("resolve");

        assert_eq!(config.total_rows, 900);
        assert_eq!(config.seed, 7);
        assert_eq!(config.mode, PartitionMode::Streaming);
        assert_eq!(config.output.root, PathBuf::from("file/root"));
        assert_eq!(config.output.codec, Codec::Gzip);
        assert_eq!(config.partition_keys()[0].name, "month");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn switching_dataset_resets_its_parameters() {
        let args = ConfigArgs {
            dataset: Some(DatasetKind::TenantActivity),
            ..ConfigArgs::default()
        };
        let config = args.resolve().expect("resolve");
        assert_eq!(config.dataset.kind(), DatasetKind::TenantActivity);
        assert_eq!(config.output.root, PathBuf::from("data/tenant_activity"));
        let names: Vec<String> = config.partition_keys().into_iter().map(|key| key.name).collect();
        assert_eq!(names, vec!["dt".to_string(), "tenant".to_string()]);
    }

    #[test]
    fn file_dataset_parameters_survive_a_matching_flag() {
        let path = temp_file("dataset");
        std::fs::write(
            &path,
            "[dataset]\nkind = \"leaderboard\"\n\n[output]\nroot = \"boards\"\n",
        )
        .expect("write config");

        let args = ConfigArgs {
            config: Some(path),
            dataset: Some(DatasetKind::Leaderboard),
            ..ConfigArgs::default()
        };
        let config = args.resolve().expect("resolve");
        assert_eq!(config.dataset.kind(), DatasetKind::Leaderboard);
        assert_eq!(config.output.root, PathBuf::from("boards"));
    }

    #[test]
    fn rendered_defaults_load_back() {
        for kind in [
            DatasetKind::Users,
            DatasetKind::Events,
            DatasetKind::StructuredEvents,
            DatasetKind::Leaderboard,
            DatasetKind::TenantActivity,
        ] {
            let rendered = render_default_config(kind).expect("render");
            let parsed: GenerationConfig = toml::from_str(&rendered).expect("parse rendered");
            assert_eq!(parsed.dataset.kind(), kind);
            assert!(parsed.validate().is_ok(), "{kind} defaults are valid");
        }
    }

    #[test]
    fn malformed_file_names_its_path() {
        let path = temp_file("broken");
        std::fs::write(&path, "total_rows = \"many\"\n").expect("write config");
        let err = load_config(&path).expect_err("parse failure");
        assert!(err.to_string().contains(&path.display().to_string()));
    }
}
