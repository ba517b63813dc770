use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use dataforge_core::{CONFIG_VERSION, GenerationConfig};

use super::{RegistryError, RegistryResult};

/// Registry directory under an output root. The underscore keeps it out of
/// `key=value` globs.
pub const RUNS_DIR_NAME: &str = "_runs";

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub command: &'static str,
    pub runs_dir: PathBuf,
    pub config: GenerationConfig,
}

impl RunContext {
    /// `runs_dir` defaults to `<output_root>/_runs`.
    pub fn new(command: &'static str, config: GenerationConfig, runs_dir: Option<PathBuf>) -> Self {
        let runs_dir = runs_dir.unwrap_or_else(|| config.output.root.join(RUNS_DIR_NAME));
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            command,
            runs_dir,
            config,
        }
    }
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
struct RunConfig<'a> {
    run_id: &'a str,
    started_at: String,
    command: &'a str,
    config_version: &'a str,
    generator_version: &'a str,
    config: &'a GenerationConfig,
    git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
struct GitInfo {
    commit: Option<String>,
    dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub run_root: PathBuf,
    pub config_path: PathBuf,
    pub logs_path: PathBuf,
}

pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let run_root = ctx
        .runs_dir
        .join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&run_root)?;

    let config_path = run_root.join("config.json");
    let logs_path = run_root.join("logs.ndjson");

    let config = RunConfig {
        run_id: &ctx.run_id,
        started_at: ctx.started_at.to_rfc3339(),
        command: ctx.command,
        config_version: CONFIG_VERSION,
        generator_version: env!("CARGO_PKG_VERSION"),
        config: &ctx.config,
        git: collect_git_info(),
    };

    write_json(&config_path, &config)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&logs_path)?;

    Ok(RunPaths {
        run_root,
        config_path,
        logs_path,
    })
}

fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_directory_holds_config_and_log_files() {
        let runs_dir =
            std::env::temp_dir().join(format!("dataforge_registry_{}", uuid::Uuid::new_v4()));
        let ctx = RunContext::new("generate", GenerationConfig::default(), Some(runs_dir.clone()));

        let paths = start_run(&ctx).expect("start run");

        assert!(paths.run_root.starts_with(&runs_dir));
        let dir_name = paths
            .run_root
            .file_name()
            .and_then(|name| name.to_str())
            .expect("run dir name");
        assert!(dir_name.ends_with(&format!("__run_{}", ctx.run_id)));
        assert!(paths.logs_path.exists());

        let config: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&paths.config_path).expect("read config"))
                .expect("parse config");
        assert_eq!(config["run_id"], ctx.run_id.as_str());
        assert_eq!(config["command"], "generate");
        assert_eq!(config["config"]["total_rows"], 1_000_000);
        assert_eq!(config["config"]["dataset"]["kind"], "events");
    }

    #[test]
    fn runs_dir_defaults_under_output_root() {
        let mut config = GenerationConfig::default();
        config.output.root = PathBuf::from("out/events");
        let ctx = RunContext::new("verify", config, None);
        assert_eq!(ctx.runs_dir, PathBuf::from("out/events").join(RUNS_DIR_NAME));
    }
}
