mod registry;
mod settings;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use dataforge_core::{ConfigError, DatasetKind, GenerationConfig};
use dataforge_eval::{EvalError, VerificationEngine, VerificationResult, VerifyOptions};
use dataforge_generate::{
    GenerationEngine, GenerationError, GenerationReport, RunStatus, plan_batches,
};
use registry::{RunContext, init_run_logging, start_run};
use settings::{ConfigArgs, SettingsError, render_default_config};
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("generation failed: {0}")]
    GenerationFailed(String),
    #[error("verification failed: {0}")]
    Verification(#[from] EvalError),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} already exists; pass --force to replace it")]
    AlreadyExists(PathBuf),
}

#[derive(Parser, Debug)]
#[command(
    name = "dataforge",
    version,
    about = "Synthetic dataset generator writing Hive-partitioned Parquet",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[command(flatten)]
    generate: GenerateArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a dataset, then verify it (the default).
    Generate(GenerateArgs),
    /// Re-verify an existing output root without regenerating.
    Verify(VerifyArgs),
    /// Print the batch descriptors of a configuration.
    Plan(PlanArgs),
    /// Print the JSON Schema of the configuration file.
    Schema,
    /// Print the default configuration as TOML.
    Init(InitArgs),
}

#[derive(Args, Debug, Clone, Default)]
struct GenerateArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Skip the read-back verification.
    #[arg(long, env = "DATAFORGE_NO_VERIFY")]
    no_verify: bool,
    /// Report integrity violations without failing the run.
    #[arg(long)]
    lenient: bool,
    /// Directory for run artifacts (defaults to `<output>/_runs`).
    #[arg(long, env = "DATAFORGE_RUNS_DIR", value_name = "DIR")]
    runs_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Expected row count (defaults to the configured total).
    #[arg(long)]
    expected_rows: Option<u64>,
    /// Report integrity violations without failing.
    #[arg(long)]
    lenient: bool,
    /// Where verification.json and report.md go (defaults to the run directory).
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,
    /// Directory for run artifacts (defaults to `<output>/_runs`).
    #[arg(long, env = "DATAFORGE_RUNS_DIR", value_name = "DIR")]
    runs_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PlanArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args, Debug)]
struct InitArgs {
    /// Dataset profile of the rendered config.
    #[arg(long, default_value = "events")]
    dataset: DatasetKind,
    /// Write to this file instead of stdout.
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
    /// Replace an existing file.
    #[arg(long)]
    force: bool,
}

/// Exit code of a run that finished with failed partitions.
const DEGRADED_EXIT: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match cli.command {
        None => run_generate(cli.generate),
        Some(Command::Generate(args)) => run_generate(args),
        Some(Command::Verify(args)) => run_verify(args),
        Some(Command::Plan(args)) => run_plan(args),
        Some(Command::Schema) => run_schema(),
        Some(Command::Init(args)) => run_init(args),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_generate(args: GenerateArgs) -> Result<ExitCode, CliError> {
    let config = args.config.resolve()?;
    let engine = GenerationEngine::new(config.clone())?;

    let run_ctx = RunContext::new("generate", config.clone(), args.runs_dir);
    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    let run_id = run_ctx.run_id.as_str();
    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        dataset = %config.dataset.kind(),
        total_rows = config.total_rows,
        run_dir = %run_paths.run_root.display(),
        config = %run_paths.config_path.display()
    );
    let timer = Instant::now();

    let report = match engine.run(&run_paths.run_root, run_id) {
        Ok(result) => result.report,
        Err(GenerationError::Failed(report)) => {
            print_generation_summary(&report, &run_paths.run_root);
            let cause = report.error.clone().unwrap_or_else(|| "worker panicked".to_string());
            tracing::error!(event = "run_finished", status = "failed", error = %cause);
            return Err(CliError::GenerationFailed(cause));
        }
        Err(err) => {
            tracing::error!(event = "run_finished", status = "aborted", error = %err);
            return Err(err.into());
        }
    };

    print_generation_summary(&report, &run_paths.run_root);

    if report.status != RunStatus::Succeeded {
        tracing::warn!(
            event = "run_finished",
            status = report.status.as_str(),
            failed_partitions = report.failed_partitions.len(),
            duration_ms = timer.elapsed().as_millis() as u64
        );
        return Ok(ExitCode::from(DEGRADED_EXIT));
    }

    if config.verify.enabled && !args.no_verify {
        let options = VerifyOptions {
            strict: !args.lenient,
            out_dir: Some(run_paths.run_root.clone()),
            ..VerifyOptions::from_config(&config.verify)
        };
        let result = verify(&config, config.total_rows, options)?;
        print_verification_summary(&result);
    } else {
        tracing::info!(event = "verification_skipped");
    }

    tracing::info!(
        event = "run_finished",
        status = "success",
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(ExitCode::SUCCESS)
}

fn run_verify(args: VerifyArgs) -> Result<ExitCode, CliError> {
    let config = args.config.resolve()?;
    config.validate()?;
    let expected_rows = args.expected_rows.unwrap_or(config.total_rows);

    let run_ctx = RunContext::new("verify", config.clone(), args.runs_dir);
    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;
    tracing::info!(
        event = "run_started",
        run_id = %run_ctx.run_id,
        root = %config.output.root.display(),
        expected_rows = expected_rows
    );
    let timer = Instant::now();

    let options = VerifyOptions {
        strict: !args.lenient,
        out_dir: Some(args.out.unwrap_or_else(|| run_paths.run_root.clone())),
        ..VerifyOptions::from_config(&config.verify)
    };
    let result = verify(&config, expected_rows, options)?;
    print_verification_summary(&result);

    tracing::info!(
        event = "run_finished",
        status = "success",
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(ExitCode::SUCCESS)
}

fn verify(
    config: &GenerationConfig,
    expected_rows: u64,
    options: VerifyOptions,
) -> Result<VerificationResult, CliError> {
    tracing::info!(event = "verification_started", strict = options.strict);
    match VerificationEngine::new(options).run(config, expected_rows) {
        Ok(result) => {
            tracing::info!(
                event = "verification_finished",
                rows = result.metrics.rows_found,
                warnings = result.metrics.warnings.len()
            );
            Ok(result)
        }
        Err(err) => {
            tracing::error!(event = "verification_failed", error = %err);
            Err(err.into())
        }
    }
}

fn run_plan(args: PlanArgs) -> Result<ExitCode, CliError> {
    let config = args.config.resolve()?;
    config.validate()?;
    let batches = plan_batches(
        config.total_rows,
        config.worker_count(),
        config.max_batch_rows,
        config.seed,
    )?;
    println!("{}", serde_json::to_string_pretty(&batches)?);
    Ok(ExitCode::SUCCESS)
}

fn run_schema() -> Result<ExitCode, CliError> {
    let schema = schemars::schema_for!(GenerationConfig);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(ExitCode::SUCCESS)
}

fn run_init(args: InitArgs) -> Result<ExitCode, CliError> {
    let rendered = render_default_config(args.dataset)?;
    match args.out {
        Some(path) => {
            if path.exists() && !args.force {
                return Err(CliError::AlreadyExists(path));
            }
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&path, rendered)?;
            println!("wrote {}", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn print_generation_summary(report: &GenerationReport, run_dir: &Path) {
    println!("run {} ({})", report.run_id, report.status.as_str());
    println!(
        "  dataset {}: {} of {} rows written in {} files ({} bytes)",
        report.dataset,
        report.rows_written,
        report.total_rows,
        report.artifacts.len(),
        report.bytes_written
    );
    println!(
        "  {} ms total, {:.0} rows/s, {} batches on {} workers",
        report.duration_ms,
        report.rows_per_sec,
        report.batches.len(),
        report.workers
    );
    for failure in &report.failed_partitions {
        println!(
            "  failed partition {} ({} rows): {}",
            failure.partition, failure.rows, failure.error
        );
    }
    if let Some(error) = &report.error {
        println!("  error: {error}");
    }
    println!("  artifacts in {}", run_dir.display());
}

fn print_verification_summary(result: &VerificationResult) {
    let metrics = &result.metrics;
    println!(
        "verified {} rows in {} files across {} partitions ({} warnings)",
        metrics.rows_found,
        metrics.files,
        metrics.partitions.len(),
        metrics.warnings.len()
    );
    if let Some(path) = &result.report_path {
        println!("  report {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_generates_with_defaults() {
        let cli = Cli::try_parse_from(["dataforge"]).expect("parse");
        assert!(cli.command.is_none());
        let config = cli.generate.config.resolve().expect("resolve");
        assert_eq!(config, GenerationConfig::default());
    }

    #[test]
    fn partition_flags_accept_lists() {
        let cli = Cli::try_parse_from([
            "dataforge",
            "generate",
            "--dataset",
            "tenant_activity",
            "--partition-by",
            "dt=dt:month,tenant",
            "--rows",
            "1000",
        ])
        .expect("parse");
        let Some(Command::Generate(args)) = cli.command else {
            panic!("expected generate");
        };
        let config = args.config.resolve().expect("resolve");
        let keys = config.partition_keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].name, "dt");
        assert_eq!(keys[1].field, "tenant");
        assert_eq!(config.total_rows, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_codec_is_rejected() {
        assert!(Cli::try_parse_from(["dataforge", "--codec", "brotli"]).is_err());
    }
}
