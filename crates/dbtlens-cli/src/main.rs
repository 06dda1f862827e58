//! dbtlens CLI - live diagnostics for templated SQL models

use dbtlens_cli::check::check_models;
use dbtlens_cli::cli::{Args, Command, OutputFormat};
use dbtlens_cli::config::load_config;
use dbtlens_cli::input::{read_model, read_models};
use dbtlens_cli::logging::init_logging;
use dbtlens_cli::metadata::connect_schema_source;
use dbtlens_cli::output::{format_json, format_table};
use dbtlens_cli::schema::schema_json;
use dbtlens_cli::server;

use anyhow::{Context, Result};
use clap::Parser;
use dbtlens_core::{model_name, template_sql, EngineConfig};
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

/// Diagnostics found, or a model failed to compile.
const EXIT_FAILURE: u8 = 1;
/// Configuration error (unreadable config, schema source, or input).
const EXIT_CONFIG_ERROR: u8 = 66;

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("dbtlens: error: {e:#}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    debug!(?config, "loaded configuration");

    let result = match args.command {
        Command::Serve => block_on(async { run_serve(config).await.map(|()| true) }),
        Command::Check {
            files,
            format,
            compact,
            quiet,
        } => block_on(run_check(files, config, format, compact, quiet)),
        Command::Compile { file } => run_compile(&file, &config),
        Command::Schema { target } => {
            println!("{}", schema_json(target));
            Ok(true)
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILURE),
        Err(e) => {
            eprintln!("dbtlens: error: {e:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn block_on<F: Future<Output = Result<bool>>>(future: F) -> Result<bool> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;
    runtime.block_on(future)
}

async fn run_serve(config: EngineConfig) -> Result<()> {
    let schema = connect_schema_source(&config.schema).await?;
    server::run_stdio(config, schema).await
}

/// Returns `Ok(true)` when every model came back clean.
async fn run_check(
    files: Vec<PathBuf>,
    config: EngineConfig,
    format: OutputFormat,
    compact: bool,
    quiet: bool,
) -> Result<bool> {
    let models = read_models(&files)?;
    let schema = connect_schema_source(&config.schema).await?;
    let reports = check_models(&models, config, schema).await?;

    let output = match format {
        OutputFormat::Table => format_table(&reports, quiet, true),
        OutputFormat::Json => format_json(&reports, compact),
    };
    write_output(&output)?;

    Ok(reports.iter().all(|report| !report.has_errors()))
}

fn run_compile(file: &Path, config: &EngineConfig) -> Result<bool> {
    let model = read_model(file)?;
    match template_sql(&model.content, &config.template, model_name(&model.uri)) {
        Ok(sql) => {
            write_output(&sql)?;
            Ok(true)
        }
        Err(e) => {
            eprintln!("dbtlens: {}: {e}", model.name);
            Ok(false)
        }
    }
}

fn write_output(output: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(output.as_bytes())
        .context("Failed to write output")?;
    if !output.ends_with('\n') {
        writeln!(stdout).context("Failed to write output")?;
    }
    Ok(())
}
