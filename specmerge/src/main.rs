use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

use specmerge::batch::{self, BatchOptions};
use specmerge::cli::{Cli, Commands};
use specmerge::config::{AppConfig, ConfigError};
use specmerge::device::{DeviceIdentity, ExistingRecord, RawDeviceSpecs};
use specmerge::image_selector::ImageSelector;
use specmerge::logger::{BatchLogger, VerbosityLevel};
use specmerge::merger::SpecMerger;
use specmerge::result_sink::ResultSink;
use specmerge::upload::{UploadRow, UploadTarget};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = cli.validate() {
        eprintln!("❌ {}", e);
        std::process::exit(2);
    }

    if cli.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run specmerge again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    let app_config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(cli.verbose, app_config.image_selector.debug);

    let selector = ImageSelector::from_config(&app_config).context("Failed to build image selector")?;
    let merger = SpecMerger::new(selector);

    match cli.command {
        Some(Commands::Merge { official, unofficial, existing, brand, model, row }) => {
            let official = read_raw(&official)?;
            let unofficial = read_raw(&unofficial)?;
            let existing = existing.as_deref().map(read_existing).transpose()?;
            let identity = DeviceIdentity { brand, model };

            let merged = merger
                .merge_specs(existing.as_ref(), &official, &unofficial, &identity)
                .await?;

            let json = if row {
                let upload_row = UploadRow::from_merged(
                    &merged,
                    existing.as_ref(),
                    &app_config.upload.default_status,
                    chrono::Utc::now(),
                );
                serde_json::to_string_pretty(&upload_row)?
            } else {
                serde_json::to_string_pretty(&merged)?
            };
            println!("{}", json);
        }
        Some(Commands::Batch { input, output, summary, concurrency, status }) => {
            let jobs = batch::parse_job_file(&input)?;
            let options = BatchOptions {
                concurrency: concurrency.unwrap_or(app_config.batch.concurrency),
                status: status.unwrap_or_else(|| app_config.upload.default_status.clone()),
            };
            let logger = BatchLogger::new(VerbosityLevel::from_verbose_count(cli.verbose));

            let mut sink = output.as_deref().map(ResultSink::with_path).transpose()?;
            let batch_summary = batch::run_batch(
                jobs,
                &merger,
                &options,
                sink.as_mut().map(|s| s as &mut dyn UploadTarget),
                &logger,
            )
            .await;

            if let Some(sink) = sink {
                let path = sink.finish()?;
                logger.record_output_file(&path.display().to_string());
            }
            if let Some(summary_path) = summary {
                batch::export_batch_summary(&batch_summary, &summary_path)?;
                logger.info(&format!("Batch summary written to {}", summary_path.display()));
            }

            logger.print_final_summary(&batch_summary);
        }
        None => {}
    }

    Ok(())
}

/// Install the global subscriber. `-v` counts raise the crate's level;
/// the image selector debug switch raises only that module.
fn init_tracing(verbose: u8, debug_image_selector: bool) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("specmerge={}", level)));
    if debug_image_selector {
        if let Ok(directive) = "specmerge::image_selector=debug".parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Explicit paths must exist. A missing default file prompts on a terminal and
/// otherwise falls back to the embedded template.
fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    if let Some(path) = explicit {
        return AppConfig::load_from_path(path);
    }

    match AppConfig::load() {
        Err(ConfigError::FileNotFound(path)) => match AppConfig::prompt_create_config()? {
            Some(created) => {
                println!("✅ Created default configuration file at: {}", created.display());
                AppConfig::load_from_path(&created)
            }
            None => {
                eprintln!("⚠️  No configuration at {}, using built-in defaults", path.display());
                AppConfig::default_config()
            }
        },
        other => other,
    }
}

fn read_raw(path: &Path) -> Result<RawDeviceSpecs> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let raw = RawDeviceSpecs::from_json_str(&content)
        .with_context(|| format!("Invalid device specs in {}", path.display()))?;
    info!("Loaded {} ({} categories)", path.display(), raw.detail_spec.len());
    Ok(raw)
}

fn read_existing(path: &Path) -> Result<ExistingRecord> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid existing record in {}", path.display()))
}
