//! Media Organizer - copy photos and videos into a date and place sorted tree
//!
//! Every file is copied at most once: identical content across sources is
//! collapsed, and content already present in the target is skipped.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use media_organizer::{Cli, Config, Organizer, RunSummary};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.sample_config {
        print!("{}", Config::sample_config());
        return Ok(());
    }

    let config = load_config(&cli)?;

    let log_path = cli.log_dir.as_deref().map(log_file_path);
    let _guard = setup_logging(&config, cli.json_log, log_path.as_deref())?;

    info!(version = env!("CARGO_PKG_VERSION"), "Media Organizer starting");
    for source in &config.sources {
        debug!(name = %source.name, path = %source.path.display(), "Source folder");
    }
    debug!(path = %config.target_dir.display(), "Target folder");
    if let Some(ref path) = log_path {
        info!(log_file = %path.display(), "Log file location");
    }

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let organizer = Organizer::from_config(config)?;
    let dry_run = organizer.config().dry_run;

    match organizer.run() {
        Ok(summary) => {
            print_summary(&summary, dry_run);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Processing failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Load configuration from file or CLI arguments
fn load_config(cli: &Cli) -> Result<Config> {
    let config = if let Some(ref config_path) = cli.config {
        let file_config = Config::load_from_file(config_path)?;
        cli.merge_with_config(file_config)
    } else {
        if cli.target.is_none() {
            anyhow::bail!("--target is required when no config file is given");
        }
        cli.to_config()
    };

    if config.sources.is_empty() {
        anyhow::bail!("at least one --source NAME=PATH is required");
    }

    Ok(config)
}

/// Timestamped log file name inside `log_dir`
fn log_file_path(log_dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    log_dir.join(format!("media-organizer_{}.log", timestamp))
}

/// Console logging on stderr, plus a plain-text file when `log_path` is set
///
/// `RUST_LOG` overrides the configured level.
fn setup_logging(
    config: &Config,
    json_log: bool,
    log_path: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.log_level.as_tracing_level().into())
        .from_env_lossy();

    let (file_layer, guard) = match log_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            (
                Some(fmt::layer().with_ansi(false).with_writer(non_blocking)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if json_log {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(guard)
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    let separator = "-".repeat(60);
    let copied_label = if dry_run { "Would copy" } else { "Copied" };

    println!("{separator}");
    println!("  {:<20}{}", "Scanned", summary.scanned);
    println!("  {:<20}{}", "Unreadable", summary.unreadable);
    println!("  {:<20}{}", "Duplicates", summary.source_duplicates);
    println!("  {:<20}{}", "Already in target", summary.already_in_target);
    println!("  {:<20}{}", "Dated", summary.dated);
    println!("  {:<20}{}", "Geocoded", summary.geocoded);
    println!("  {:<20}{}", copied_label, summary.copied());

    if dry_run && !summary.copies.is_empty() {
        println!("{separator}");
        for record in &summary.copies {
            println!(
                "  ~ {} -> {}",
                record.source.display(),
                record.destination.display()
            );
        }
        println!("{separator}");
        println!("  Dry run: no files were copied");
    }
}
