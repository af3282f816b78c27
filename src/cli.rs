//! CLI argument parsing with clap

use crate::config::{Config, LogLevel, SourceTree};
use clap::Parser;
use std::path::PathBuf;

/// Media Organizer - deduplicate photos and videos and sort them by date and place
///
/// Scans one or more named source folders for .jpg, .mp4 and .mov files,
/// skips anything whose content already exists in the target folder, and
/// copies the rest into `<year>/<month>/<day> - <place>/` folders using
/// EXIF capture time and reverse-geocoded GPS positions.
#[derive(Parser, Debug)]
#[command(name = "media-organizer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// When specified, settings from the config file are used as defaults.
    /// CLI arguments will override config file settings.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Source folder as NAME=PATH; repeat for several, scanned in the given order
    #[arg(short, long = "source", value_name = "NAME=PATH", value_parser = parse_source_tree)]
    pub sources: Vec<SourceTree>,

    /// Target folder where files are copied (must exist)
    #[arg(short, long)]
    pub target: Option<PathBuf>,

    /// Console verbosity
    #[arg(short, long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Maximum reverse geocoding attempts per file
    #[arg(long)]
    pub geocode_retries: Option<u32>,

    /// Seconds to wait between reverse geocoding attempts
    #[arg(long)]
    pub geocode_delay: Option<u64>,

    /// Reverse geocoding endpoint
    #[arg(long)]
    pub geocode_endpoint: Option<String>,

    /// API key for the reverse geocoding service
    #[arg(long, env = "GEOCODE_API_KEY", hide_env_values = true)]
    pub geocode_key: Option<String>,

    /// Dry run mode - show where files would go without copying them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Also write a plain-text log file into this folder
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Output console log as JSON
    #[arg(long)]
    pub json_log: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    pub sample_config: bool,
}

/// Parse a `NAME=PATH` source argument
fn parse_source_tree(value: &str) -> Result<SourceTree, String> {
    let (name, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got '{value}'"))?;
    let (name, path) = (name.trim(), path.trim());
    if name.is_empty() {
        return Err("source name must not be empty".to_string());
    }
    if path.is_empty() {
        return Err(format!("source '{name}' has an empty path"));
    }
    Ok(SourceTree::new(name, path))
}

impl Cli {
    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if !self.sources.is_empty() {
            config.sources = self.sources.clone();
        }
        if let Some(ref target) = self.target {
            config.target_dir = target.clone();
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        if let Some(retries) = self.geocode_retries {
            config.geocode.retry_count = retries;
        }
        if let Some(delay) = self.geocode_delay {
            config.geocode.retry_delay_secs = delay;
        }
        if let Some(ref endpoint) = self.geocode_endpoint {
            config.geocode.endpoint = endpoint.clone();
        }
        if let Some(ref key) = self.geocode_key {
            config.geocode.api_key = Some(key.clone());
        }
        if self.dry_run {
            config.dry_run = true;
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}
