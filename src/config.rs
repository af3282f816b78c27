//! Configuration types for the media organizer

use crate::geocode::{DEFAULT_ENDPOINT, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY_SECS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Console verbosity for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Every scanned file, stored property and copy
    Debug,
    /// Phase progress and skipped files
    #[default]
    Info,
    /// Errors only
    Error,
}

impl LogLevel {
    /// The tracing level used as the default filter directive
    pub fn as_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// A named root directory scanned for media files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTree {
    /// Name used as `source_title` and as the fallback folder in the target
    pub name: String,
    /// Root directory of the tree
    pub path: PathBuf,
}

impl SourceTree {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Reverse geocoding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    /// Reverse geocoding endpoint, queried with `latlng=<lat>,<lng>`
    pub endpoint: String,

    /// Optional API key, sent as the `key` query parameter
    pub api_key: Option<String>,

    /// Maximum number of attempts per coordinate pair
    pub retry_count: u32,

    /// Fixed delay between attempts, in seconds
    pub retry_delay_secs: u64,

    /// Per-request timeout, in seconds
    pub timeout_secs: u64,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            timeout_secs: 30,
        }
    }
}

/// Configuration for the media organizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source trees, scanned in this order
    #[serde(default)]
    pub sources: Vec<SourceTree>,

    /// Root of the organized destination tree
    pub target_dir: PathBuf,

    /// Console log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Reverse geocoding settings
    #[serde(default)]
    pub geocode: GeocodeConfig,

    /// Plan every destination without copying anything
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: vec![],
            target_dir: PathBuf::from("organized"),
            log_level: LogLevel::default(),
            geocode: GeocodeConfig::default(),
            dry_run: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Check that the run can start: at least one uniquely named source,
    /// and every source plus the target is a readable directory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::EmptySourceName {
                    path: source.path.clone(),
                });
            }
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::DuplicateSourceName(source.name.clone()));
            }
            check_readable_dir("source", &source.path)?;
        }

        check_readable_dir("target", &self.target_dir)?;

        if self.geocode.retry_count == 0 {
            return Err(ConfigError::Invalid(
                "geocode.retry_count must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        format!(
            r#"# Media Organizer Configuration File
# This file uses TOML format (https://toml.io)

# Root of the organized tree. Must already exist.
target_dir = "/data/Pictures/Organized"

# Console verbosity: "debug", "info" or "error"
log_level = "info"

# Plan every destination without copying anything
dry_run = false

# Source trees, scanned in the order listed. When two files have identical
# content the one with the shorter file name is kept; on a tie the one
# scanned first wins. Files without EXIF dates are mirrored under a folder
# named after their source.
[[sources]]
name = "Phone"
path = "/data/Pictures/Phone"

[[sources]]
name = "Backup"
path = "/mnt/backup/Pictures"

[geocode]
endpoint = "{DEFAULT_ENDPOINT}"
# api_key = "..."
retry_count = {DEFAULT_RETRY_COUNT}
retry_delay_secs = {DEFAULT_RETRY_DELAY_SECS}
timeout_secs = 30
"#
        )
    }
}

fn check_readable_dir(role: &'static str, path: &Path) -> Result<(), ConfigError> {
    if !path.is_dir() {
        return Err(ConfigError::MissingDirectory {
            role,
            path: path.to_path_buf(),
        });
    }
    fs::read_dir(path).map_err(|e| ConfigError::UnreadableDirectory {
        role,
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Errors that can occur when loading or validating configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// No source trees were configured
    NoSources,
    /// A source tree has an empty name
    EmptySourceName { path: PathBuf },
    /// Two source trees share a name
    DuplicateSourceName(String),
    /// A source or target directory does not exist
    MissingDirectory { role: &'static str, path: PathBuf },
    /// A source or target directory cannot be listed
    UnreadableDirectory {
        role: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    /// Any other invalid setting
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
            ConfigError::NoSources => write!(f, "At least one source folder is required"),
            ConfigError::EmptySourceName { path } => {
                write!(f, "Source folder '{}' has an empty name", path.display())
            }
            ConfigError::DuplicateSourceName(name) => {
                write!(f, "Source name '{}' is used more than once", name)
            }
            ConfigError::MissingDirectory { role, path } => {
                write!(f, "The {} folder '{}' does not exist", role, path.display())
            }
            ConfigError::UnreadableDirectory { role, path, source } => {
                write!(f, "Cannot read {} folder '{}': {}", role, path.display(), source)
            }
            ConfigError::Invalid(message) => write!(f, "Invalid configuration: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::UnreadableDirectory { source, .. } => Some(source),
            _ => None,
        }
    }
}
