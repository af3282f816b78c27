//! Error types for the media organizer

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media organizer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media organizer
///
/// Only some variants abort a run. `Unreadable`, `Geocode`, `Http` and `Json`
/// are caught by the phase that produced them and turned into a log line;
/// the rest propagate out of [`crate::Organizer::run`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {source_path} to {target}: {source}")]
    Copy {
        source_path: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid month value {month:?} for {path}")]
    InvalidMonth { path: PathBuf, month: String },

    #[error("Candidate {path} has no source title")]
    MissingSourceTitle { path: PathBuf },

    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Geocoding failed: {0}")]
    Geocode(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
