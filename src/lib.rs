//! Media Organizer - deduplicate and sort photos and videos by date and place
//!
//! This library provides the pieces of a single organizing run:
//! - Recursive scanning of named source trees for `.jpg`, `.mp4` and `.mov` files
//! - SHA-256 content digests for deduplication across sources and against the target
//! - EXIF capture time and GPS extraction for images
//! - Reverse geocoding with a fixed retry policy
//! - Deterministic destination planning with numbered collision suffixes
//! - Copying with permissions and timestamps preserved

pub mod candidate;
pub mod cli;
pub mod config;
pub mod error;
pub mod geocode;
pub mod hash;
pub mod metadata;
pub mod organize;
pub mod planner;
pub mod registry;
pub mod scan;

pub use candidate::Candidate;
pub use cli::Cli;
pub use config::{Config, ConfigError, GeocodeConfig, LogLevel, SourceTree};
pub use error::{Error, Result};
pub use geocode::{GeocodeClient, GeocodeResolver, HttpGeocodeClient, RetryPolicy};
pub use metadata::{ExifExtractor, MetadataExtractor, MetadataRecord};
pub use organize::{CopyRecord, Organizer, RunSummary};
pub use registry::CandidateRegistry;
