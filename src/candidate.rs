//! A media file that is still on its way to the target tree

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Property keys written by the scan and EXIF passes
pub mod keys {
    pub const SOURCE_TITLE: &str = "source_title";
    pub const YEAR: &str = "year";
    pub const MONTH: &str = "month";
    pub const DAY: &str = "day";
    pub const TIME: &str = "time";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
}

/// One surviving media file and everything learned about it so far
///
/// Paths and name parts are fixed at creation. Properties only grow:
/// [`Candidate::set_property`] refuses to replace a value that is already
/// present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    source_path: PathBuf,
    relative_path: PathBuf,
    base_name: String,
    extension: String,
    properties: HashMap<String, String>,
}

impl Candidate {
    /// Create a candidate for `source_path`, found while walking `source_root`
    pub fn new(source_root: &Path, source_path: &Path) -> Self {
        let file_name = file_name_of(source_path);
        let (base_name, extension) = match file_name.rfind('.') {
            Some(dot) => (
                file_name[..dot].to_string(),
                file_name[dot + 1..].to_string(),
            ),
            None => (file_name, String::new()),
        };

        let relative_path = source_path
            .strip_prefix(source_root)
            .ok()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Self {
            source_path: source_path.to_path_buf(),
            relative_path,
            base_name,
            extension,
            properties: HashMap::new(),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Parent directory relative to the source root; empty at the root
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Text after the last `.`, in its original case; empty if there is no dot
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Full file name as found on disk
    pub fn file_name(&self) -> String {
        file_name_of(&self.source_path)
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Store a property unless the key is already set
    ///
    /// Returns `true` when the value was stored.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.properties.contains_key(&key) {
            return false;
        }
        let value = value.into();
        debug!(path = ?self.source_path, %key, %value, "Storing property");
        self.properties.insert(key, value);
        true
    }
}

/// File name of `path` as a string, lossily converted
pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
