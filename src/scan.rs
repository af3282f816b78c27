//! Source and destination tree walks
//!
//! The source walk fills the [`CandidateRegistry`], keeping one file per
//! content digest. The destination walk then removes every candidate whose
//! content is already somewhere under the target root.

use crate::candidate::{Candidate, keys};
use crate::config::SourceTree;
use crate::error::Result;
use crate::hash::hash_file;
use crate::registry::{CandidateRegistry, Offer};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use walkdir::WalkDir;

/// Path suffixes that mark a media file, compared against the lowercased path
const MEDIA_SUFFIXES: &[&str] = &["jpg", "mp4", "mov"];

/// Counters for a single tree walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkReport {
    /// Regular files that passed the media filter
    pub matched: usize,
    /// Matching files skipped because they could not be read
    pub unreadable: usize,
    /// Source walk: files dropped as duplicates.
    /// Destination walk: candidates pruned because the target already has them.
    pub removed: usize,
}

/// Whether `path` looks like a supported media file
///
/// This is a suffix check on the whole lowercased path, so `clipmp4`
/// without a dot matches as well.
pub fn is_media_path(path: &Path) -> bool {
    let lowered = path.to_string_lossy().to_lowercase();
    MEDIA_SUFFIXES.iter().any(|suffix| lowered.ends_with(suffix))
}

/// Walk `root` and yield every regular media file below it
///
/// Symlinks are not followed and are never yielded. Entries are visited in
/// file name order. Traversal errors are yielded as `Err`.
pub fn media_files(root: &Path) -> impl Iterator<Item = Result<PathBuf>> + use<> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() && is_media_path(entry.path()) => {
                Some(Ok(entry.into_path()))
            }
            Ok(_) => None,
            Err(e) => Some(Err(e.into())),
        })
}

/// Add every media file of `tree` to the registry
///
/// Unreadable files are logged and skipped. Traversal errors abort the walk.
/// Skipped files are logged at error level so they show at every verbosity.
pub fn scan_source(registry: &mut CandidateRegistry, tree: &SourceTree) -> Result<WalkReport> {
    let mut report = WalkReport::default();
    info!(source = %tree.name, path = %tree.path.display(), "Scanning source folder");

    for path in media_files(&tree.path) {
        let path = path?;
        report.matched += 1;

        let digest = match hash_file(&path) {
            Ok(digest) => digest,
            Err(e) => {
                error!(path = %path.display(), error = %e, "No access to source file, skipping");
                report.unreadable += 1;
                continue;
            }
        };

        let mut candidate = Candidate::new(&tree.path, &path);
        candidate.set_property(keys::SOURCE_TITLE, tree.name.as_str());
        debug!(path = %path.display(), %digest, "Adding file");

        match registry.offer(digest, candidate) {
            Offer::Inserted => {}
            Offer::Replaced { evicted } => {
                report.removed += 1;
                error!(
                    skipped = %evicted.source_path().display(),
                    kept = %path.display(),
                    "Skipping duplicate file in source"
                );
            }
            Offer::Rejected { rejected } => {
                report.removed += 1;
                error!(
                    skipped = %rejected.source_path().display(),
                    "Skipping duplicate file in source, a file with a name no longer than this one is already kept"
                );
            }
        }
    }

    debug!(source = %tree.name, ?report, "Finished source folder");
    Ok(report)
}

/// Remove every candidate whose content already exists below `target`
pub fn prune_destination(registry: &mut CandidateRegistry, target: &Path) -> Result<WalkReport> {
    let mut report = WalkReport::default();

    for path in media_files(target) {
        let path = path?;
        report.matched += 1;

        let digest = match hash_file(&path) {
            Ok(digest) => digest,
            Err(e) => {
                error!(path = %path.display(), error = %e, "No access to target file, skipping");
                report.unreadable += 1;
                continue;
            }
        };

        if let Some(candidate) = registry.remove(&digest) {
            report.removed += 1;
            error!(
                skipped = %candidate.source_path().display(),
                existing = %path.display(),
                "Skipping file already present in target"
            );
            if registry.is_empty() {
                debug!("Every candidate is already in the target, stopping target scan");
                break;
            }
        }
    }

    Ok(report)
}
