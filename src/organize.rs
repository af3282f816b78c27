//! The organizer pipeline
//!
//! A run goes through five phases, each finishing before the next starts:
//! scan every source tree, prune against the target tree, read EXIF data,
//! geocode, then plan and copy. Per-file problems in the first four phases
//! are logged and skipped. A failed copy or an invalid month aborts the run
//! and leaves already copied files in place.

use crate::candidate::keys;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::geocode::{GeocodeClient, GeocodeOutcome, GeocodeResolver, HttpGeocodeClient, RetryPolicy};
use crate::metadata::{ExifExtractor, MetadataExtractor, apply_metadata};
use crate::planner::{plan_path, resolve_collision_with};
use crate::registry::CandidateRegistry;
use crate::scan::{prune_destination, scan_source};
use filetime::FileTime;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info, span, warn};

/// One file placed (or, in a dry run, planned) in the target tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRecord {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Counters and copies of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Media files found in all source trees
    pub scanned: usize,
    /// Source or target files that could not be read
    pub unreadable: usize,
    /// Source files dropped because another source file has the same content
    pub source_duplicates: usize,
    /// Candidates dropped because the target already holds their content
    pub already_in_target: usize,
    /// Candidates with a capture date
    pub dated: usize,
    /// Candidates that received geocode data
    pub geocoded: usize,
    /// Files copied, or planned in a dry run
    pub copies: Vec<CopyRecord>,
}

impl RunSummary {
    pub fn copied(&self) -> usize {
        self.copies.len()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scanned: {}, Unreadable: {}, Duplicates: {}, Already in target: {}, Dated: {}, Geocoded: {}, Copied: {}",
            self.scanned,
            self.unreadable,
            self.source_duplicates,
            self.already_in_target,
            self.dated,
            self.geocoded,
            self.copied()
        )
    }
}

/// Drives a whole run over the configured source trees
pub struct Organizer<E, G> {
    config: Config,
    extractor: E,
    geocoder: GeocodeResolver<G>,
}

impl Organizer<ExifExtractor, HttpGeocodeClient> {
    /// Organizer with the EXIF decoder and the HTTP geocoding client
    pub fn from_config(config: Config) -> Result<Self> {
        let client = HttpGeocodeClient::new(&config.geocode)?;
        Ok(Self::new(config, ExifExtractor, client))
    }
}

impl<E: MetadataExtractor, G: GeocodeClient> Organizer<E, G> {
    pub fn new(config: Config, extractor: E, client: G) -> Self {
        let policy = RetryPolicy::from_config(&config.geocode);
        Self {
            config,
            extractor,
            geocoder: GeocodeResolver::new(client, policy),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every phase and report what happened
    pub fn run(&self) -> Result<RunSummary> {
        let _span = span!(Level::INFO, "organizer_run").entered();
        self.config.validate()?;

        let mut registry = CandidateRegistry::new();
        let mut summary = RunSummary::default();

        info!("Adding all source files...");
        for tree in &self.config.sources {
            let report = scan_source(&mut registry, tree)?;
            summary.scanned += report.matched;
            summary.unreadable += report.unreadable;
            summary.source_duplicates += report.removed;
        }
        info!(candidates = registry.len(), "Finished scanning sources");

        if !registry.is_empty() {
            info!("Checking for duplicate files in target folder...");
            let report = prune_destination(&mut registry, &self.config.target_dir)?;
            summary.unreadable += report.unreadable;
            summary.already_in_target += report.removed;
        }

        if !registry.is_empty() {
            info!(candidates = registry.len(), "Retrieving image EXIF data...");
            summary.dated = extract_metadata(&mut registry, &self.extractor);

            let policy = self.geocoder.policy();
            info!(
                max_attempts = policy.max_attempts,
                delay_secs = policy.delay.as_secs(),
                "Retrieving geocode data..."
            );
            summary.geocoded = geocode_candidates(&mut registry, &self.geocoder);

            info!("Copying files...");
            summary.copies =
                copy_candidates(&registry, &self.config.target_dir, self.config.dry_run)?;
        }

        info!(%summary, "Operation complete");
        Ok(summary)
    }
}

/// Store capture date and GPS properties; returns the number of dated candidates
pub fn extract_metadata<E: MetadataExtractor>(
    registry: &mut CandidateRegistry,
    extractor: &E,
) -> usize {
    let mut dated = 0;
    for candidate in registry.candidates_mut() {
        match extractor.extract(candidate.source_path()) {
            Ok(Some(record)) => {
                if apply_metadata(candidate, &record) {
                    dated += 1;
                }
            }
            Ok(None) => {
                debug!(path = ?candidate.source_path(), "Found no EXIF data");
            }
            Err(e) => {
                warn!(path = ?candidate.source_path(), error = %e, "Failed to read metadata, continuing without it");
            }
        }
    }
    dated
}

/// Geocode every candidate with coordinates; returns the number resolved
pub fn geocode_candidates<G: GeocodeClient>(
    registry: &mut CandidateRegistry,
    resolver: &GeocodeResolver<G>,
) -> usize {
    registry
        .candidates_mut()
        .filter_map(|candidate| resolver.enrich(candidate))
        .filter(|outcome| matches!(outcome, GeocodeOutcome::Resolved { .. }))
        .count()
}

/// Plan a free destination for every candidate and copy it there
///
/// In a dry run nothing is written; names planned earlier in the same run
/// count as taken so the report matches what a real run would do.
pub fn copy_candidates(
    registry: &CandidateRegistry,
    target: &Path,
    dry_run: bool,
) -> Result<Vec<CopyRecord>> {
    let mut copies = Vec::with_capacity(registry.len());
    let mut planned: HashSet<PathBuf> = HashSet::new();

    for candidate in registry.candidates() {
        let desired = plan_path(candidate, target)?;
        let destination =
            resolve_collision_with(&desired, candidate.extension(), |p| planned.contains(p))?;

        if dry_run {
            info!(
                source = %candidate.source_path().display(),
                destination = %destination.display(),
                "Would copy file"
            );
            planned.insert(destination.clone());
        } else {
            debug!(
                source = %candidate.source_path().display(),
                destination = %destination.display(),
                title = candidate.property(keys::SOURCE_TITLE).unwrap_or_default(),
                "Copying file"
            );
            copy_preserving_attributes(candidate.source_path(), &destination)?;
        }

        copies.push(CopyRecord {
            source: candidate.source_path().to_path_buf(),
            destination,
        });
    }

    Ok(copies)
}

/// Copy a file, creating parent folders, and carry over permissions and times
fn copy_preserving_attributes(source: &Path, destination: &Path) -> Result<()> {
    let copy_error = |e| Error::Copy {
        source_path: source.to_path_buf(),
        target: destination.to_path_buf(),
        source: e,
    };

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(copy_error)?;
    }

    // fs::copy carries the permission bits over
    fs::copy(source, destination).map_err(copy_error)?;

    let metadata = fs::metadata(source).map_err(copy_error)?;
    let atime = FileTime::from_last_access_time(&metadata);
    let mtime = FileTime::from_last_modification_time(&metadata);
    if let Err(e) = filetime::set_file_times(destination, atime, mtime) {
        warn!(path = %destination.display(), error = %e, "Failed to preserve file times");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceTree;
    use crate::geocode::tests::{ScriptedClient, response};
    use crate::metadata::{GpsPosition, MetadataRecord};
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Metadata keyed by file name; unknown files have none
    #[derive(Default)]
    struct FakeExtractor {
        records: HashMap<String, MetadataRecord>,
    }

    impl FakeExtractor {
        fn with(mut self, file_name: &str, record: MetadataRecord) -> Self {
            self.records.insert(file_name.to_string(), record);
            self
        }
    }

    impl MetadataExtractor for FakeExtractor {
        fn extract(&self, path: &Path) -> Result<Option<MetadataRecord>> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            Ok(self.records.get(&name).cloned())
        }
    }

    struct Fixture {
        sources: Vec<(String, TempDir)>,
        target: TempDir,
    }

    impl Fixture {
        fn new(source_names: &[&str]) -> Self {
            Self {
                sources: source_names
                    .iter()
                    .map(|name| (name.to_string(), TempDir::new().unwrap()))
                    .collect(),
                target: TempDir::new().unwrap(),
            }
        }

        fn source(&self, index: usize) -> &Path {
            self.sources[index].1.path()
        }

        fn write(&self, root: &Path, relative: &str, content: &[u8]) -> PathBuf {
            let path = root.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn config(&self) -> Config {
            let mut config = Config {
                sources: self
                    .sources
                    .iter()
                    .map(|(name, dir)| SourceTree::new(name.as_str(), dir.path()))
                    .collect(),
                target_dir: self.target.path().to_path_buf(),
                ..Config::default()
            };
            config.geocode.retry_count = 2;
            config.geocode.retry_delay_secs = 0;
            config
        }

        fn organizer(
            &self,
            extractor: FakeExtractor,
            responses: Vec<Result<String>>,
        ) -> Organizer<FakeExtractor, ScriptedClient> {
            Organizer::new(self.config(), extractor, ScriptedClient::new(responses))
        }
    }

    fn dated_record(timestamp: &str, gps: Option<(f64, f64)>) -> MetadataRecord {
        MetadataRecord {
            capture_timestamp: Some(timestamp.to_string()),
            gps: gps.map(|(latitude, longitude)| GpsPosition {
                latitude,
                longitude,
            }),
        }
    }

    #[test]
    fn test_shorter_name_from_later_source_wins() {
        let fixture = Fixture::new(&["Phone", "Backup"]);
        fixture.write(fixture.source(0), "IMG_0001.JPG", b"identical");
        fixture.write(fixture.source(1), "img.jpg", b"identical");

        let summary = fixture
            .organizer(FakeExtractor::default(), vec![])
            .run()
            .unwrap();

        assert_eq!(summary.scanned, 2);
        assert_eq!(summary.source_duplicates, 1);
        assert_eq!(summary.copied(), 1);
        assert_eq!(summary.copies[0].source, fixture.source(1).join("img.jpg"));
        assert_eq!(
            summary.copies[0].destination,
            fixture.target.path().join("Backup").join("img.jpg")
        );
    }

    #[test]
    fn test_dated_and_geocoded_file() {
        let fixture = Fixture::new(&["Phone"]);
        fixture.write(fixture.source(0), "DCIM/IMG_1234.jpg", b"photo");
        let extractor = FakeExtractor::default().with(
            "IMG_1234.jpg",
            dated_record("2023:07:04 15:30:00", Some((40.7128, -74.0060))),
        );
        let geocode = response(&[
            ("postal_town", "Manhattan"),
            ("country", "United States"),
            ("route", "Broadway"),
        ]);

        let summary = fixture.organizer(extractor, vec![Ok(geocode)]).run().unwrap();

        let expected = fixture
            .target
            .path()
            .join("2023")
            .join("07 - Jul")
            .join("04 -  Manhattan, United States")
            .join("15_30_00 -  Broadway.jpg");
        assert_eq!(summary.dated, 1);
        assert_eq!(summary.geocoded, 1);
        assert_eq!(summary.copies[0].destination, expected);
        assert_eq!(fs::read(&expected).unwrap(), b"photo");
    }

    #[test]
    fn test_absolute_names_never_leave_target() {
        let outside = TempDir::new().unwrap();
        let outside_name = outside.path().to_string_lossy().into_owned();

        let fixture = Fixture::new(&[outside_name.as_str()]);
        fixture.write(fixture.source(0), "a.jpg", b"dated");
        fixture.write(fixture.source(0), "clip.mp4", b"undated");
        let extractor = FakeExtractor::default().with(
            "a.jpg",
            dated_record(&format!("{outside_name}:07:04 15:30:00"), None),
        );

        let summary = fixture.organizer(extractor, vec![]).run().unwrap();

        assert_eq!(summary.copied(), 2);
        for record in &summary.copies {
            assert!(
                record.destination.starts_with(fixture.target.path()),
                "{} escaped the target",
                record.destination.display()
            );
            assert!(record.destination.is_file());
        }
        assert_eq!(fs::read_dir(outside.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_geocode_failure_still_copies() {
        let fixture = Fixture::new(&["Phone"]);
        fixture.write(fixture.source(0), "IMG_9.jpg", b"photo");
        let extractor = FakeExtractor::default().with(
            "IMG_9.jpg",
            dated_record("2021:12:31 23:59:59", Some((1.5, 2.5))),
        );

        let summary = fixture.organizer(extractor, vec![]).run().unwrap();

        assert_eq!(summary.geocoded, 0);
        let expected = fixture
            .target
            .path()
            .join("2021/12 - Dec/31 - /23_59_59 -  IMG_9.jpg");
        assert!(expected.is_file());
    }

    #[test]
    fn test_undated_video_mirrors_source() {
        let fixture = Fixture::new(&["Archive"]);
        fixture.write(fixture.source(0), "2019/trip/clip01.mp4", b"video");

        let summary = fixture
            .organizer(FakeExtractor::default(), vec![])
            .run()
            .unwrap();

        let expected = fixture.target.path().join("Archive/2019/trip/clip01.mp4");
        assert_eq!(summary.copies[0].destination, expected);
        assert_eq!(fs::read(&expected).unwrap(), b"video");
    }

    #[test]
    fn test_occupied_destination_gets_counter() {
        let fixture = Fixture::new(&["Archive"]);
        fixture.write(fixture.source(0), "2019/trip/clip01.mp4", b"video");
        fixture.write(
            fixture.target.path(),
            "Archive/2019/trip/clip01.mp4",
            b"a different video",
        );

        let summary = fixture
            .organizer(FakeExtractor::default(), vec![])
            .run()
            .unwrap();

        let expected = fixture
            .target
            .path()
            .join("Archive/2019/trip/clip01 001.mp4");
        assert_eq!(summary.copies[0].destination, expected);
        assert_eq!(fs::read(&expected).unwrap(), b"video");
        assert_eq!(
            fs::read(fixture.target.path().join("Archive/2019/trip/clip01.mp4")).unwrap(),
            b"a different video"
        );
    }

    #[test]
    fn test_second_run_copies_nothing() {
        let fixture = Fixture::new(&["Phone", "Archive"]);
        fixture.write(fixture.source(0), "a.jpg", b"one");
        fixture.write(fixture.source(0), "sub/b.mov", b"two");
        fixture.write(fixture.source(1), "c.mp4", b"three");

        let first = fixture
            .organizer(FakeExtractor::default(), vec![])
            .run()
            .unwrap();
        assert_eq!(first.copied(), 3);

        let second = fixture
            .organizer(FakeExtractor::default(), vec![])
            .run()
            .unwrap();
        assert_eq!(second.copied(), 0);
        assert_eq!(second.already_in_target, 3);
    }

    #[test]
    fn test_invalid_month_aborts_run() {
        let fixture = Fixture::new(&["Phone"]);
        fixture.write(fixture.source(0), "bad.jpg", b"corrupt");
        let extractor =
            FakeExtractor::default().with("bad.jpg", dated_record("2020:00:10 10:00:00", None));

        let result = fixture.organizer(extractor, vec![]).run();
        assert!(matches!(result, Err(Error::InvalidMonth { .. })));
    }

    #[test]
    fn test_missing_source_fails_fast() {
        let fixture = Fixture::new(&["Phone"]);
        let mut config = fixture.config();
        config.sources.push(SourceTree::new(
            "Gone",
            fixture.target.path().join("does-not-exist"),
        ));

        let organizer = Organizer::new(config, FakeExtractor::default(), ScriptedClient::new(vec![]));
        assert!(matches!(organizer.run(), Err(Error::Config(_))));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let fixture = Fixture::new(&["Phone"]);
        fixture.write(fixture.source(0), "a.jpg", b"one");
        fixture.write(fixture.source(0), "b.jpg", b"two");
        let extractor = FakeExtractor::default()
            .with("a.jpg", dated_record("2022:05:01 08:00:00", None))
            .with("b.jpg", dated_record("2022:05:01 08:00:00", None));

        let mut config = fixture.config();
        config.dry_run = true;
        let organizer = Organizer::new(config, extractor, ScriptedClient::new(vec![]));
        let summary = organizer.run().unwrap();

        assert_eq!(summary.copied(), 2);
        let mut destinations: Vec<String> = summary
            .copies
            .iter()
            .map(|c| c.destination.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        destinations.sort();
        // Both files have no place data, so each falls back to its own name
        assert_eq!(destinations, vec!["08_00_00 -  a.jpg", "08_00_00 -  b.jpg"]);
        assert_eq!(fs::read_dir(fixture.target.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_dry_run_reserves_planned_names() {
        let fixture = Fixture::new(&["First", "Second"]);
        fixture.write(fixture.source(0), "clip.mp4", b"one");
        fixture.write(fixture.source(1), "clip.mp4", b"two");

        // Same title for both trees, so both files plan to Shared/clip.mp4
        let mut registry = CandidateRegistry::new();
        for index in 0..2 {
            scan_source(&mut registry, &SourceTree::new("Shared", fixture.source(index))).unwrap();
        }
        let copies = copy_candidates(&registry, fixture.target.path(), true).unwrap();

        let shared = fixture.target.path().join("Shared");
        let mut names: Vec<PathBuf> = copies.into_iter().map(|c| c.destination).collect();
        names.sort();
        assert_eq!(names, vec![shared.join("clip 001.mp4"), shared.join("clip.mp4")]);
        assert!(!shared.exists());
    }

    #[test]
    fn test_copy_preserves_modification_time() {
        let fixture = Fixture::new(&["Archive"]);
        let source = fixture.write(fixture.source(0), "old.mov", b"vintage");
        let mtime = FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_mtime(&source, mtime).unwrap();

        fixture
            .organizer(FakeExtractor::default(), vec![])
            .run()
            .unwrap();

        let copied = fs::metadata(fixture.target.path().join("Archive/old.mov")).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&copied), mtime);
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            scanned: 5,
            source_duplicates: 1,
            already_in_target: 2,
            ..RunSummary::default()
        };
        let text = summary.to_string();
        assert!(text.contains("Scanned: 5"));
        assert!(text.contains("Duplicates: 1"));
        assert!(text.contains("Already in target: 2"));
        assert!(text.contains("Copied: 0"));
    }
}
