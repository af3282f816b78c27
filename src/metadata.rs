//! Capture metadata: the extractor boundary and the EXIF-backed implementation

use crate::candidate::{Candidate, keys};
use crate::error::Result;
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, trace};

/// A GPS position in decimal degrees, north and east positive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPosition {
    pub latitude: f64,
    pub longitude: f64,
}

/// What a metadata decoder found in a file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRecord {
    /// Original capture time, formatted `YYYY:MM:DD HH:MM:SS`
    pub capture_timestamp: Option<String>,
    pub gps: Option<GpsPosition>,
}

/// Source of capture metadata for a file
///
/// `Ok(None)` means the file has no metadata the decoder understands,
/// which is the normal outcome for videos. `Err` is reserved for failures
/// such as the file vanishing mid-run.
pub trait MetadataExtractor {
    fn extract(&self, path: &Path) -> Result<Option<MetadataRecord>>;
}

/// Reads `DateTimeOriginal` and GPS tags with `kamadak-exif`
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifExtractor;

impl MetadataExtractor for ExifExtractor {
    fn extract(&self, path: &Path) -> Result<Option<MetadataRecord>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let exif = match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            Err(e) => {
                trace!(?path, error = %e, "No EXIF container");
                return Ok(None);
            }
        };

        Ok(Some(MetadataRecord {
            capture_timestamp: ascii_field(&exif, Tag::DateTimeOriginal),
            gps: gps_position(&exif),
        }))
    }
}

/// Raw text of an ASCII field, without the display formatting the exif
/// crate applies to date tags
fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(values) => values
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn gps_position(exif: &Exif) -> Option<GpsPosition> {
    let latitude = gps_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, 'S')?;
    let longitude = gps_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, 'W')?;
    Some(GpsPosition {
        latitude,
        longitude,
    })
}

/// Degrees/minutes/seconds to decimal degrees, negated for the given hemisphere
fn gps_coordinate(exif: &Exif, coord_tag: Tag, ref_tag: Tag, negative_ref: char) -> Option<f64> {
    let field = exif.get_field(coord_tag, In::PRIMARY)?;
    let degrees = match &field.value {
        Value::Rational(v) if v.len() >= 3 => {
            v[0].to_f64() + v[1].to_f64() / 60.0 + v[2].to_f64() / 3600.0
        }
        _ => return None,
    };
    if !degrees.is_finite() {
        return None;
    }

    let negative = ascii_field(exif, ref_tag)
        .map(|r| r.starts_with(negative_ref))
        .unwrap_or(false);

    Some(if negative { -degrees } else { degrees })
}

/// Date and time fields derived from a capture timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureParts {
    pub year: String,
    pub month: String,
    pub day: String,
    /// Time of day with `:` replaced by `_`
    pub time: String,
}

/// Split `YYYY:MM:DD HH:MM:SS` into its parts
///
/// The parts are literal substrings; nothing is checked against the
/// calendar. Returns `None` when there is no time half or fewer than three
/// date fields.
pub fn split_capture_timestamp(timestamp: &str) -> Option<CaptureParts> {
    let mut halves = timestamp.trim().split(' ');
    let date = halves.next()?;
    let time = halves.next()?;

    let mut date_fields = date.split(':');
    let year = date_fields.next()?.trim().to_string();
    let month = date_fields.next()?.trim().to_string();
    let day = date_fields.next()?.trim().to_string();

    Some(CaptureParts {
        year,
        month,
        day,
        time: time.replace(':', "_").trim().to_string(),
    })
}

/// Copy what `record` holds into the candidate's properties
///
/// Returns `true` when date properties were stored.
pub fn apply_metadata(candidate: &mut Candidate, record: &MetadataRecord) -> bool {
    let mut dated = false;

    match record.capture_timestamp.as_deref() {
        Some(timestamp) => match split_capture_timestamp(timestamp) {
            Some(parts) => {
                debug!(path = ?candidate.source_path(), "Found EXIF datetime");
                candidate.set_property(keys::YEAR, parts.year);
                candidate.set_property(keys::MONTH, parts.month);
                candidate.set_property(keys::DAY, parts.day);
                candidate.set_property(keys::TIME, parts.time);
                dated = true;
            }
            None => {
                debug!(path = ?candidate.source_path(), %timestamp, "Ignoring malformed EXIF datetime");
            }
        },
        None => debug!(path = ?candidate.source_path(), "Found no EXIF datetime"),
    }

    if let Some(gps) = record.gps {
        debug!(path = ?candidate.source_path(), "Found EXIF GPS data");
        candidate.set_property(keys::LATITUDE, gps.latitude.to_string());
        candidate.set_property(keys::LONGITUDE, gps.longitude.to_string());
    }

    dated
}
