//! Destination path derivation and collision resolution
//!
//! Dated files land in `<year>/<MM> - <Mon>/<DD> - <place>/<time> - <street>`,
//! everything else mirrors its source location under a folder named after
//! the source tree. An occupied name gets a ` 001`, ` 002`, ... counter.

use crate::candidate::{Candidate, keys};
use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Month folder suffixes, indexed by month number minus one
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sept", "Oct", "Nov", "Dec",
];

/// Highest counter tried before giving up on a name
const MAX_COUNTER: u32 = 999_999;

/// Join the present parts with `", "` and prefix a single space
///
/// Returns an empty string when no part is present.
fn address_string(parts: &[Option<&str>]) -> String {
    let present: Vec<&str> = parts.iter().flatten().copied().collect();
    if present.is_empty() {
        String::new()
    } else {
        format!(" {}", present.join(", "))
    }
}

/// `postal_town`, `locality` (when it differs from the postal town), `country`
fn folder_address(candidate: &Candidate) -> String {
    let postal_town = candidate.property("postal_town");
    let locality = candidate
        .property("locality")
        .filter(|locality| Some(*locality) != postal_town);
    address_string(&[postal_town, locality, candidate.property("country")])
}

/// `route`, then `neighborhood` or, without one, `sublocality_level_1`
fn file_address(candidate: &Candidate) -> String {
    let area = candidate
        .property("neighborhood")
        .or_else(|| candidate.property("sublocality_level_1"));
    let address = address_string(&[candidate.property("route"), area]);
    if address.is_empty() {
        format!(" {}", candidate.base_name())
    } else {
        address
    }
}

/// Folder suffix for a month value such as `"07"`
fn month_name(month: &str) -> Option<&'static str> {
    let index: usize = month.parse().ok()?;
    MONTH_NAMES.get(index.checked_sub(1)?).copied()
}

/// Append `part` below `path`, keeping only its normal components
///
/// Root, prefix and `..` components are dropped.
fn push_relative(path: &mut PathBuf, part: impl AsRef<Path>) {
    for component in part.as_ref().components() {
        if let Component::Normal(name) = component {
            path.push(name);
        }
    }
}

/// Derive the destination path for `candidate`, without extension or counter
///
/// The result always lies below `target`. Fails with [`Error::InvalidMonth`]
/// when a dated candidate's month is not a number from 1 to 12.
pub fn plan_path(candidate: &Candidate, target: &Path) -> Result<PathBuf> {
    let mut path = target.to_path_buf();

    let Some(year) = candidate.property(keys::YEAR) else {
        let title = candidate
            .property(keys::SOURCE_TITLE)
            .ok_or_else(|| Error::MissingSourceTitle {
                path: candidate.source_path().to_path_buf(),
            })?;
        push_relative(&mut path, title);
        push_relative(&mut path, candidate.relative_path());
        // base_name is a plain file name; an empty one still needs its own slot
        path.push(candidate.base_name());
        return Ok(path);
    };

    let month = candidate.property(keys::MONTH).unwrap_or_default();
    let day = candidate.property(keys::DAY).unwrap_or_default();
    let time = candidate.property(keys::TIME).unwrap_or_default();
    let name = month_name(month).ok_or_else(|| Error::InvalidMonth {
        path: candidate.source_path().to_path_buf(),
        month: month.to_string(),
    })?;

    push_relative(&mut path, year);
    push_relative(&mut path, format!("{month} - {name}"));
    push_relative(&mut path, format!("{day} - {}", folder_address(candidate)));
    push_relative(&mut path, format!("{time} - {}", file_address(candidate)));
    Ok(path)
}

/// The name tried for a given counter: `path.ext`, then `path 001.ext`, ...
fn numbered(desired: &Path, counter: u32, extension: &str) -> PathBuf {
    let mut name = desired.as_os_str().to_os_string();
    if counter > 0 {
        name.push(format!(" {counter:03}"));
    }
    if !extension.is_empty() {
        name.push(".");
        name.push(extension);
    }
    PathBuf::from(name)
}

/// First name derived from `desired` that does not exist yet
///
/// Existence is checked without following symlinks, so a dangling link
/// still occupies its name.
pub fn resolve_collision(desired: &Path, extension: &str) -> Result<PathBuf> {
    resolve_collision_with(desired, extension, |_| false)
}

/// Like [`resolve_collision`], also skipping names for which `reserved`
/// returns `true`
pub fn resolve_collision_with<F>(desired: &Path, extension: &str, reserved: F) -> Result<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    for counter in 0..=MAX_COUNTER {
        let candidate = numbered(desired, counter, extension);
        if reserved(&candidate) {
            continue;
        }
        match candidate.symlink_metadata() {
            Ok(_) => continue,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(candidate),
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free name left for {}", desired.display()),
    )))
}
