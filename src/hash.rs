//! SHA-256 content digests for deduplication
//!
//! Files are streamed in fixed-size chunks so large videos never have to
//! fit in memory. The digest is rendered as lowercase hex and is stable
//! between runs, which is what makes a second run over the same sources
//! a no-op.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::trace;

/// Size of each read from disk (64KB)
const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the content digest of a file
///
/// Any failure to open or read the file is reported as [`Error::Unreadable`].
pub fn hash_file(path: &Path) -> Result<String> {
    let unreadable = |source| Error::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(unreadable)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(unreadable(e)),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    let digest = format!("{:x}", hasher.finalize());
    trace!(?path, %digest, "Computed content digest");
    Ok(digest)
}
