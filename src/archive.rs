//! Zip-bomb screening for zip based document formats.
//!
//! The screening reads only the central directory. Declared sizes can lie,
//! so extractors inflate entries through [`read_entry_bounded`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{HonyakuError, Result};

/// Hard ceiling on the declared uncompressed size of all entries
pub const MAX_UNCOMPRESSED_BYTES: u64 = 200 * 1024 * 1024;
/// Highest accepted overall uncompressed/compressed ratio
pub const MAX_COMPRESSION_RATIO: u64 = 100;

/// Extensions (lowercase, no dot) of formats that are zip containers.
pub fn is_archive_extension(extension: &str) -> bool {
    extension.eq_ignore_ascii_case("docx") || extension.eq_ignore_ascii_case("odt")
}

/// Whether the archive at `path` is safe to open for extraction.
///
/// Anything that goes wrong while reading the directory counts as unsafe.
pub fn is_archive_safe<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    match entry_sizes(path) {
        Ok(sizes) => {
            let safe = assess(sizes);
            if !safe {
                warn!("Archive {} rejected as a possible zip bomb", path.display());
            }
            safe
        }
        Err(e) => {
            warn!("Archive {} could not be inspected: {}", path.display(), e);
            false
        }
    }
}

/// Inflate one archive entry as UTF-8 text.
///
/// Fails once the data runs past `declared_size` (capped at
/// [`MAX_UNCOMPRESSED_BYTES`]) instead of reading on.
pub fn read_entry_bounded<R: Read>(entry: R, declared_size: u64) -> Result<String> {
    let limit = declared_size.min(MAX_UNCOMPRESSED_BYTES);
    let mut bytes = Vec::new();
    entry.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;

    if bytes.len() as u64 > limit {
        warn!("Archive entry inflates past its declared {} bytes", limit);
        return Err(HonyakuError::Document(format!(
            "archive entry is larger than its declared {} bytes",
            limit
        )));
    }

    String::from_utf8(bytes)
        .map_err(|e| HonyakuError::Document(format!("archive entry is not UTF-8: {}", e)))
}

/// Declared (uncompressed, compressed) size of each entry.
fn entry_sizes(path: &Path) -> Result<Vec<(u64, u64)>> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let mut sizes = Vec::with_capacity(archive.len());
    for idx in 0..archive.len() {
        let entry = archive.by_index_raw(idx)?;
        sizes.push((entry.size(), entry.compressed_size()));
    }
    Ok(sizes)
}

/// Apply the size policy to a sequence of (uncompressed, compressed) sizes.
///
/// Rejects as soon as the running uncompressed total passes the ceiling.
/// Otherwise a ratio up to [`MAX_COMPRESSION_RATIO`] passes, and so does any
/// archive whose total stays within a quarter of the ceiling.
pub fn assess<I>(sizes: I) -> bool
where
    I: IntoIterator<Item = (u64, u64)>,
{
    let mut total_uncompressed: u64 = 0;
    let mut total_compressed: u64 = 0;

    for (uncompressed, compressed) in sizes {
        total_uncompressed = total_uncompressed.saturating_add(uncompressed);
        total_compressed = total_compressed.saturating_add(compressed);

        if total_uncompressed > MAX_UNCOMPRESSED_BYTES {
            return false;
        }
    }

    if total_compressed == 0 {
        return true;
    }

    let ratio = total_uncompressed / total_compressed;
    debug!(
        "Archive totals: {} uncompressed, {} compressed, ratio {}",
        total_uncompressed, total_compressed, ratio
    );
    if ratio <= MAX_COMPRESSION_RATIO {
        return true;
    }

    total_uncompressed <= MAX_UNCOMPRESSED_BYTES / 4
}
