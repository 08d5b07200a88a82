//! Resume index computation

use super::ResumeError;
use crate::output::path::ChunkLocation;
use crate::output::Layout;
use crate::{Mode, WindowKey};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Zero-based indices of the committed chunks for a window, ascending.
///
/// Only final-named `.csv` / `.parquet` files count; manifests and hidden
/// temp files are ignored. A chunk present in both formats counts once.
/// A missing directory yields an empty set.
pub fn existing_chunk_indices(
    key: &WindowKey,
    layout: Layout,
    mode: Mode,
    root: &Path,
) -> Result<BTreeSet<u64>, ResumeError> {
    let location = ChunkLocation::resolve(key, layout, mode, root);

    let entries = match std::fs::read_dir(&location.dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => {
            return Err(ResumeError::IoError(format!(
                "Failed to read {}: {e}",
                location.dir.display()
            )))
        }
    };

    let mut indices = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| ResumeError::IoError(e.to_string()))?;
        let name = entry.file_name();
        if let Some(index) = name.to_str().and_then(|n| location.chunk_index_of(n)) {
            indices.insert(index);
        }
    }
    Ok(indices)
}

/// Number of chunks already committed for a window; the next chunk index to write.
///
/// A committed chunk is never fetched again, even a short final one. Rows
/// published for the window after that chunk was written are only picked
/// up if its data file is removed before the rerun.
pub fn resume_index(
    key: &WindowKey,
    layout: Layout,
    mode: Mode,
    root: &Path,
) -> Result<u64, ResumeError> {
    let indices = existing_chunk_indices(key, layout, mode, root)?;
    let count = indices.len() as u64;
    if count > 0 {
        debug!(key = %key, chunks = count, "Found existing chunks");
    }
    Ok(count)
}
