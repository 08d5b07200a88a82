//! Chunk manifests
//!
//! A manifest is a small JSON document stored next to each data file. It
//! records what was requested (`params`), what was written (`rows`, `sha256`,
//! `format`) and when. Manifests are written atomically: a temp file in the
//! target directory is synced and then renamed over the final path.

use super::{OutputError, OutputFormat, OutputResult};
use crate::query::QueryParams;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// File-name suffix of manifests; replaces the data extension
pub const MANIFEST_SUFFIX: &str = ".manifest.json";

/// Metadata recorded for every committed chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkManifest {
    /// Data file name (no directory), as it exists on disk
    pub data_file: String,
    /// Rows in the data file
    pub rows: usize,
    /// Lowercase hex SHA-256 of the data file's bytes
    pub sha256: String,
    /// Query parameters of the request that produced the rows
    pub params: QueryParams,
    /// Request start time (UTC)
    pub started_at: DateTime<Utc>,
    /// Time the data file was fully written (UTC)
    pub finished_at: DateTime<Utc>,
    /// Wall-clock seconds from request start to write completion
    pub duration_seconds: f64,
    /// Endpoint URL
    pub endpoint: String,
    /// Tool version that wrote the chunk
    pub version: String,
    /// 1-based chunk number, as in the file name
    pub chunk: u64,
    /// Format actually written
    pub format: OutputFormat,
    /// Format that was requested; differs from `format` after a fallback
    pub requested_format: OutputFormat,
    /// First day of the chunk's window, for windowed runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_start: Option<NaiveDate>,
    /// Last day of the chunk's window, for windowed runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_end: Option<NaiveDate>,
}

impl ChunkManifest {
    /// Whether the written format differs from the requested one
    pub fn fell_back(&self) -> bool {
        self.format != self.requested_format
    }
}

/// Serialize `metadata` as pretty JSON and atomically write it to `path`.
///
/// Parent directories are created. On success the file at `path` is complete;
/// on failure any previous file at `path` is left untouched.
pub fn write_manifest<T: Serialize + ?Sized>(metadata: &T, path: &Path) -> OutputResult<()> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| OutputError::SerializationError(e.to_string()))?;

    let parent_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent_dir)
        .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
        .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;
    temp_file
        .write_all(json.as_bytes())
        .map_err(|e| OutputError::IoError(format!("Failed to write to temp file: {e}")))?;
    temp_file
        .flush()
        .map_err(|e| OutputError::IoError(format!("Failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;
    temp_file
        .persist(path)
        .map_err(|e| OutputError::IoError(format!("Failed to persist temp file: {e}")))?;

    sync_dir(parent_dir);
    debug!(path = %path.display(), "Manifest written");
    Ok(())
}

/// Read and deserialize a manifest
pub fn read_manifest<T: DeserializeOwned>(path: &Path) -> OutputResult<T> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| OutputError::IoError(format!("Failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&contents).map_err(|e| {
        OutputError::SerializationError(format!("Invalid manifest {}: {e}", path.display()))
    })
}

/// Fsync a directory so a rename inside it is durable. Best effort.
pub(crate) fn sync_dir(dir: &Path) {
    if let Ok(handle) = std::fs::File::open(dir) {
        let _ = handle.sync_all();
    }
}
