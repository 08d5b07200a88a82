//! Atomic chunk commit
//!
//! Commit order for one page of rows:
//!
//! 1. encode the rows into a hidden temp file in the target directory
//! 2. sync it and hash the bytes on disk
//! 3. write the manifest (itself atomic)
//! 4. rename the temp file to its final `_chunk_NNNN.{csv,parquet}` name
//!
//! The resume scan only counts final-named data files, so a crash at any point
//! leaves at worst an orphan manifest or a hidden temp file, never a data file
//! that resume would trust without its manifest.

use super::manifest::{sync_dir, write_manifest, ChunkManifest};
use super::path::ChunkPaths;
use super::{encode_frame, OutputError, OutputFormat, OutputResult};
use crate::query::QueryParams;
use crate::{DateWindow, Record};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Version string recorded in manifests
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Request-side facts recorded in a chunk's manifest
#[derive(Debug, Clone)]
pub struct ChunkContext<'a> {
    /// Zero-based chunk index
    pub chunk_index: u64,
    /// Parameters of the request that produced the rows
    pub params: &'a QueryParams,
    /// Endpoint URL
    pub endpoint: &'a str,
    /// Window the chunk belongs to, for windowed runs
    pub window: Option<DateWindow>,
    /// When the request was issued
    pub started_at: DateTime<Utc>,
    /// Requested data format
    pub format: OutputFormat,
}

/// A committed chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    /// Final data file path
    pub data_path: PathBuf,
    /// Manifest path
    pub manifest_path: PathBuf,
    /// Manifest as written
    pub manifest: ChunkManifest,
}

impl ChunkResult {
    /// Rows in the chunk
    pub fn rows(&self) -> usize {
        self.manifest.rows
    }
}

/// Persist `rows` as the chunk described by `paths` and `context`.
///
/// When a parquet request falls back to CSV the data file gets a `.csv`
/// extension and the manifest records both formats.
pub fn commit_chunk(
    rows: &[Record],
    paths: &ChunkPaths,
    context: &ChunkContext<'_>,
) -> OutputResult<ChunkResult> {
    let dir = paths.dir();
    std::fs::create_dir_all(dir)
        .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;

    let mut temp_file = tempfile::Builder::new()
        .prefix(".chunk-")
        .suffix(".partial")
        .tempfile_in(dir)
        .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;

    let written = encode_frame(rows, temp_file.as_file_mut(), context.format)?;
    temp_file
        .flush()
        .map_err(|e| OutputError::IoError(format!("Failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;

    let sha256 = sha256_file(temp_file.path())?;
    let finished_at = Utc::now();

    let data_path = paths.data_for(written);
    let data_file = data_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let manifest = ChunkManifest {
        data_file,
        rows: rows.len(),
        sha256,
        params: context.params.clone(),
        started_at: context.started_at,
        finished_at,
        duration_seconds: elapsed_seconds(context.started_at, finished_at),
        endpoint: context.endpoint.to_string(),
        version: TOOL_VERSION.to_string(),
        chunk: context.chunk_index + 1,
        format: written,
        requested_format: context.format,
        window_start: context.window.map(|w| w.start()),
        window_end: context.window.map(|w| w.end()),
    };
    write_manifest(&manifest, &paths.manifest)?;

    temp_file
        .persist(&data_path)
        .map_err(|e| OutputError::IoError(format!("Failed to persist data file: {e}")))?;
    sync_dir(dir);

    info!(
        chunk = manifest.chunk,
        rows = manifest.rows,
        format = %written,
        path = %data_path.display(),
        "Chunk committed"
    );

    Ok(ChunkResult {
        data_path,
        manifest_path: paths.manifest.clone(),
        manifest,
    })
}

/// Lowercase hex SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> OutputResult<String> {
    let file = File::open(path)
        .map_err(|e| OutputError::IoError(format!("Failed to open {}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher)
        .map_err(|e| OutputError::IoError(format!("Failed to hash {}: {e}", path.display())))?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let millis = (end - start).num_milliseconds().max(0);
    millis as f64 / 1000.0
}
