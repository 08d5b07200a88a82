//! Chunk output: paths, data writers and manifests
//!
//! A chunk is one page of rows persisted as a data file (CSV or parquet) plus a
//! `.manifest.json` sidecar. [`chunk::commit_chunk`] writes both so that the
//! final data filename only appears once the manifest is durable.

use crate::Record;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

pub mod chunk;
pub mod csv;
pub mod manifest;
pub mod parquet;
pub mod path;

pub use chunk::{commit_chunk, ChunkContext, ChunkResult};
pub use manifest::{read_manifest, write_manifest, ChunkManifest, MANIFEST_SUFFIX};
pub use path::{make_paths, ChunkPaths, Layout};

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Columnar engine error
    #[error("parquet error: {0}")]
    ParquetError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// On-disk format of a chunk's data file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma-separated values with a header row
    Csv,
    /// Apache Parquet, every column as nullable UTF-8
    Parquet,
}

impl OutputFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }

    /// All formats, used when scanning for existing chunks
    pub fn all() -> [OutputFormat; 2] {
        [OutputFormat::Csv, OutputFormat::Parquet]
    }

    /// Format for a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "csv" => Some(OutputFormat::Csv),
            "parquet" => Some(OutputFormat::Parquet),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "parquet" => Ok(OutputFormat::Parquet),
            _ => Err(format!("Invalid output format: {s}. Valid options: csv, parquet")),
        }
    }
}

/// Generic frame writer
pub trait FrameWriter {
    /// Write all rows
    fn write_rows(&mut self, rows: &[Record]) -> OutputResult<()>;

    /// Finalize the output
    fn close(self) -> OutputResult<()>;
}

/// Column names across all rows, in first-seen order
pub fn collect_columns(rows: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Text rendering of one cell: `None` for null/missing, JSON text for nested values
pub fn cell_text(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}

/// Encode rows in `requested` format into `writer`.
///
/// Returns the format actually written: parquet requests fall back to CSV when
/// the columnar engine is not compiled in.
pub fn encode_frame<W: Write + Send>(
    rows: &[Record],
    writer: W,
    requested: OutputFormat,
) -> OutputResult<OutputFormat> {
    match requested {
        OutputFormat::Parquet if parquet::engine_available() => {
            let mut frame = parquet::ParquetFrameWriter::new(writer);
            frame.write_rows(rows)?;
            frame.close()?;
            Ok(OutputFormat::Parquet)
        }
        OutputFormat::Parquet => {
            tracing::warn!(
                "Parquet engine not available (build with --features parquet); writing CSV instead"
            );
            write_csv(rows, writer)?;
            Ok(OutputFormat::Csv)
        }
        OutputFormat::Csv => {
            write_csv(rows, writer)?;
            Ok(OutputFormat::Csv)
        }
    }
}

fn write_csv<W: Write>(rows: &[Record], writer: W) -> OutputResult<()> {
    let mut frame = csv::CsvFrameWriter::new(writer);
    frame.write_rows(rows)?;
    frame.close()
}

/// Write rows to `path`, creating parent directories.
///
/// The returned format may differ from `requested` (see [`encode_frame`]); in
/// that case the file at `path` holds CSV bytes and the caller decides how to
/// name it.
pub fn write_frame(rows: &[Record], path: &Path, requested: OutputFormat) -> OutputResult<OutputFormat> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;
    }
    let mut file = File::create(path)
        .map_err(|e| OutputError::IoError(format!("Failed to create file: {e}")))?;
    let written = encode_frame(rows, &mut file, requested)?;
    file.sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync file: {e}")))?;
    Ok(written)
}
