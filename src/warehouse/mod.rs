//! DuckDB materialization of downloaded chunks
//!
//! Loads chunk data files into one table and, optionally, their manifests into
//! a second table. CSV chunks are read with every column as text by default,
//! then a set of per-column casts is applied; the defaults keep identifier-like
//! columns such as `beat` and `district` as `VARCHAR` so leading zeros survive.
//!
//! The first file loaded into a new table fixes its column order. Later files
//! are projected onto that order by name and fail if a column is missing.
//!
//! Everything in this module except the load itself is plain SQL generation.
//! The engine is compiled in with the `duckdb` cargo feature; without it
//! [`materialize_duckdb`] returns [`WarehouseError::EngineUnavailable`].

#[cfg(feature = "duckdb")]
mod engine;

use crate::catalog::LoadedManifest;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default target table for chunk rows
pub const DEFAULT_TABLE: &str = "crimes";

/// Default table for manifest rows
pub const DEFAULT_MANIFEST_TABLE: &str = "chunk_manifests";

/// Default database file
pub const DEFAULT_DATABASE: &str = "warehouse/socrata.duckdb";

/// Warehouse errors
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    /// Nothing to load
    #[error("no chunk files to load")]
    NoChunkFiles,

    /// A later file lacks columns the table already has
    #[error("{file} is missing expected columns: {columns}")]
    MissingColumns {
        /// Offending data file
        file: PathBuf,
        /// Comma-separated missing column names
        columns: String,
    },

    /// Invalid table name or column type override
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// Built without the `duckdb` feature
    #[error("DuckDB support is not compiled in (rebuild with --features duckdb)")]
    EngineUnavailable,

    /// Error reported by DuckDB
    #[error("DuckDB error: {0}")]
    DuckDb(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Whether the DuckDB engine was compiled in
pub fn engine_available() -> bool {
    cfg!(feature = "duckdb")
}

/// Column casts applied to CSV chunks unless overridden.
///
/// Codes and identifiers that look numeric but are categorical stay text.
pub fn default_type_overrides() -> BTreeMap<String, String> {
    [
        "block",
        "case_number",
        "iucr",
        "primary_type",
        "description",
        "location_description",
        "beat",
        "district",
        "ward",
        "community_area",
        "fbi_code",
        "x_coordinate",
        "y_coordinate",
        "location",
    ]
    .into_iter()
    .map(|column| (column.to_string(), "VARCHAR".to_string()))
    .collect()
}

/// Settings for one materialization
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializeOptions {
    /// Database file; parent directories are created
    pub database: PathBuf,
    /// Table receiving chunk rows
    pub table: String,
    /// Table receiving manifest rows; `None` skips manifests
    pub manifest_table: Option<String>,
    /// Drop both tables before loading
    pub replace: bool,
    /// Column name to DuckDB type, applied to CSV chunks as casts
    pub type_overrides: BTreeMap<String, String>,
    /// Read every CSV column as text before casts
    pub all_varchar: bool,
}

impl MaterializeOptions {
    /// Defaults for a database path
    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            table: DEFAULT_TABLE.to_string(),
            manifest_table: Some(DEFAULT_MANIFEST_TABLE.to_string()),
            replace: false,
            type_overrides: default_type_overrides(),
            all_varchar: true,
        }
    }

    /// Set the target table
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set or clear the manifest table
    pub fn with_manifest_table(mut self, table: Option<String>) -> Self {
        self.manifest_table = table;
        self
    }

    /// Drop existing tables first
    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    /// Replace the column casts
    pub fn with_type_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.type_overrides = overrides;
        self
    }

    /// Read CSV columns as text (`true`) or let DuckDB infer types (`false`)
    pub fn with_all_varchar(mut self, all_varchar: bool) -> Self {
        self.all_varchar = all_varchar;
        self
    }

    /// Check table names and type overrides
    pub fn validate(&self) -> Result<(), WarehouseError> {
        if self.table.trim().is_empty() {
            return Err(WarehouseError::InvalidOption("table name must not be empty".to_string()));
        }
        if let Some(manifest_table) = &self.manifest_table {
            if manifest_table.trim().is_empty() {
                return Err(WarehouseError::InvalidOption(
                    "manifest table name must not be empty".to_string(),
                ));
            }
            if manifest_table.eq_ignore_ascii_case(&self.table) {
                return Err(WarehouseError::InvalidOption(format!(
                    "manifest table must differ from the data table ({})",
                    self.table
                )));
            }
        }
        for (column, ty) in &self.type_overrides {
            if column.is_empty() {
                return Err(WarehouseError::InvalidOption("empty column name in type overrides".to_string()));
            }
            if !is_valid_type_name(ty) {
                return Err(WarehouseError::InvalidOption(format!("invalid type for {column}: {ty:?}")));
            }
        }
        Ok(())
    }
}

// Type names are spliced into SQL, so only plain type syntax is accepted
fn is_valid_type_name(ty: &str) -> bool {
    !ty.trim().is_empty()
        && ty
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '(' | ')' | ','))
}

/// Quote a DuckDB identifier
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a SQL string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A chunk file DuckDB can read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkSource {
    /// `.csv` or `.csv.gz`
    Csv(PathBuf),
    /// `.parquet`
    Parquet(PathBuf),
}

impl ChunkSource {
    /// Classify a data file by extension; `None` for anything unreadable
    pub fn for_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(".parquet") {
            Some(ChunkSource::Parquet(path.to_path_buf()))
        } else if name.ends_with(".csv") || name.ends_with(".csv.gz") {
            Some(ChunkSource::Csv(path.to_path_buf()))
        } else {
            None
        }
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        match self {
            ChunkSource::Csv(path) | ChunkSource::Parquet(path) => path,
        }
    }

    /// Table function reading the whole file
    pub fn reader_sql(&self, all_varchar: bool) -> String {
        self.reader_with_types(all_varchar, &[])
    }

    fn reader_with_types(&self, all_varchar: bool, types: &[String]) -> String {
        let path = quote_literal(&self.path().to_string_lossy());
        match self {
            ChunkSource::Parquet(_) => format!("read_parquet({path})"),
            ChunkSource::Csv(_) => {
                let mut args = vec![path, "header = true".to_string(), "sample_size = -1".to_string()];
                if all_varchar {
                    args.push("all_varchar = true".to_string());
                } else if !types.is_empty() {
                    args.push(format!("types = {{{}}}", types.join(", ")));
                }
                format!("read_csv({})", args.join(", "))
            }
        }
    }

    /// `SELECT` over the file with type casts applied to CSV columns.
    ///
    /// When types are inferred the overrides are also handed to the CSV
    /// reader, so a column like `beat` is never parsed as a number first.
    pub fn select_sql(&self, columns: &[String], options: &MaterializeOptions) -> String {
        let types: Vec<String> = columns
            .iter()
            .filter_map(|column| {
                let ty = options.type_overrides.get(column)?;
                Some(format!("{}: {}", quote_literal(column), quote_literal(ty)))
            })
            .collect();
        let reader = self.reader_with_types(options.all_varchar, &types);
        let projection: Vec<String> = columns
            .iter()
            .map(|column| {
                let ident = quote_identifier(column);
                match (self, options.type_overrides.get(column)) {
                    (ChunkSource::Csv(_), Some(ty)) => format!("CAST({ident} AS {ty}) AS {ident}"),
                    _ => ident,
                }
            })
            .collect();
        format!("SELECT {} FROM {reader}", projection.join(", "))
    }
}

/// Project `relation` onto the table's column order.
///
/// Extra columns in the file are dropped; missing ones are an error.
pub fn align_to_target(
    relation: &str,
    target: &[String],
    available: &[String],
    file: &Path,
) -> Result<String, WarehouseError> {
    let missing: Vec<&str> = target
        .iter()
        .filter(|column| !available.contains(column))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(WarehouseError::MissingColumns {
            file: file.to_path_buf(),
            columns: missing.join(", "),
        });
    }
    if target == available {
        return Ok(relation.to_string());
    }
    let projection: Vec<String> = target.iter().map(|c| quote_identifier(c)).collect();
    Ok(format!("SELECT {} FROM ({relation})", projection.join(", ")))
}

/// Columns of the manifest table, in insert order
pub const MANIFEST_COLUMNS: [(&str, &str); 16] = [
    ("data_file", "VARCHAR"),
    ("manifest_path", "VARCHAR"),
    ("manifest_dir", "VARCHAR"),
    ("rows", "BIGINT"),
    ("sha256", "VARCHAR"),
    ("params", "VARCHAR"),
    ("started_at", "TIMESTAMP"),
    ("finished_at", "TIMESTAMP"),
    ("duration_seconds", "DOUBLE"),
    ("endpoint", "VARCHAR"),
    ("version", "VARCHAR"),
    ("chunk", "BIGINT"),
    ("format", "VARCHAR"),
    ("requested_format", "VARCHAR"),
    ("window_start", "DATE"),
    ("window_end", "DATE"),
];

/// `CREATE TABLE IF NOT EXISTS` for the manifest table
pub fn manifest_table_sql(table: &str) -> String {
    let columns: Vec<String> = MANIFEST_COLUMNS
        .iter()
        .map(|(name, ty)| format!("{} {ty}", quote_identifier(name)))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_identifier(table),
        columns.join(", ")
    )
}

/// Parameterized `INSERT` for one manifest row
pub fn manifest_insert_sql(table: &str) -> String {
    let values: Vec<String> = MANIFEST_COLUMNS
        .iter()
        .map(|(_, ty)| match *ty {
            "VARCHAR" => "?".to_string(),
            other => format!("CAST(? AS {other})"),
        })
        .collect();
    format!("INSERT INTO {} VALUES ({})", quote_identifier(table), values.join(", "))
}

/// One manifest flattened to the manifest table's columns
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestRow {
    /// Data file name
    pub data_file: String,
    /// Manifest file path
    pub manifest_path: String,
    /// Directory holding the manifest
    pub manifest_dir: String,
    /// Rows in the chunk
    pub rows: i64,
    /// SHA-256 of the data file
    pub sha256: String,
    /// Request parameters as a JSON object
    pub params: String,
    /// Request start, UTC
    pub started_at: String,
    /// Write completion, UTC
    pub finished_at: String,
    /// Seconds from request to write
    pub duration_seconds: f64,
    /// Endpoint URL
    pub endpoint: String,
    /// Tool version
    pub version: String,
    /// 1-based chunk number
    pub chunk: i64,
    /// Written format
    pub format: String,
    /// Requested format
    pub requested_format: String,
    /// Window start, for windowed runs
    pub window_start: Option<String>,
    /// Window end, for windowed runs
    pub window_end: Option<String>,
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

impl ManifestRow {
    /// Flatten a loaded manifest
    pub fn from_loaded(loaded: &LoadedManifest) -> Result<Self, WarehouseError> {
        let manifest = &loaded.manifest;
        let params = serde_json::to_string(&manifest.params).map_err(|e| WarehouseError::IoError(e.to_string()))?;
        Ok(Self {
            data_file: manifest.data_file.clone(),
            manifest_path: loaded.path.to_string_lossy().into_owned(),
            manifest_dir: loaded
                .path
                .parent()
                .map(|dir| dir.to_string_lossy().into_owned())
                .unwrap_or_default(),
            rows: manifest.rows as i64,
            sha256: manifest.sha256.clone(),
            params,
            started_at: manifest.started_at.format(TIMESTAMP_FORMAT).to_string(),
            finished_at: manifest.finished_at.format(TIMESTAMP_FORMAT).to_string(),
            duration_seconds: manifest.duration_seconds,
            endpoint: manifest.endpoint.clone(),
            version: manifest.version.clone(),
            chunk: manifest.chunk as i64,
            format: manifest.format.to_string(),
            requested_format: manifest.requested_format.to_string(),
            window_start: manifest.window_start.map(|d| d.to_string()),
            window_end: manifest.window_end.map(|d| d.to_string()),
        })
    }
}

/// Outcome of a materialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Database file written
    pub database: PathBuf,
    /// Table loaded
    pub table: String,
    /// Chunk files loaded
    pub files_loaded: usize,
    /// Files skipped as unreadable by DuckDB
    pub files_skipped: usize,
    /// Rows in the table after loading
    pub table_rows: u64,
    /// Manifest rows inserted
    pub manifests_loaded: usize,
}

/// Load `files` into `options.table` and `manifests` into the manifest table.
///
/// With `replace` both tables are dropped first; otherwise rows are appended
/// and a new table takes its columns from the first file. Fails when `files`
/// holds no readable chunk.
pub fn materialize_duckdb(
    files: &[PathBuf],
    manifests: &[LoadedManifest],
    options: &MaterializeOptions,
) -> Result<MaterializeReport, WarehouseError> {
    options.validate()?;
    let sources: Vec<ChunkSource> = files.iter().filter_map(|f| ChunkSource::for_path(f)).collect();
    if sources.is_empty() {
        return Err(WarehouseError::NoChunkFiles);
    }

    let mut report = load(&sources, manifests, options)?;
    report.files_skipped = files.len() - sources.len();
    Ok(report)
}

#[cfg(feature = "duckdb")]
fn load(
    sources: &[ChunkSource],
    manifests: &[LoadedManifest],
    options: &MaterializeOptions,
) -> Result<MaterializeReport, WarehouseError> {
    engine::load(sources, manifests, options)
}

#[cfg(not(feature = "duckdb"))]
fn load(
    _sources: &[ChunkSource],
    _manifests: &[LoadedManifest],
    _options: &MaterializeOptions,
) -> Result<MaterializeReport, WarehouseError> {
    Err(WarehouseError::EngineUnavailable)
}
