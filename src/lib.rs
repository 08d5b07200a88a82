//! # Socrata Downloader Library
//!
//! Resumable, chunked downloads of public datasets served by a Socrata Open
//! Data API (SODA) endpoint. Rows are fetched page by page with `$offset` /
//! `$limit`, optionally restricted to daily, weekly or monthly date windows,
//! and every page is persisted as one chunk file plus a JSON manifest.
//!
//! ## Features
//!
//! - **Windowed runs**: split a date range into calendar days, Monday–Sunday
//!   weeks or calendar months and paginate each window independently
//! - **Resume Capability**: chunk files carry their 1-based index in the name,
//!   so re-running the same command continues after the last complete chunk
//! - **Rate Limiting**: HTTP 429 responses are retried with exponential backoff
//! - **Preflight**: optional `count(1)` probe to skip windows with no rows
//! - **Integrity**: every chunk has a manifest with its SHA-256, row count and
//!   the exact query parameters used
//! - **Warehouse**: optional DuckDB load of every chunk plus a manifest table
//!
//! ## Quick Start
//!
//! ```no_run
//! use socrata_downloader::downloader::{DownloadExecutor, RunSettings};
//! use socrata_downloader::fetcher::{HttpSettings, SodaClient};
//! use socrata_downloader::shutdown::StopSignal;
//! use socrata_downloader::Mode;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SodaClient::new(
//!     "https://data.cityofchicago.org/resource/ijzp-q8t2.json",
//!     HttpSettings::default(),
//! )?;
//! let settings = RunSettings::new(Mode::Daily, "data/raw")
//!     .with_date_range(
//!         socrata_downloader::query::parse_date("2024-01-01")?,
//!         socrata_downloader::query::parse_date("2024-01-07")?,
//!     );
//!
//! let executor = DownloadExecutor::new(client, settings, StopSignal::new());
//! let summary = executor.run().await?;
//! println!("{} chunks written", summary.chunks_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`query`] - SoQL parameter builders and strict date parsing
//! - [`window`] - Lazy day/week/month window generators
//! - [`fetcher`] - HTTP client with retry/backoff and the preflight probe
//! - [`output`] - Chunk paths, CSV/parquet writers and manifests
//! - [`resume`] - Resume index derived from chunk files on disk
//! - [`downloader`] - Run orchestration (single window and multi-window loops)
//! - [`catalog`] - Discovery and verification of downloaded chunks
//! - [`warehouse`] - DuckDB materialization of chunks and manifests
//! - [`shutdown`] - Cooperative stop signal

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chunk discovery and manifest verification
pub mod catalog;

/// CLI command implementations
pub mod cli;

/// Download orchestration
pub mod downloader;

/// HTTP client for the SODA endpoint
pub mod fetcher;

/// Chunk output: paths, data writers and manifests
pub mod output;

/// SoQL query parameter builders
pub mod query;

/// Resume index computation
pub mod resume;

/// Cooperative cancellation shared by the CLI and the executor
pub mod shutdown;

/// Loading chunks into DuckDB
pub mod warehouse;

/// Date window generators
pub mod window;

/// A single loosely-typed row as returned by the API.
///
/// The API enforces no schema, so every row is kept as an ordered JSON object.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Run mode: one offset pass over the dataset, or one pass per date window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Single `$offset` pagination over the whole (optionally filtered) dataset
    Full,
    /// One window per calendar month
    Monthly,
    /// One window per Monday–Sunday week
    Weekly,
    /// One window per calendar day
    Daily,
}

impl Mode {
    /// Whether this mode iterates date windows and therefore needs a date range
    pub fn requires_date_range(&self) -> bool {
        !matches!(self, Mode::Full)
    }

    /// Directory / filename label for the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Full => "full",
            Mode::Monthly => "monthly",
            Mode::Weekly => "weekly",
            Mode::Daily => "daily",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Mode::Full),
            "monthly" => Ok(Mode::Monthly),
            "weekly" => Ok(Mode::Weekly),
            "daily" => Ok(Mode::Daily),
            _ => Err(format!(
                "Invalid mode: {s}. Valid options: full, monthly, weekly, daily"
            )),
        }
    }
}

/// Inclusive date range assigned to one pagination run.
///
/// Invariant: `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Create a window, returning `None` when `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Window covering exactly one day
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// First day of the window (inclusive)
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the window (inclusive)
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether `date` falls inside the window
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Key that names a window on disk.
///
/// Windowed runs are keyed by the window's start date; full runs use a free
/// label (`all`, or `<start>_to_<end>` when a date filter is present).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WindowKey {
    /// Date-keyed window (`YYYY-MM-DD`)
    Date(NaiveDate),
    /// Free-form label used by full mode
    Label(String),
}

impl WindowKey {
    /// Key for a full-mode run with an optional date filter
    pub fn for_full_run(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        match (start, end) {
            (None, None) => WindowKey::Label("all".to_string()),
            (start, end) => WindowKey::Label(format!(
                "{}_to_{}",
                start.map_or_else(|| "0000-00-00".to_string(), |d| d.format("%Y-%m-%d").to_string()),
                end.map_or_else(|| "9999-12-31".to_string(), |d| d.format("%Y-%m-%d").to_string()),
            )),
        }
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowKey::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            WindowKey::Label(label) => f.write_str(label),
        }
    }
}
