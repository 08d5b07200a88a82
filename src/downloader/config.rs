//! Run settings and their defaults

use super::DownloadError;
use crate::output::{Layout, OutputFormat};
use crate::query::DEFAULT_DATE_COLUMN;
use crate::Mode;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;

/// Rows requested per page (and written per chunk).
/// 50,000 is the largest page the public SODA endpoints serve reliably.
pub const DEFAULT_CHUNK_SIZE: u64 = 50_000;

/// Pause between consecutive chunks in milliseconds
pub const DEFAULT_PAUSE_MS: u64 = 1000; // 1 second

/// First day requested by windowed runs when no start date is given
pub const DEFAULT_START_DATE: (i32, u32, u32) = (2001, 1, 1);

/// Everything the orchestrator needs to know about one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Run mode
    pub mode: Mode,
    /// First day (inclusive); required by windowed modes, a filter in full mode
    pub start: Option<NaiveDate>,
    /// Last day (inclusive); required by windowed modes, a filter in full mode
    pub end: Option<NaiveDate>,
    /// Output root directory
    pub out_root: PathBuf,
    /// Requested data format
    pub out_format: OutputFormat,
    /// Rows per page / chunk
    pub chunk_size: u64,
    /// Stop a window once this many chunks exist for it
    pub max_chunks: Option<u64>,
    /// Verbatim `$select` list
    pub select: Option<String>,
    /// File layout under the output root
    pub layout: Layout,
    /// Probe each window's row count first and skip empty windows
    pub preflight: bool,
    /// Optional `$order` clause for stable pagination
    pub order: Option<String>,
    /// Column the date predicates target
    pub date_column: String,
    /// Sleep after every committed chunk
    pub pause_between_chunks: Duration,
}

impl RunSettings {
    /// Settings with defaults; the layout is inferred from the root and mode
    pub fn new(mode: Mode, out_root: impl Into<PathBuf>) -> Self {
        let out_root = out_root.into();
        let layout = Layout::infer(&out_root, mode);
        Self {
            mode,
            start: None,
            end: None,
            out_root,
            out_format: OutputFormat::Csv,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunks: None,
            select: None,
            layout,
            preflight: false,
            order: None,
            date_column: DEFAULT_DATE_COLUMN.to_string(),
            pause_between_chunks: Duration::from_millis(DEFAULT_PAUSE_MS),
        }
    }

    /// Set both ends of the date range
    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Set the start date
    pub fn with_start(mut self, start: Option<NaiveDate>) -> Self {
        self.start = start;
        self
    }

    /// Set the end date
    pub fn with_end(mut self, end: Option<NaiveDate>) -> Self {
        self.end = end;
        self
    }

    /// Set the requested data format
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.out_format = format;
        self
    }

    /// Set rows per page
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the per-window chunk cap
    pub fn with_max_chunks(mut self, max_chunks: Option<u64>) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    /// Set the `$select` list
    pub fn with_select(mut self, select: Option<String>) -> Self {
        self.select = select;
        self
    }

    /// Override the inferred layout
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Enable or disable the preflight count
    pub fn with_preflight(mut self, preflight: bool) -> Self {
        self.preflight = preflight;
        self
    }

    /// Set the `$order` clause
    pub fn with_order(mut self, order: Option<String>) -> Self {
        self.order = order;
        self
    }

    /// Set the date column
    pub fn with_date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = column.into();
        self
    }

    /// Set the pause between chunks
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause_between_chunks = pause;
        self
    }

    /// Check the settings are consistent
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.chunk_size == 0 {
            return Err(DownloadError::InvalidConfig(
                "chunk size must be at least 1".to_string(),
            ));
        }
        if self.max_chunks == Some(0) {
            return Err(DownloadError::InvalidConfig(
                "max chunks must be at least 1 when set".to_string(),
            ));
        }
        if self.date_column.trim().is_empty() {
            return Err(DownloadError::InvalidConfig(
                "date column must not be empty".to_string(),
            ));
        }
        if self.mode.requires_date_range() && (self.start.is_none() || self.end.is_none()) {
            return Err(DownloadError::InvalidConfig(format!(
                "{} mode requires both a start and an end date",
                self.mode
            )));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(DownloadError::InvalidConfig(format!(
                    "start date {start} is after end date {end}"
                )));
            }
        }
        Ok(())
    }

    /// Offset of a zero-based chunk index
    pub fn offset_of(&self, chunk_index: u64) -> u64 {
        chunk_index.saturating_mul(self.chunk_size)
    }
}
