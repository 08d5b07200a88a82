//! Download orchestration
//!
//! # Overview
//!
//! A run is either one offset pagination pass over the whole dataset (`full`
//! mode) or one pass per date window (`daily`, `weekly`, `monthly`):
//!
//! 1. **Settings**: [`config::RunSettings`] carries everything the core needs
//! 2. **Execution**: [`executor::DownloadExecutor`] drives the page loop
//! 3. **Reporting**: [`job::WindowReport`] per window, [`job::RunSummary`] per run
//!
//! Each window resumes from the chunk files already on disk, requests pages
//! of `chunk_size` rows until an empty page comes back, and commits every
//! non-empty page as one chunk. Windows and pages are processed strictly in
//! order, one request at a time.
//!
//! # Quick Start
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
//! let settings = RunSettings::new(Mode::Full, "data/raw").with_max_chunks(Some(3));
//! let summary = DownloadExecutor::new(client, settings, StopSignal::new()).run().await?;
//! assert!(summary.chunks_written <= 3);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Every failure terminates the run and is returned as a [`DownloadError`].
//! Chunks committed before the failure stay on disk and a rerun with the same
//! settings resumes after them.

pub mod config;
pub mod executor;
pub mod job;

pub use config::RunSettings;
pub use executor::DownloadExecutor;
pub use job::{RunSummary, WindowReport, WindowStop};

use crate::fetcher::FetcherError;
use crate::output::OutputError;
use crate::query::QueryError;
use crate::resume::ResumeError;

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Request failed (rate limit exhausted, HTTP error, timeout, network, parse)
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Data or manifest write failed
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Resume scan failed
    #[error("resume error: {0}")]
    ResumeError(#[from] ResumeError),

    /// Date parsing failed
    #[error("query error: {0}")]
    QueryError(#[from] QueryError),

    /// Settings are inconsistent
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
