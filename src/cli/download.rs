//! Download command implementation

use crate::downloader::config::{DEFAULT_CHUNK_SIZE, DEFAULT_START_DATE};
use crate::downloader::{DownloadExecutor, RunSettings, RunSummary};
use crate::fetcher::config::{
    default_user_agent, resolve_app_token, DEFAULT_BACKOFF_MS, DEFAULT_ENDPOINT, DEFAULT_RETRIES,
    DEFAULT_TIMEOUT_SECS,
};
use crate::fetcher::{HttpSettings, SodaClient};
use crate::output::{Layout, OutputFormat};
use crate::query::{parse_date, DEFAULT_DATE_COLUMN};
use crate::shutdown::StopSignal;
use crate::Mode;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::{CliError, MaterializeArgs, VerifyArgs};

/// Resumable, chunked downloader for Socrata (SODA) datasets
#[derive(Parser, Debug)]
#[command(name = "socrata-downloader", version, about, long_about = None)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Also write logs to this file (parent directories are created)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Emit JSON logs (same as LOG_FORMAT=json)
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a dataset in chunks, resuming after existing chunks
    Download(DownloadArgs),

    /// Check downloaded chunks against their manifests
    Verify(VerifyArgs),

    /// Load downloaded chunks and manifests into a DuckDB database
    Materialize(MaterializeArgs),
}

/// Download command arguments
#[derive(Parser, Debug, Clone)]
pub struct DownloadArgs {
    /// full: single $offset run; monthly/weekly/daily: one run per date window
    #[arg(long, default_value = "full")]
    pub mode: Mode,

    /// First day (YYYY-MM-DD); windowed modes default to 2001-01-01
    #[arg(long)]
    pub start_date: Option<String>,

    /// Last day (YYYY-MM-DD); windowed modes default to today (UTC)
    #[arg(long)]
    pub end_date: Option<String>,

    /// Root output directory
    #[arg(long, default_value = "data/raw")]
    pub out_root: PathBuf,

    /// Output file format (csv or parquet)
    #[arg(long, default_value = "csv")]
    pub out_format: OutputFormat,

    /// Rows per chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u64,

    /// Stop each window once this many chunks exist for it
    #[arg(long)]
    pub max_chunks: Option<u64>,

    /// Comma-separated columns to project at source
    #[arg(long)]
    pub select: Option<String>,

    /// Text file with one column name per line (wins over --select)
    #[arg(long)]
    pub columns_file: Option<PathBuf>,

    /// nested, mode-flat, flat or ymd; inferred from --out-root when omitted
    #[arg(long)]
    pub layout: Option<Layout>,

    /// Probe each window's row count first and skip empty windows
    #[arg(long, default_value_t = false)]
    pub preflight: bool,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub http_timeout: u64,

    /// Retries after HTTP 429
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    pub max_retries: u32,

    /// Base backoff in seconds; retry n waits 2^n times this
    #[arg(long, default_value_t = DEFAULT_BACKOFF_MS as f64 / 1000.0)]
    pub backoff: f64,

    /// Seconds to sleep between successful chunks
    #[arg(long, default_value_t = 1.0)]
    pub sleep: f64,

    /// User-Agent header value
    #[arg(long)]
    pub user_agent: Option<String>,

    /// SODA resource endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Optional $order clause for stable pagination (e.g. ":id")
    #[arg(long)]
    pub order: Option<String>,

    /// Column the date predicates target
    #[arg(long, default_value = DEFAULT_DATE_COLUMN)]
    pub date_column: String,
}

impl DownloadArgs {
    /// Run the download and return its summary
    pub async fn execute(&self, stop: StopSignal) -> Result<RunSummary, CliError> {
        let token = resolve_app_token(|name| std::env::var(name).ok());
        let http = self.http_settings(token)?;
        let settings = self.run_settings(Utc::now().date_naive())?;

        info!(endpoint = %self.endpoint, "Connecting to SODA endpoint");
        let client = SodaClient::new(self.endpoint.clone(), http)?;
        let executor = DownloadExecutor::new(client, settings, stop);
        Ok(executor.run().await?)
    }

    /// HTTP settings from the flags plus an already-resolved app token
    pub fn http_settings(&self, app_token: Option<String>) -> Result<HttpSettings, CliError> {
        Ok(HttpSettings {
            timeout: Duration::from_secs(self.http_timeout),
            retries: self.max_retries,
            base_backoff: seconds("--backoff", self.backoff)?,
            user_agent: self.user_agent.clone().unwrap_or_else(default_user_agent),
            app_token: None,
        }
        .with_app_token(app_token))
    }

    /// Run settings from the flags; `today` is the default end of windowed runs
    pub fn run_settings(&self, today: NaiveDate) -> Result<RunSettings, CliError> {
        let start = self.start_date.as_deref().map(parse_date).transpose()?;
        let end = self.end_date.as_deref().map(parse_date).transpose()?;

        let (start, end) = if self.mode.requires_date_range() {
            let (y, m, d) = DEFAULT_START_DATE;
            let default_start = NaiveDate::from_ymd_opt(y, m, d)
                .ok_or_else(|| CliError::ConfigurationError("invalid default start date".to_string()))?;
            (Some(start.unwrap_or(default_start)), Some(end.unwrap_or(today)))
        } else {
            (start, end)
        };

        let mut settings = RunSettings::new(self.mode, self.out_root.clone())
            .with_start(start)
            .with_end(end)
            .with_format(self.out_format)
            .with_chunk_size(self.chunk_size)
            .with_max_chunks(self.max_chunks)
            .with_select(load_select(self.select.as_deref(), self.columns_file.as_deref())?)
            .with_preflight(self.preflight)
            .with_order(self.order.clone().filter(|o| !o.trim().is_empty()))
            .with_date_column(self.date_column.clone())
            .with_pause(seconds("--sleep", self.sleep)?);
        if let Some(layout) = self.layout {
            settings = settings.with_layout(layout);
        }
        Ok(settings)
    }
}

/// Column projection from `--columns-file` or `--select`.
///
/// A columns file with at least one non-blank line wins; otherwise the
/// `--select` list is used. Both are normalized to a comma-joined list
/// without blanks, and an empty result means "all columns".
pub fn load_select(select: Option<&str>, columns_file: Option<&Path>) -> Result<Option<String>, CliError> {
    if let Some(path) = columns_file {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CliError::InvalidArgument(format!("Failed to read columns file {}: {e}", path.display()))
        })?;
        let columns: Vec<&str> = text.lines().map(str::trim).filter(|c| !c.is_empty()).collect();
        if !columns.is_empty() {
            return Ok(Some(columns.join(",")));
        }
    }

    Ok(select.and_then(|list| {
        let columns: Vec<&str> = list.split(',').map(str::trim).filter(|c| !c.is_empty()).collect();
        (!columns.is_empty()).then(|| columns.join(","))
    }))
}

fn seconds(flag: &str, value: f64) -> Result<Duration, CliError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| CliError::InvalidArgument(format!("{flag} must be a non-negative number of seconds: {e}")))
}
