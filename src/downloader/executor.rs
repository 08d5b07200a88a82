//! Download executor: the single-window page loop and the multi-window loop

use super::config::RunSettings;
use super::job::{RunSummary, WindowReport, WindowStop};
use super::DownloadError;
use crate::fetcher::SodaClient;
use crate::output::{commit_chunk, make_paths, ChunkContext};
use crate::query::{range_where, ChunkRequest};
use crate::resume::resume_index;
use crate::shutdown::StopSignal;
use crate::window::{Granularity, Windows};
use crate::{DateWindow, WindowKey};
use chrono::Utc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Drives one run: owns the client, the settings and the stop token
pub struct DownloadExecutor {
    client: SodaClient,
    settings: RunSettings,
    stop: StopSignal,
}

impl DownloadExecutor {
    /// Create an executor
    pub fn new(client: SodaClient, settings: RunSettings, stop: StopSignal) -> Self {
        Self {
            client,
            settings,
            stop,
        }
    }

    /// Settings of this run
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Validate the settings and run the configured mode to completion,
    /// interruption or the first error
    pub async fn run(&self) -> Result<RunSummary, DownloadError> {
        self.settings.validate()?;
        let settings = &self.settings;

        info!(
            mode = %settings.mode,
            root = %settings.out_root.display(),
            layout = %settings.layout,
            format = %settings.out_format,
            chunk_size = settings.chunk_size,
            "Starting download run"
        );

        let summary = match Granularity::for_mode(settings.mode) {
            None => {
                let key = WindowKey::for_full_run(settings.start, settings.end);
                let filter = range_where(&settings.date_column, settings.start, settings.end);
                if let Some(filter) = &filter {
                    info!(filter = %filter, "Full run restricted to date range");
                }
                let report = self.run_offset_mode(&key, None, filter).await?;
                let mut summary = RunSummary::default();
                summary.record(&report);
                summary
            }
            Some(granularity) => {
                let (start, end) = match (settings.start, settings.end) {
                    (Some(start), Some(end)) => (start, end),
                    _ => {
                        return Err(DownloadError::InvalidConfig(format!(
                            "{} mode requires both a start and an end date",
                            settings.mode
                        )))
                    }
                };
                self.run_windowed_mode(Windows::new(start, end, granularity))
                    .await?
            }
        };

        info!(
            windows_completed = summary.windows_completed,
            windows_skipped = summary.windows_skipped,
            chunks_written = summary.chunks_written,
            rows_written = summary.rows_written,
            interrupted = summary.interrupted,
            "Download run finished"
        );
        Ok(summary)
    }

    /// Paginate one window (or the whole dataset) with `$offset` / `$limit`.
    ///
    /// Starts after the chunks already on disk for `key`. Before each request
    /// the stop signal and the chunk cap are checked; an empty page ends the
    /// loop. `window` scopes the requests to its dates; otherwise `filter` is
    /// used as the `$where` clause when given.
    pub async fn run_offset_mode(
        &self,
        key: &WindowKey,
        window: Option<DateWindow>,
        filter: Option<String>,
    ) -> Result<WindowReport, DownloadError> {
        let span = info_span!("window", key = %key);
        self.offset_loop(key, window, filter).instrument(span).await
    }

    async fn offset_loop(
        &self,
        key: &WindowKey,
        window: Option<DateWindow>,
        filter: Option<String>,
    ) -> Result<WindowReport, DownloadError> {
        let settings = &self.settings;
        let start_index = resume_index(key, settings.layout, settings.mode, &settings.out_root)?;
        let mut report = WindowReport::new(key.clone(), window, start_index);
        let mut chunk_index = start_index;

        match window {
            Some(w) => info!(window = %w, existing_chunks = start_index, "Window started"),
            None => info!(existing_chunks = start_index, "Offset run started"),
        }

        loop {
            if self.stop.is_stop_requested() {
                warn!(chunk = chunk_index + 1, "Stop requested; ending before next request");
                report.stop = WindowStop::Interrupted;
                break;
            }
            if let Some(max) = settings.max_chunks {
                if chunk_index >= max {
                    info!(max_chunks = max, "Reached max chunks");
                    report.stop = WindowStop::MaxChunks;
                    break;
                }
            }

            let request = self.chunk_request(chunk_index, window, filter.as_deref());
            let params = request.to_params();
            let started_at = Utc::now();
            info!(offset = request.offset, limit = request.limit, "Fetching page");

            let rows = self.client.fetch(&params).await?;
            if rows.is_empty() {
                info!(offset = request.offset, "No more data");
                report.stop = WindowStop::Exhausted;
                break;
            }

            let paths = make_paths(
                key,
                chunk_index,
                settings.layout,
                settings.mode,
                settings.out_format,
                &settings.out_root,
            );
            let context = ChunkContext {
                chunk_index,
                params: &params,
                endpoint: self.client.endpoint(),
                window,
                started_at,
                format: settings.out_format,
            };
            let chunk = commit_chunk(&rows, &paths, &context)?;
            if chunk.manifest.fell_back() {
                warn!(
                    path = %chunk.data_path.display(),
                    "Requested {} but wrote {}",
                    chunk.manifest.requested_format,
                    chunk.manifest.format
                );
            }

            report.chunks_written += 1;
            report.rows_written += rows.len() as u64;
            chunk_index += 1;

            if !settings.pause_between_chunks.is_zero() {
                debug!(pause = ?settings.pause_between_chunks, "Pausing between chunks");
                self.client
                    .sleeper()
                    .sleep(settings.pause_between_chunks)
                    .await;
            }
        }

        Ok(report)
    }

    /// Run the page loop for each window in order.
    ///
    /// With preflight enabled a window whose `count(1)` is zero is skipped
    /// before anything is created for it. The stop signal is checked before
    /// each window; chunks of finished windows are kept.
    pub async fn run_windowed_mode<I>(&self, windows: I) -> Result<RunSummary, DownloadError>
    where
        I: IntoIterator<Item = DateWindow>,
    {
        let settings = &self.settings;
        let mut summary = RunSummary::default();

        for window in windows {
            if self.stop.is_stop_requested() {
                warn!(next_window = %window, "Stop requested; not starting further windows");
                summary.interrupted = true;
                break;
            }

            if settings.preflight {
                let count = self.client.probe_count(&settings.date_column, &window).await?;
                info!(window = %window, published_rows = count, "Preflight count");
                if count == 0 {
                    info!(window = %window, "Skipping window with no published rows");
                    summary.windows_skipped += 1;
                    continue;
                }
            }

            let key = WindowKey::Date(window.start());
            let report = self.run_offset_mode(&key, Some(window), None).await?;
            summary.record(&report);
            if !report.is_complete() {
                break;
            }
        }

        Ok(summary)
    }

    fn chunk_request(
        &self,
        chunk_index: u64,
        window: Option<DateWindow>,
        filter: Option<&str>,
    ) -> ChunkRequest {
        let settings = &self.settings;
        ChunkRequest {
            offset: settings.offset_of(chunk_index),
            limit: settings.chunk_size,
            select: settings.select.clone(),
            window,
            filter: filter.map(str::to_string),
            order: settings.order.clone(),
            date_column: settings.date_column.clone(),
        }
    }
}
