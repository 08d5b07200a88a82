//! Per-window reports and the run summary

use crate::{DateWindow, WindowKey};
use serde::Serialize;

/// Why a window's page loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStop {
    /// An empty page came back; the window is complete
    Exhausted,
    /// The chunk cap was reached
    MaxChunks,
    /// The stop signal was observed before the next request
    Interrupted,
}

/// Outcome of one single-window pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowReport {
    /// Key the chunks were written under
    pub key: WindowKey,
    /// Date bounds, for windowed runs
    pub window: Option<DateWindow>,
    /// Chunks already on disk when the pass started
    pub resumed_from: u64,
    /// Chunks committed by this pass
    pub chunks_written: u64,
    /// Rows committed by this pass
    pub rows_written: u64,
    /// Terminal state of the page loop
    pub stop: WindowStop,
}

impl WindowReport {
    /// Report for a pass that has not fetched anything yet
    pub fn new(key: WindowKey, window: Option<DateWindow>, resumed_from: u64) -> Self {
        Self {
            key,
            window,
            resumed_from,
            chunks_written: 0,
            rows_written: 0,
            stop: WindowStop::Exhausted,
        }
    }

    /// Whether the pass ran to a normal end
    pub fn is_complete(&self) -> bool {
        self.stop != WindowStop::Interrupted
    }
}

/// Totals for a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Windows whose page loop ended normally
    pub windows_completed: u64,
    /// Windows skipped because preflight counted zero rows
    pub windows_skipped: u64,
    /// Chunks committed
    pub chunks_written: u64,
    /// Rows committed
    pub rows_written: u64,
    /// Whether the run stopped early on the stop signal
    pub interrupted: bool,
}

impl RunSummary {
    /// Fold one window's report into the totals
    pub fn record(&mut self, report: &WindowReport) {
        self.chunks_written += report.chunks_written;
        self.rows_written += report.rows_written;
        if report.is_complete() {
            self.windows_completed += 1;
        } else {
            self.interrupted = true;
        }
    }
}
