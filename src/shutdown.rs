//! Cooperative stop signal.
//!
//! A [`StopSignal`] is created at the CLI boundary, handed to the executor, and
//! set from the Ctrl+C handler. The executor polls it between chunks and
//! between windows only, so an in-flight request or a chunk being written is
//! always allowed to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation token; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create a token in the "running" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent; returns `true` only for the first request.
    pub fn request_stop(&self) -> bool {
        !self.requested.swap(true, Ordering::SeqCst)
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
