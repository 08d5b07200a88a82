//! HTTP access to the SODA endpoint
//!
//! [`SodaClient`] issues GET requests through a [`Transport`], retries HTTP 429
//! with exponential backoff (sleeping through a [`Sleeper`]), and decodes the
//! JSON array body into loosely-typed [`Record`](crate::Record)s.
//!
//! The two traits are the seams tests use to script responses and observe
//! backoff without touching the network or the clock.

use crate::query::QueryParams;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::time::Duration;

pub mod config;
pub mod soda_http;
pub mod transport;

pub use config::{calculate_backoff, resolve_app_token, HttpSettings};
pub use soda_http::SodaClient;
pub use transport::ReqwestTransport;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// HTTP 429 persisted past the retry budget
    #[error("rate limited: HTTP 429 persisted after {attempts} attempt(s)")]
    RateLimited {
        /// Total attempts made, including the first
        attempts: u32,
    },

    /// Any other non-2xx status
    #[error("HTTP error {status}: {body}")]
    HttpError {
        /// Response status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// The request exceeded the configured timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure (DNS, refused, reset)
    #[error("network error: {0}")]
    NetworkError(String),

    /// Body was not a JSON array of objects
    #[error("parse error: {0}")]
    ParseError(String),

    /// Invalid client configuration (e.g. a header value)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Status and body of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl RawResponse {
    /// Build a response from a status and body
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one GET request. Implementations never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a GET to `url` with the given query, headers and timeout.
    ///
    /// Non-2xx statuses are returned as `Ok`; only transport failures are errors
    /// (`Timeout` when the deadline elapsed, `NetworkError` otherwise).
    async fn get(
        &self,
        url: &str,
        params: &QueryParams,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> FetcherResult<RawResponse>;
}

/// Suspends the current task; used for backoff and inter-chunk pauses
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleep for `duration`
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
