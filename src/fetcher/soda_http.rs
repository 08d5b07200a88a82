//! SODA HTTP client
//!
//! Provides the single client used for all endpoint interactions:
//! - Default headers (`User-Agent`, optional `X-App-Token`)
//! - Retry on HTTP 429 with exponential backoff
//! - JSON array decoding into [`Record`]s
//! - `count(1)` preflight probe

use super::config::{calculate_backoff, HttpSettings, APP_TOKEN_HEADER};
use super::{
    FetcherError, FetcherResult, RawResponse, ReqwestTransport, Sleeper, TokioSleeper, Transport,
};
use crate::query::{count_params, QueryParams, DEFAULT_DATE_COLUMN};
use crate::{DateWindow, Record};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Longest error body kept in an [`FetcherError::HttpError`]
const MAX_ERROR_BODY: usize = 512;

/// Client for one SODA resource endpoint
pub struct SodaClient {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    endpoint: String,
    settings: HttpSettings,
    headers: HeaderMap,
}

impl SodaClient {
    /// Create a client backed by reqwest and tokio's timer
    pub fn new(endpoint: impl Into<String>, settings: HttpSettings) -> FetcherResult<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Self::with_transport(endpoint, settings, transport)
    }

    /// Create a client over a custom transport
    pub fn with_transport(
        endpoint: impl Into<String>,
        settings: HttpSettings,
        transport: Arc<dyn Transport>,
    ) -> FetcherResult<Self> {
        let headers = headers_with_token(&settings)?;
        Ok(Self {
            transport,
            sleeper: Arc::new(TokioSleeper),
            endpoint: endpoint.into(),
            settings,
            headers,
        })
    }

    /// Replace the sleeper used for backoff
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Resource URL this client targets
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Settings the client was built with
    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// Headers sent with every request
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Sleeper shared with callers that pace their own work
    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        Arc::clone(&self.sleeper)
    }

    /// GET `url` and decode the body as an array of records.
    ///
    /// HTTP 429 is retried up to `settings.retries` times, sleeping
    /// `2^attempt * base_backoff` before each retry; other non-2xx statuses,
    /// timeouts and network failures are returned immediately.
    pub async fn safe_request(&self, url: &str, params: &QueryParams) -> FetcherResult<Vec<Record>> {
        let response = self.get_with_retry(url, params).await?;
        serde_json::from_str::<Vec<Record>>(&response.body).map_err(|e| {
            FetcherError::ParseError(format!("Failed to deserialize response: {e}"))
        })
    }

    /// [`safe_request`](Self::safe_request) against the configured endpoint
    pub async fn fetch(&self, params: &QueryParams) -> FetcherResult<Vec<Record>> {
        self.safe_request(&self.endpoint, params).await
    }

    /// Published row count for a window via `count(1)`.
    ///
    /// An empty or malformed body counts as 0; request failures propagate.
    pub async fn probe_count(&self, date_column: &str, window: &DateWindow) -> FetcherResult<u64> {
        let params = count_params(date_column, window);
        let response = self.get_with_retry(&self.endpoint, &params).await?;
        let count = parse_count(&response.body);
        debug!(window = %window, count, "Preflight count");
        Ok(count)
    }

    /// Published row count for a single day on the default date column
    pub async fn probe_count_for_day(&self, date: NaiveDate) -> FetcherResult<u64> {
        self.probe_count(DEFAULT_DATE_COLUMN, &DateWindow::single(date))
            .await
    }

    async fn get_with_retry(&self, url: &str, params: &QueryParams) -> FetcherResult<RawResponse> {
        let max_attempts = self.settings.retries + 1;
        let mut attempt: u32 = 0;

        loop {
            let response = self
                .transport
                .get(url, params, &self.headers, self.settings.timeout)
                .await?;

            if response.is_success() {
                debug!("Request succeeded on attempt {}", attempt + 1);
                return Ok(response);
            }

            if response.status != 429 {
                return Err(FetcherError::HttpError {
                    status: response.status,
                    body: truncate(&response.body, MAX_ERROR_BODY),
                });
            }

            if attempt >= self.settings.retries {
                return Err(FetcherError::RateLimited {
                    attempts: attempt + 1,
                });
            }

            let backoff = calculate_backoff(self.settings.base_backoff, attempt);
            warn!(
                "429 rate limited on attempt {}/{}; sleeping {:?}",
                attempt + 1,
                max_attempts,
                backoff
            );
            self.sleeper.sleep(backoff).await;
            attempt += 1;
        }
    }
}

/// Default headers: always a `User-Agent`, plus `X-App-Token` when configured
pub fn headers_with_token(settings: &HttpSettings) -> FetcherResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let agent = HeaderValue::from_str(&settings.user_agent)
        .map_err(|e| FetcherError::InvalidConfig(format!("Invalid user agent: {e}")))?;
    headers.insert(USER_AGENT, agent);

    match &settings.app_token {
        Some(token) => {
            let value = HeaderValue::from_str(token)
                .map_err(|e| FetcherError::InvalidConfig(format!("Invalid app token: {e}")))?;
            headers.insert(HeaderName::from_static("x-app-token"), value);
            info!("Using app token for higher rate limits");
        }
        None => {
            warn!(
                "No app token configured; set SOC_APP_TOKEN for better throughput ({} header)",
                APP_TOKEN_HEADER
            );
        }
    }
    Ok(headers)
}

/// Extract the count from a `count(1)` response (`[{"count_1": "123"}]`)
fn parse_count(body: &str) -> u64 {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return 0,
    };
    let row = match value.as_array().and_then(|rows| rows.first()) {
        Some(serde_json::Value::Object(row)) => row,
        _ => return 0,
    };
    ["count_1", "count"]
        .iter()
        .find_map(|key| row.get(*key))
        .and_then(|v| match v {
            serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
            serde_json::Value::Number(n) => n.as_u64(),
            _ => None,
        })
        .unwrap_or(0)
}

fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}
