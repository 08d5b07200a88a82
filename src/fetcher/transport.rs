//! reqwest-backed [`Transport`]

use super::{FetcherError, FetcherResult, RawResponse, Transport};
use crate::query::QueryParams;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Production transport using a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport with a fresh client
    pub fn new() -> FetcherResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| FetcherError::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> FetcherError {
    if err.is_timeout() {
        FetcherError::Timeout(timeout)
    } else {
        FetcherError::NetworkError(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        params: &QueryParams,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> FetcherResult<RawResponse> {
        debug!("Making GET request to: {} with {} params", url, params.len());

        let response = self
            .client
            .get(url)
            .query(params)
            .headers(headers.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| classify(e, timeout))?;
        Ok(RawResponse { status, body })
    }
}
