//! In-process SODA endpoint: scripted responses, recorded requests and sleeps

#![allow(dead_code)]

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::json;
use socrata_downloader::fetcher::{FetcherResult, HttpSettings, RawResponse, Sleeper, SodaClient, Transport};
use socrata_downloader::query::QueryParams;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Decides the response for a request; gets the params and the 0-based call number
type Responder = dyn Fn(&QueryParams, usize) -> FetcherResult<RawResponse> + Send + Sync;

/// Fake [`Transport`] driven by a closure
pub struct FakeBackend {
    responder: Box<Responder>,
    calls: Mutex<Vec<QueryParams>>,
}

impl FakeBackend {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&QueryParams, usize) -> FetcherResult<RawResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Serve pages by offset: `pages[i]` rows for the i-th page of `chunk_size`,
    /// an empty array past the end. Count probes answer with `count`.
    pub fn paged(chunk_size: u64, pages: Vec<usize>, count: u64) -> Arc<Self> {
        Self::new(move |params, _| {
            if is_count(params) {
                return Ok(count_body(count));
            }
            let page = offset_of(params).unwrap_or(0) / chunk_size;
            let rows = pages.get(page as usize).copied().unwrap_or(0);
            Ok(RawResponse::new(200, rows_body(rows, page as usize * chunk_size as usize)))
        })
    }

    /// Every request seen so far
    pub fn calls(&self) -> Vec<QueryParams> {
        self.calls.lock().unwrap().clone()
    }

    /// `$offset` of every page request, in order
    pub fn page_offsets(&self) -> Vec<u64> {
        self.calls().iter().filter_map(offset_of).collect()
    }

    /// Number of `count(1)` probes
    pub fn count_probes(&self) -> usize {
        self.calls().iter().filter(|p| is_count(p)).count()
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn get(
        &self,
        _url: &str,
        params: &QueryParams,
        _headers: &HeaderMap,
        _timeout: Duration,
    ) -> FetcherResult<RawResponse> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(params.clone());
            calls.len() - 1
        };
        (self.responder)(params, call)
    }
}

/// Sleeper that returns immediately and records what it was asked to do
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Client over the fake backend with default settings (4 retries, 1 s base backoff)
pub fn client(backend: Arc<FakeBackend>, sleeper: Arc<RecordingSleeper>) -> SodaClient {
    SodaClient::with_transport(
        "https://data.example.org/resource/abcd-1234.json",
        HttpSettings::default(),
        backend,
    )
    .unwrap()
    .with_sleeper(sleeper)
}

pub fn offset_of(params: &QueryParams) -> Option<u64> {
    params.get("$offset").and_then(|o| o.parse().ok())
}

pub fn is_count(params: &QueryParams) -> bool {
    params.get("$select").map(String::as_str) == Some("count(1)")
}

/// JSON array of `n` crime-like rows with ids starting at `first_id`
pub fn rows_body(n: usize, first_id: usize) -> String {
    let rows: Vec<serde_json::Value> = (first_id..first_id + n)
        .map(|id| {
            json!({
                "id": id.to_string(),
                "date": "2020-01-10T12:00:00.000",
                "primary_type": "THEFT",
                "arrest": false,
            })
        })
        .collect();
    serde_json::Value::Array(rows).to_string()
}

pub fn count_body(count: u64) -> RawResponse {
    RawResponse::new(200, json!([{ "count_1": count.to_string() }]).to_string())
}

/// Regular files under `dir`, recursively, as paths relative to `dir`
pub fn list_files(dir: &std::path::Path) -> Vec<String> {
    let mut out = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if let Ok(rel) = path.strip_prefix(dir) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    out.sort();
    out
}
