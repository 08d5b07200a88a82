//! End-to-end windowed runs against the fake endpoint

use crate::support::fake_backend::{
    client, count_body, is_count, list_files, offset_of, rows_body, FakeBackend, RecordingSleeper,
};
use chrono::NaiveDate;
use socrata_downloader::downloader::{DownloadError, DownloadExecutor, RunSettings};
use socrata_downloader::fetcher::{FetcherError, RawResponse};
use socrata_downloader::output::{read_manifest, ChunkManifest, OutputFormat};
use socrata_downloader::shutdown::StopSignal;
use socrata_downloader::Mode;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn daily(root: &Path, start: NaiveDate, end: NaiveDate) -> RunSettings {
    RunSettings::new(Mode::Daily, root)
        .with_date_range(start, end)
        .with_pause(Duration::ZERO)
}

#[tokio::test]
async fn test_single_day_single_chunk() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::paged(50_000, vec![1024], 1024);
    let sleeper = RecordingSleeper::new();
    let settings = daily(dir.path(), date(2020, 1, 10), date(2020, 1, 10));

    let summary = DownloadExecutor::new(client(backend.clone(), sleeper), settings, StopSignal::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.chunks_written, 1);
    assert_eq!(summary.rows_written, 1024);
    assert_eq!(summary.windows_completed, 1);
    assert!(!summary.interrupted);
    assert_eq!(
        list_files(dir.path()),
        vec![
            "daily/2020-01-10/2020-01-10_chunk_0001.csv",
            "daily/2020-01-10/2020-01-10_chunk_0001.manifest.json",
        ]
    );

    let window_dir = dir.path().join("daily/2020-01-10");
    let manifest: ChunkManifest = read_manifest(&window_dir.join("2020-01-10_chunk_0001.manifest.json")).unwrap();
    assert_eq!(manifest.rows, 1024);
    assert_eq!(manifest.chunk, 1);
    assert_eq!(manifest.data_file, "2020-01-10_chunk_0001.csv");
    assert_eq!(manifest.params["$offset"], "0");
    assert_eq!(manifest.params["$limit"], "50000");
    assert_eq!(
        manifest.params["$where"],
        "date >= '2020-01-10T00:00:00' AND date <= '2020-01-10T23:59:59'"
    );
    assert_eq!(manifest.window_start, Some(date(2020, 1, 10)));
    assert_eq!(manifest.window_end, Some(date(2020, 1, 10)));
    assert_eq!(manifest.format, OutputFormat::Csv);

    let csv = std::fs::read_to_string(window_dir.join("2020-01-10_chunk_0001.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("id,date,primary_type,arrest"));
    assert_eq!(lines.count(), 1024);

    // Two page requests: the data page, then the empty terminating page
    assert_eq!(backend.page_offsets(), vec![0, 50_000]);
    assert_eq!(backend.count_probes(), 0);
}

#[tokio::test]
async fn test_single_day_two_full_chunks() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::paged(50_000, vec![50_000, 50_000], 100_000);
    let sleeper = RecordingSleeper::new();
    let settings = daily(dir.path(), date(2020, 1, 10), date(2020, 1, 10));

    let summary = DownloadExecutor::new(client(backend.clone(), sleeper), settings, StopSignal::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.chunks_written, 2);
    assert_eq!(summary.rows_written, 100_000);
    assert_eq!(backend.page_offsets(), vec![0, 50_000, 100_000]);

    let files = list_files(dir.path());
    assert!(files.contains(&"daily/2020-01-10/2020-01-10_chunk_0001.csv".to_string()));
    assert!(files.contains(&"daily/2020-01-10/2020-01-10_chunk_0002.csv".to_string()));
    assert_eq!(files.len(), 4);

    let second: ChunkManifest =
        read_manifest(&dir.path().join("daily/2020-01-10/2020-01-10_chunk_0002.manifest.json")).unwrap();
    assert_eq!(second.rows, 50_000);
    assert_eq!(second.chunk, 2);
    assert_eq!(second.params["$offset"], "50000");
}

#[tokio::test]
async fn test_preflight_skips_empty_day() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::paged(50_000, vec![], 0);
    let sleeper = RecordingSleeper::new();
    let settings = daily(dir.path(), date(2020, 1, 11), date(2020, 1, 11)).with_preflight(true);

    let summary = DownloadExecutor::new(client(backend.clone(), sleeper), settings, StopSignal::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.windows_skipped, 1);
    assert_eq!(summary.windows_completed, 0);
    assert_eq!(summary.chunks_written, 0);
    assert_eq!(backend.count_probes(), 1);
    assert!(backend.page_offsets().is_empty());
    assert!(!dir.path().join("daily").exists());
    assert!(list_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_preflight_skips_empty_day_then_continues() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new(|params, _| {
        let clause = params.get("$where").cloned().unwrap_or_default();
        if is_count(params) {
            let count = if clause.contains("2020-01-11") { 0 } else { 3 };
            return Ok(count_body(count));
        }
        match offset_of(params) {
            Some(0) => Ok(RawResponse::new(200, rows_body(3, 0))),
            _ => Ok(RawResponse::new(200, "[]")),
        }
    });
    let settings = daily(dir.path(), date(2020, 1, 11), date(2020, 1, 12)).with_preflight(true);

    let summary = DownloadExecutor::new(client(backend.clone(), RecordingSleeper::new()), settings, StopSignal::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.windows_skipped, 1);
    assert_eq!(summary.windows_completed, 1);
    assert_eq!(summary.chunks_written, 1);
    assert_eq!(backend.calls().iter().filter(|p| is_count(p)).count(), 2);
    assert!(!dir.path().join("daily/2020-01-11").exists());
    assert!(dir.path().join("daily/2020-01-12/2020-01-12_chunk_0001.csv").is_file());
    assert_eq!(
        list_files(dir.path()),
        vec![
            "daily/2020-01-12/2020-01-12_chunk_0001.csv",
            "daily/2020-01-12/2020-01-12_chunk_0001.manifest.json",
        ]
    );
}

#[tokio::test]
async fn test_preflight_probe_covers_whole_window() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::paged(50_000, vec![10], 10);
    let sleeper = RecordingSleeper::new();
    let settings = RunSettings::new(Mode::Monthly, dir.path())
        .with_date_range(date(2020, 2, 10), date(2020, 2, 20))
        .with_preflight(true)
        .with_pause(Duration::ZERO);

    DownloadExecutor::new(client(backend.clone(), sleeper), settings, StopSignal::new())
        .run()
        .await
        .unwrap();

    let calls = backend.calls();
    assert_eq!(calls[0]["$select"], "count(1)");
    assert_eq!(
        calls[0]["$where"],
        "date >= '2020-02-10T00:00:00' AND date <= '2020-02-20T23:59:59'"
    );
    assert!(dir
        .path()
        .join("monthly/2020-02-10/2020-02-10_chunk_0001.csv")
        .is_file());
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new(|_, call| match call {
        0 | 1 => Ok(RawResponse::new(429, "slow down")),
        2 => Ok(RawResponse::new(200, rows_body(5, 0))),
        _ => Ok(RawResponse::new(200, "[]")),
    });
    let sleeper = RecordingSleeper::new();
    let settings = daily(dir.path(), date(2020, 1, 10), date(2020, 1, 10));

    let summary = DownloadExecutor::new(client(backend.clone(), sleeper.clone()), settings, StopSignal::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.chunks_written, 1);
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(1), Duration::from_secs(2)]);
    assert_eq!(backend.page_offsets(), vec![0, 0, 0, 50_000]);
    assert_eq!(
        list_files(dir.path()),
        vec![
            "daily/2020-01-10/2020-01-10_chunk_0001.csv",
            "daily/2020-01-10/2020-01-10_chunk_0001.manifest.json",
        ]
    );
}

#[tokio::test]
async fn test_rate_limit_exhausted_fails_run() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new(|_, _| Ok(RawResponse::new(429, "")));
    let sleeper = RecordingSleeper::new();
    let settings = daily(dir.path(), date(2020, 1, 10), date(2020, 1, 10));

    let result = DownloadExecutor::new(client(backend.clone(), sleeper.clone()), settings, StopSignal::new())
        .run()
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::FetcherError(FetcherError::RateLimited { attempts: 5 }))
    ));
    assert_eq!(backend.calls().len(), 5);
    assert_eq!(
        sleeper.sleeps(),
        vec![1, 2, 4, 8].into_iter().map(Duration::from_secs).collect::<Vec<_>>()
    );
    assert!(list_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_http_error_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new(|_, _| Ok(RawResponse::new(500, "boom")));
    let sleeper = RecordingSleeper::new();
    let settings = daily(dir.path(), date(2020, 1, 10), date(2020, 1, 12));

    let result = DownloadExecutor::new(client(backend.clone(), sleeper.clone()), settings, StopSignal::new())
        .run()
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::FetcherError(FetcherError::HttpError { status: 500, .. }))
    ));
    assert_eq!(backend.calls().len(), 1);
    assert!(sleeper.sleeps().is_empty());
}

#[tokio::test]
async fn test_windows_processed_in_order() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::paged(1000, vec![3], 3);
    let sleeper = RecordingSleeper::new();
    let settings = daily(dir.path(), date(2020, 1, 30), date(2020, 2, 2)).with_chunk_size(1000);

    let summary = DownloadExecutor::new(client(backend.clone(), sleeper), settings, StopSignal::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.windows_completed, 4);
    assert_eq!(summary.chunks_written, 4);

    let days: Vec<String> = backend
        .calls()
        .iter()
        .filter(|p| p["$offset"] == "0")
        .map(|p| p["$where"][9..19].to_string())
        .collect();
    assert_eq!(days, vec!["2020-01-30", "2020-01-31", "2020-02-01", "2020-02-02"]);
}

#[tokio::test]
async fn test_weekly_windows_use_week_start_keys() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::paged(50_000, vec![1], 1);
    let sleeper = RecordingSleeper::new();
    let settings = RunSettings::new(Mode::Weekly, dir.path())
        .with_date_range(date(2020, 1, 1), date(2020, 1, 12))
        .with_pause(Duration::ZERO);

    DownloadExecutor::new(client(backend, sleeper), settings, StopSignal::new())
        .run()
        .await
        .unwrap();

    // 2020-01-01 is a Wednesday: the first window is clipped to it
    let files = list_files(dir.path());
    assert!(files.contains(&"weekly/2020-01-01/2020-01-01_chunk_0001.csv".to_string()));
    assert!(files.contains(&"weekly/2020-01-06/2020-01-06_chunk_0001.csv".to_string()));
    assert_eq!(files.len(), 4);
}

#[tokio::test]
async fn test_pause_between_chunks_uses_sleeper() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::paged(2, vec![2, 2, 1], 5);
    let sleeper = RecordingSleeper::new();
    let settings = daily(dir.path(), date(2020, 1, 10), date(2020, 1, 10))
        .with_chunk_size(2)
        .with_pause(Duration::from_millis(250));

    let summary = DownloadExecutor::new(client(backend, sleeper.clone()), settings, StopSignal::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.chunks_written, 3);
    assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(250); 3]);
}

#[tokio::test]
async fn test_max_chunks_caps_each_window() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::paged(10, vec![10, 10, 10, 10], 40);
    let sleeper = RecordingSleeper::new();
    let settings = daily(dir.path(), date(2020, 1, 10), date(2020, 1, 11))
        .with_chunk_size(10)
        .with_max_chunks(Some(2));

    let summary = DownloadExecutor::new(client(backend.clone(), sleeper), settings, StopSignal::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.windows_completed, 2);
    assert_eq!(summary.chunks_written, 4);
    assert_eq!(backend.page_offsets(), vec![0, 10, 0, 10]);
    assert!(dir.path().join("daily/2020-01-11/2020-01-11_chunk_0002.csv").is_file());
    assert!(!dir.path().join("daily/2020-01-11/2020-01-11_chunk_0003.csv").exists());
}

#[tokio::test]
async fn test_interrupt_keeps_committed_chunks() {
    let dir = TempDir::new().unwrap();
    let stop = StopSignal::new();
    let trigger = stop.clone();
    // The stop arrives while the first page is in flight; that chunk still lands
    let backend = FakeBackend::new(move |_, call| {
        if call == 0 {
            trigger.request_stop();
            Ok(RawResponse::new(200, rows_body(3, 0)))
        } else {
            Ok(RawResponse::new(200, rows_body(3, 3)))
        }
    });
    let sleeper = RecordingSleeper::new();
    let settings = daily(dir.path(), date(2020, 1, 10), date(2020, 1, 12));

    let summary = DownloadExecutor::new(client(backend.clone(), sleeper), settings, stop)
        .run()
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.chunks_written, 1);
    assert_eq!(summary.windows_completed, 0);
    assert_eq!(backend.calls().len(), 1);
    assert_eq!(
        list_files(dir.path()),
        vec![
            "daily/2020-01-10/2020-01-10_chunk_0001.csv",
            "daily/2020-01-10/2020-01-10_chunk_0001.manifest.json",
        ]
    );
}

#[tokio::test]
async fn test_malformed_count_treated_as_zero() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new(|_, _| Ok(RawResponse::new(200, "not json")));
    let sleeper = RecordingSleeper::new();
    let settings = daily(dir.path(), date(2020, 1, 10), date(2020, 1, 10)).with_preflight(true);

    let summary = DownloadExecutor::new(client(backend.clone(), sleeper), settings, StopSignal::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.windows_skipped, 1);
    assert_eq!(backend.calls().len(), 1);
}
