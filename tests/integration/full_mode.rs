//! Full-mode offset pagination over the whole dataset

use crate::support::fake_backend::{client, list_files, FakeBackend, RecordingSleeper};
use chrono::NaiveDate;
use socrata_downloader::downloader::{DownloadExecutor, RunSettings};
use socrata_downloader::output::{read_manifest, ChunkManifest};
use socrata_downloader::shutdown::StopSignal;
use socrata_downloader::Mode;
use std::time::Duration;
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_full_mode_writes_under_all_label() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::paged(3, vec![3, 3, 2], 8);
    let settings = RunSettings::new(Mode::Full, dir.path())
        .with_chunk_size(3)
        .with_pause(Duration::ZERO);

    let summary = DownloadExecutor::new(client(backend.clone(), RecordingSleeper::new()), settings, StopSignal::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.chunks_written, 3);
    assert_eq!(summary.rows_written, 8);
    assert_eq!(backend.page_offsets(), vec![0, 3, 6, 9]);
    assert!(backend.calls().iter().all(|p| !p.contains_key("$where")));

    let files = list_files(dir.path());
    assert_eq!(files.len(), 6);
    assert!(files.contains(&"full/all/all_chunk_0003.csv".to_string()));

    let manifest: ChunkManifest = read_manifest(&dir.path().join("full/all/all_chunk_0001.manifest.json")).unwrap();
    assert_eq!(manifest.window_start, None);
    assert_eq!(manifest.window_end, None);
    assert_eq!(manifest.endpoint, "https://data.example.org/resource/abcd-1234.json");
    assert_eq!(manifest.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_full_mode_with_range_uses_range_label() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::paged(50_000, vec![4], 4);
    let settings = RunSettings::new(Mode::Full, dir.path())
        .with_date_range(date(2020, 1, 1), date(2020, 3, 31))
        .with_pause(Duration::ZERO);

    DownloadExecutor::new(client(backend.clone(), RecordingSleeper::new()), settings, StopSignal::new())
        .run()
        .await
        .unwrap();

    let calls = backend.calls();
    assert_eq!(
        calls[0]["$where"],
        "date >= '2020-01-01T00:00:00' AND date <= '2020-03-31T23:59:59'"
    );
    assert!(dir
        .path()
        .join("full/2020-01-01_to_2020-03-31/2020-01-01_to_2020-03-31_chunk_0001.csv")
        .is_file());
}

#[tokio::test]
async fn test_full_mode_max_chunks_resumes_later() {
    let dir = TempDir::new().unwrap();
    let settings = RunSettings::new(Mode::Full, dir.path())
        .with_chunk_size(2)
        .with_max_chunks(Some(2))
        .with_pause(Duration::ZERO);

    let backend = FakeBackend::paged(2, vec![2, 2, 2, 1], 7);
    let summary = DownloadExecutor::new(client(backend.clone(), RecordingSleeper::new()), settings.clone(), StopSignal::new())
        .run()
        .await
        .unwrap();
    assert_eq!(summary.chunks_written, 2);
    assert_eq!(backend.page_offsets(), vec![0, 2]);

    // Raising the cap continues after the chunks already on disk
    let backend = FakeBackend::paged(2, vec![2, 2, 2, 1], 7);
    let summary = DownloadExecutor::new(
        client(backend.clone(), RecordingSleeper::new()),
        settings.with_max_chunks(None),
        StopSignal::new(),
    )
    .run()
    .await
    .unwrap();
    assert_eq!(summary.chunks_written, 2);
    assert_eq!(summary.rows_written, 3);
    assert_eq!(backend.page_offsets(), vec![4, 6, 8]);
    assert!(dir.path().join("full/all/all_chunk_0004.csv").is_file());
}

#[tokio::test]
async fn test_full_mode_select_is_forwarded() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::paged(50_000, vec![], 0);
    let settings = RunSettings::new(Mode::Full, dir.path())
        .with_select(Some("id,date".to_string()))
        .with_pause(Duration::ZERO);

    DownloadExecutor::new(client(backend.clone(), RecordingSleeper::new()), settings, StopSignal::new())
        .run()
        .await
        .unwrap();

    assert_eq!(backend.calls()[0]["$select"], "id,date");
    assert!(list_files(dir.path()).is_empty());
}
