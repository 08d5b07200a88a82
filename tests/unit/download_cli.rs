//! Command-line parsing for the download, verify and materialize subcommands

use chrono::NaiveDate;
use clap::Parser;
use socrata_downloader::cli::{Cli, Commands};
use socrata_downloader::output::{Layout, OutputFormat};
use socrata_downloader::Mode;
use std::path::PathBuf;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

#[test]
fn test_parse_download_command() {
    let cli = Cli::try_parse_from([
        "socrata-downloader",
        "--log-json",
        "download",
        "--mode",
        "monthly",
        "--start-date",
        "2023-01-01",
        "--out-root",
        "data/monthly",
        "--select",
        "id, date",
        "--chunk-size",
        "1000",
    ])
    .unwrap();
    assert!(cli.log_json);
    assert_eq!(cli.log_file, None);

    let Commands::Download(args) = cli.command else {
        panic!("expected download");
    };
    let settings = args.run_settings(today()).unwrap();
    assert_eq!(settings.mode, Mode::Monthly);
    assert_eq!(settings.layout, Layout::ModeFlat);
    assert_eq!(settings.chunk_size, 1000);
    assert_eq!(settings.select.as_deref(), Some("id,date"));
    assert_eq!(settings.start, NaiveDate::from_ymd_opt(2023, 1, 1));
    assert_eq!(settings.end, Some(today()));
    assert!(settings.validate().is_ok());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "socrata-downloader",
        "download",
        "--log-file",
        "logs/run.log",
    ])
    .unwrap();
    assert_eq!(cli.log_file, Some(PathBuf::from("logs/run.log")));
    assert!(!cli.log_json);
}

#[test]
fn test_parse_verify_command() {
    let cli = Cli::try_parse_from(["socrata-downloader", "verify", "--root", "data/raw/daily"]).unwrap();
    let Commands::Verify(args) = cli.command else {
        panic!("expected verify");
    };
    assert_eq!(args.root, PathBuf::from("data/raw/daily"));
}

#[test]
fn test_parse_materialize_command() {
    let cli = Cli::try_parse_from([
        "socrata-downloader",
        "materialize",
        "--root",
        "data/raw/daily",
        "--database",
        "warehouse/crime.duckdb",
        "--table",
        "daily_crimes",
        "--replace",
    ])
    .unwrap();
    let Commands::Materialize(args) = cli.command else {
        panic!("expected materialize");
    };
    assert_eq!(args.root, PathBuf::from("data/raw/daily"));

    let options = args.options().unwrap();
    assert_eq!(options.database, PathBuf::from("warehouse/crime.duckdb"));
    assert_eq!(options.table, "daily_crimes");
    assert_eq!(options.manifest_table.as_deref(), Some("chunk_manifests"));
    assert!(options.replace);
    assert!(options.all_varchar);
}

#[test]
fn test_rejects_unknown_choices() {
    for argv in [
        ["socrata-downloader", "download", "--mode", "hourly"],
        ["socrata-downloader", "download", "--out-format", "xlsx"],
        ["socrata-downloader", "download", "--layout", "deep"],
        ["socrata-downloader", "download", "--chunk-size", "ten"],
    ] {
        assert!(Cli::try_parse_from(argv).is_err(), "{argv:?}");
    }
}

#[test]
fn test_parquet_and_layout_choices() {
    let cli = Cli::try_parse_from([
        "socrata-downloader",
        "download",
        "--out-format",
        "parquet",
        "--layout",
        "mode-flat",
    ])
    .unwrap();
    let Commands::Download(args) = cli.command else {
        panic!("expected download");
    };
    assert_eq!(args.out_format, OutputFormat::Parquet);
    assert_eq!(args.layout, Some(Layout::ModeFlat));
}

#[test]
fn test_full_mode_rejects_inverted_range_at_validation() {
    let cli = Cli::try_parse_from([
        "socrata-downloader",
        "download",
        "--start-date",
        "2020-02-01",
        "--end-date",
        "2020-01-01",
    ])
    .unwrap();
    let Commands::Download(args) = cli.command else {
        panic!("expected download");
    };
    let settings = args.run_settings(today()).unwrap();
    assert!(settings.validate().is_err());
}
