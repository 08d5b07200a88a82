//! Main entry point for the socrata-downloader CLI

use clap::Parser;
use socrata_downloader::cli::{Cli, Commands};
use socrata_downloader::shutdown::StopSignal;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize tracing: human or JSON output on stderr, plus an optional log file
fn init_tracing(log_json: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    // Check if JSON output is requested via flag or environment variable
    let json_format = log_json
        || std::env::var("LOG_FORMAT")
            .map(|v| v.to_lowercase() == "json")
            .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("socrata_downloader=info"));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let console = fmt::layer().with_writer(std::io::stderr);
    layers.push(if json_format {
        console.json().boxed()
    } else {
        console.boxed()
    });

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let file_layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
        layers.push(if json_format {
            file_layer.json().boxed()
        } else {
            file_layer.boxed()
        });
    }

    tracing_subscriber::registry().with(layers).with(filter).init();
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_json, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    // Ctrl+C only sets the stop flag; the current chunk is allowed to finish
    let stop = StopSignal::new();
    tokio::spawn({
        let stop = stop.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() && stop.request_stop() {
                warn!("Ctrl+C received - stopping after the current chunk");
            }
        }
    });

    let result = match &cli.command {
        Commands::Download(args) => args
            .execute(stop.clone())
            .await
            .map(|summary| {
                if summary.interrupted {
                    info!("Interrupted; rerun the same command to resume");
                }
            })
            .map_err(|e| anyhow::anyhow!(e)),
        Commands::Verify(args) => args.execute().map(|_| ()).map_err(|e| anyhow::anyhow!(e)),
        Commands::Materialize(args) => args.execute().map(|_| ()).map_err(|e| anyhow::anyhow!(e)),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
