//! CLI error types and conversions

use crate::catalog::CatalogError;
use crate::downloader::DownloadError;
use crate::fetcher::FetcherError;
use crate::query::QueryError;
use crate::warehouse::WarehouseError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Download error
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Date argument error
    #[error("query error: {0}")]
    QueryError(#[from] QueryError),

    /// Catalog error
    #[error("catalog error: {0}")]
    CatalogError(#[from] CatalogError),

    /// Warehouse error
    #[error("warehouse error: {0}")]
    WarehouseError(#[from] WarehouseError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Verification found problems
    #[error("verification failed: {0}")]
    VerificationFailed(String),
}
