//! CLI command implementations

pub mod download;
pub mod error;
pub mod materialize;
pub mod verify;

pub use download::{load_select, Cli, Commands, DownloadArgs};
pub use error::CliError;
pub use materialize::MaterializeArgs;
pub use verify::VerifyArgs;
