//! Materialize subcommand: load downloaded chunks into a DuckDB database

use super::CliError;
use crate::catalog::{collect_manifests, discover_chunks};
use crate::warehouse::{
    default_type_overrides, materialize_duckdb, MaterializeOptions, MaterializeReport, WarehouseError,
    DEFAULT_DATABASE, DEFAULT_MANIFEST_TABLE, DEFAULT_TABLE,
};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Materialize command arguments
#[derive(Parser, Debug, Clone)]
pub struct MaterializeArgs {
    /// Output root holding the chunk files
    #[arg(long, default_value = "data/raw")]
    pub root: PathBuf,

    /// DuckDB database file
    #[arg(long, default_value = DEFAULT_DATABASE)]
    pub database: PathBuf,

    /// Table receiving chunk rows
    #[arg(long, default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Table receiving one row per manifest
    #[arg(long, default_value = DEFAULT_MANIFEST_TABLE)]
    pub manifest_table: String,

    /// Skip loading manifests
    #[arg(long, default_value_t = false)]
    pub no_manifest_table: bool,

    /// Drop the tables before loading instead of appending
    #[arg(long, default_value_t = false)]
    pub replace: bool,

    /// JSON object of column -> DuckDB type, merged over the defaults
    #[arg(long)]
    pub types: Option<PathBuf>,

    /// Let DuckDB infer CSV column types instead of reading everything as text
    #[arg(long, default_value_t = false)]
    pub keep_types: bool,
}

impl MaterializeArgs {
    /// Load every chunk under the root into the database
    pub fn execute(&self) -> Result<MaterializeReport, CliError> {
        let options = self.options()?;
        let inventory = discover_chunks(&self.root)?;
        if inventory.data_files.is_empty() {
            return Err(WarehouseError::NoChunkFiles.into());
        }
        let manifests = collect_manifests(&inventory.manifests);

        info!(
            root = %self.root.display(),
            files = inventory.data_files.len(),
            manifests = manifests.len(),
            "Materializing chunks"
        );
        let report = materialize_duckdb(&inventory.data_files, &manifests, &options)?;

        println!(
            "Loaded {} files into {} ({} rows) in {}",
            report.files_loaded,
            report.table,
            report.table_rows,
            report.database.display()
        );
        if report.manifests_loaded > 0 {
            println!("Recorded {} manifests", report.manifests_loaded);
        }
        Ok(report)
    }

    /// Warehouse options from the flags and the optional types file
    pub fn options(&self) -> Result<MaterializeOptions, CliError> {
        let mut overrides = default_type_overrides();
        if let Some(path) = &self.types {
            overrides.extend(load_type_overrides(path)?);
        }
        let manifest_table = (!self.no_manifest_table).then(|| self.manifest_table.clone());

        let options = MaterializeOptions::new(&self.database)
            .with_table(self.table.clone())
            .with_manifest_table(manifest_table)
            .with_replace(self.replace)
            .with_type_overrides(overrides)
            .with_all_varchar(!self.keep_types);
        options.validate()?;
        Ok(options)
    }
}

/// Read a JSON object mapping column names to DuckDB types
pub fn load_type_overrides(path: &Path) -> Result<BTreeMap<String, String>, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::InvalidArgument(format!("Failed to read types file {}: {e}", path.display())))?;
    serde_json::from_str(&text).map_err(|e| {
        CliError::InvalidArgument(format!(
            "Types file {} must be a JSON object of strings: {e}",
            path.display()
        ))
    })
}
