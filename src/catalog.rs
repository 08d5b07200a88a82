//! Discovery and verification of downloaded chunks
//!
//! Walks an output root for chunk data files and manifests, loads manifests,
//! and checks each one against the data file it names: the file must exist
//! and hash to the recorded SHA-256. Data files without a manifest are
//! reported as orphans.

use crate::output::chunk::sha256_file;
use crate::output::{read_manifest, ChunkManifest, OutputFormat, MANIFEST_SUFFIX};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Root does not exist or is not a directory
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Sorted data files and manifests found under a root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkInventory {
    /// `.csv` / `.parquet` chunk files
    pub data_files: Vec<PathBuf>,
    /// `.manifest.json` files
    pub manifests: Vec<PathBuf>,
}

/// Whether `path` names a chunk data file. Hidden temp files never count.
pub fn is_chunk_file(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    if name.starts_with('.') || name.ends_with(MANIFEST_SUFFIX) {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(OutputFormat::from_extension)
        .is_some()
}

/// Recursively collect chunk data files and manifests under `root`
pub fn discover_chunks(root: &Path) -> Result<ChunkInventory, CatalogError> {
    if !root.is_dir() {
        return Err(CatalogError::NotADirectory(root.to_path_buf()));
    }

    let mut inventory = ChunkInventory::default();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| CatalogError::IoError(format!("Failed to read {}: {e}", dir.display())))?;
        for entry in entries {
            let entry = entry.map_err(|e| CatalogError::IoError(e.to_string()))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(|e| CatalogError::IoError(e.to_string()))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if is_chunk_file(&path) {
                inventory.data_files.push(path);
            } else if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(MANIFEST_SUFFIX))
            {
                inventory.manifests.push(path);
            }
        }
    }

    inventory.data_files.sort();
    inventory.manifests.sort();
    debug!(
        data_files = inventory.data_files.len(),
        manifests = inventory.manifests.len(),
        "Discovered chunks"
    );
    Ok(inventory)
}

/// A manifest together with where it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedManifest {
    /// Manifest file path
    pub path: PathBuf,
    /// Parsed contents
    pub manifest: ChunkManifest,
}

impl LoadedManifest {
    /// Path of the data file this manifest describes
    pub fn data_path(&self) -> PathBuf {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        dir.join(&self.manifest.data_file)
    }
}

/// Load every readable manifest; unreadable ones are logged and skipped
pub fn collect_manifests<'a, I>(paths: I) -> Vec<LoadedManifest>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    paths
        .into_iter()
        .filter_map(|path| match read_manifest::<ChunkManifest>(path) {
            Ok(manifest) => Some(LoadedManifest {
                path: path.clone(),
                manifest,
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unable to read manifest");
                None
            }
        })
        .collect()
}

/// Result of checking one manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestStatus {
    /// Data file present and hash matches
    Ok,
    /// Manifest could not be parsed
    Unreadable(String),
    /// Data file named by the manifest is missing
    MissingData(PathBuf),
    /// Data file bytes hash to something else
    HashMismatch {
        /// Hash recorded in the manifest
        expected: String,
        /// Hash of the file on disk
        actual: String,
    },
}

/// One checked manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestCheck {
    /// Manifest file path
    pub manifest: PathBuf,
    /// Outcome
    pub status: ManifestStatus,
}

/// Outcome of verifying a whole root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// One entry per manifest found
    pub checks: Vec<ManifestCheck>,
    /// Data files no manifest refers to
    pub orphan_data_files: Vec<PathBuf>,
}

impl VerifyReport {
    /// Manifests that failed a check
    pub fn failures(&self) -> impl Iterator<Item = &ManifestCheck> {
        self.checks.iter().filter(|c| c.status != ManifestStatus::Ok)
    }

    /// Whether every manifest checked out and no data file is orphaned
    pub fn is_ok(&self) -> bool {
        self.failures().next().is_none() && self.orphan_data_files.is_empty()
    }
}

/// Check one manifest file against its data file
pub fn verify_manifest(path: &Path) -> ManifestCheck {
    inspect(path).0
}

/// Check a manifest and return the data path it refers to, when readable
fn inspect(path: &Path) -> (ManifestCheck, Option<PathBuf>) {
    let (status, data_path) = match read_manifest::<ChunkManifest>(path) {
        Err(e) => (ManifestStatus::Unreadable(e.to_string()), None),
        Ok(manifest) => {
            let loaded = LoadedManifest {
                path: path.to_path_buf(),
                manifest,
            };
            let data_path = loaded.data_path();
            (check_data(&loaded, &data_path), Some(data_path))
        }
    };
    let check = ManifestCheck {
        manifest: path.to_path_buf(),
        status,
    };
    (check, data_path)
}

fn check_data(loaded: &LoadedManifest, data_path: &Path) -> ManifestStatus {
    if !data_path.is_file() {
        return ManifestStatus::MissingData(data_path.to_path_buf());
    }
    match sha256_file(data_path) {
        Ok(actual) if actual.eq_ignore_ascii_case(&loaded.manifest.sha256) => ManifestStatus::Ok,
        Ok(actual) => ManifestStatus::HashMismatch {
            expected: loaded.manifest.sha256.clone(),
            actual,
        },
        Err(e) => ManifestStatus::Unreadable(e.to_string()),
    }
}

/// Verify every manifest under `root` and report orphaned data files
pub fn verify_root(root: &Path) -> Result<VerifyReport, CatalogError> {
    let inventory = discover_chunks(root)?;
    let mut referenced = BTreeSet::new();
    let mut checks = Vec::with_capacity(inventory.manifests.len());

    for path in &inventory.manifests {
        let (check, data_path) = inspect(path);
        referenced.extend(data_path);
        if check.status != ManifestStatus::Ok {
            warn!(manifest = %path.display(), status = ?check.status, "Manifest check failed");
        }
        checks.push(check);
    }

    let orphan_data_files = inventory
        .data_files
        .into_iter()
        .filter(|path| !referenced.contains(path))
        .collect();

    Ok(VerifyReport {
        checks,
        orphan_data_files,
    })
}
