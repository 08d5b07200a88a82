//! Chunk path planning
//!
//! Every chunk is addressed by its window key, its zero-based chunk index, the
//! run mode and the output root. The [`Layout`] decides how those are spread
//! over directories and the file name:
//!
//! | layout      | data file                                               |
//! |-------------|---------------------------------------------------------|
//! | `nested`    | `{root}/{mode}/{key}/{key}_chunk_0001.csv`              |
//! | `mode-flat` | `{root}/{key}_chunk_0001.csv`                           |
//! | `flat`      | `{parent}/{rootname}_{mode}_{key}_chunk_0001.csv`       |
//! | `ymd`       | `{root}/{mode}/{YYYY}/{MM}/{DD}/{key}_chunk_0001.csv`   |
//!
//! The 1-based number in the file name is zero-padded to at least four digits.
//! The manifest sits next to the data file with `.manifest.json` replacing the
//! data extension.
//!
//! ```rust
//! use socrata_downloader::output::{make_paths, Layout, OutputFormat};
//! use socrata_downloader::{Mode, WindowKey};
//! use chrono::NaiveDate;
//! use std::path::Path;
//!
//! let key = WindowKey::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
//! let paths = make_paths(&key, 0, Layout::Nested, Mode::Daily, OutputFormat::Csv, Path::new("data/raw"));
//! assert_eq!(paths.data, Path::new("data/raw/daily/2020-01-01/2020-01-01_chunk_0001.csv"));
//! ```

use super::{OutputFormat, MANIFEST_SUFFIX};
use crate::{Mode, WindowKey};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Separator between the file-name prefix and the chunk number
pub const CHUNK_MARKER: &str = "_chunk_";

/// Directory/file-name arrangement for chunk files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// `{root}/{mode}/{key}/`
    Nested,
    /// Files directly under `{root}`; used when the root already names the mode
    ModeFlat,
    /// Files next to `{root}`, prefixed with the root's name and the mode
    Flat,
    /// `{root}/{mode}/{YYYY}/{MM}/{DD}/`
    Ymd,
}

impl Layout {
    /// Layout used when none is given: `mode-flat` if the root's last path
    /// component ends with the mode name, `nested` otherwise
    pub fn infer(root: &Path, mode: Mode) -> Self {
        let root_name = root.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if root_name.ends_with(mode.as_str()) {
            Layout::ModeFlat
        } else {
            Layout::Nested
        }
    }

    /// CLI spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Nested => "nested",
            Layout::ModeFlat => "mode-flat",
            Layout::Flat => "flat",
            Layout::Ymd => "ymd",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nested" => Ok(Layout::Nested),
            "mode-flat" | "mode_flat" => Ok(Layout::ModeFlat),
            "flat" => Ok(Layout::Flat),
            "ymd" => Ok(Layout::Ymd),
            _ => Err(format!(
                "Invalid layout: {s}. Valid options: nested, mode-flat, flat, ymd"
            )),
        }
    }
}

/// Where one chunk's files go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPaths {
    /// Data file path for the requested format
    pub data: PathBuf,
    /// Manifest path
    pub manifest: PathBuf,
}

impl ChunkPaths {
    /// Directory holding both files
    pub fn dir(&self) -> &Path {
        self.data.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Data path with the extension of `format`; used when the written format
    /// differs from the requested one
    pub fn data_for(&self, format: OutputFormat) -> PathBuf {
        self.data.with_extension(format.extension())
    }
}

/// Directory and file-name prefix shared by every chunk of one window key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLocation {
    /// Directory holding the chunk files
    pub dir: PathBuf,
    /// File-name stem before [`CHUNK_MARKER`]
    pub prefix: String,
}

impl ChunkLocation {
    /// Resolve the location for a key
    pub fn resolve(key: &WindowKey, layout: Layout, mode: Mode, root: &Path) -> Self {
        let key_text = key.to_string();
        match layout {
            Layout::Nested => Self {
                dir: root.join(mode.as_str()).join(&key_text),
                prefix: key_text,
            },
            Layout::ModeFlat => Self {
                dir: root.to_path_buf(),
                prefix: key_text,
            },
            Layout::Flat => match root.file_name().and_then(|n| n.to_str()) {
                Some(root_name) => Self {
                    dir: parent_dir(root),
                    prefix: format!("{root_name}_{}_{key_text}", mode.as_str()),
                },
                // `.` or `/` have no name to prefix with; stay inside the root
                None => Self {
                    dir: root.to_path_buf(),
                    prefix: format!("{}_{key_text}", mode.as_str()),
                },
            },
            Layout::Ymd => {
                let base = root.join(mode.as_str());
                let dir = match key {
                    WindowKey::Date(date) => base
                        .join(format!("{:04}", date.year()))
                        .join(format!("{:02}", date.month()))
                        .join(format!("{:02}", date.day())),
                    WindowKey::Label(label) => base.join(label),
                };
                Self {
                    dir,
                    prefix: key_text,
                }
            }
        }
    }

    /// File name (without extension) for a zero-based chunk index
    pub fn file_stem(&self, chunk_index: u64) -> String {
        format!("{}{CHUNK_MARKER}{:04}", self.prefix, chunk_index + 1)
    }

    /// Zero-based chunk index encoded in `file_name`, if it is a data file of
    /// this location (`{prefix}_chunk_{NNNN}.csv` or `.parquet`)
    pub fn chunk_index_of(&self, file_name: &str) -> Option<u64> {
        let rest = file_name.strip_prefix(&self.prefix)?.strip_prefix(CHUNK_MARKER)?;
        let (number, ext) = rest.split_once('.')?;
        OutputFormat::from_extension(ext)?;
        if number.len() < 4 || !number.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        number.parse::<u64>().ok()?.checked_sub(1)
    }
}

fn parent_dir(root: &Path) -> PathBuf {
    match root.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Data and manifest paths for one chunk. Pure; creates nothing on disk.
pub fn make_paths(
    key: &WindowKey,
    chunk_index: u64,
    layout: Layout,
    mode: Mode,
    format: OutputFormat,
    root: &Path,
) -> ChunkPaths {
    let location = ChunkLocation::resolve(key, layout, mode, root);
    let stem = location.file_stem(chunk_index);
    ChunkPaths {
        data: location.dir.join(format!("{stem}.{}", format.extension())),
        manifest: location.dir.join(format!("{stem}{MANIFEST_SUFFIX}")),
    }
}
