//! Resume capability for download runs
//!
//! There is no separate state file: the chunk files on disk are the state.
//! A window's resume index is the number of distinct final-named data files
//! already present for it, and pagination restarts at
//! `resume_index * chunk_size`.

pub mod index;

pub use index::{existing_chunk_indices, resume_index};

/// Errors related to resume scanning
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}
