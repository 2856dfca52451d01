//! Output module for persisting the snapshot
//!
//! This module handles:
//! - Writing rewritten pages (plain or gzip-compressed)
//! - Writing raw assets reached through the frontier
//! - Creating the output root and its `logs/` directory

mod writer;

pub use writer::{SavedFile, SnapshotWriter, LOGS_DIR};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while persisting one page or asset
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for output operations
pub type WriteResult<T> = Result<T, WriteError>;
