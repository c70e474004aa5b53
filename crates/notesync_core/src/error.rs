//! Error types for notesync core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in local store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Store contents could not be serialised.
    #[error("failed to serialise store: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Store file exists but cannot be read back.
    #[error("corrupt note store at {path}: {message}")]
    CorruptStore {
        /// Path of the store file.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// A user key was empty or otherwise unusable.
    #[error("invalid user key: {0:?}")]
    InvalidUserKey(String),
}
