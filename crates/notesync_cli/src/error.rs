//! CLI error type.

use notesync_core::CoreError;
use notesync_engine::SyncError;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported to the user.
#[derive(Error, Debug)]
pub enum CliError {
    /// A note command ran with no account bound.
    #[error("not logged in; run `notesync login <email> --password <password>` first")]
    NotLoggedIn,

    /// No note matches the given id.
    #[error("no note matches '{0}'")]
    NoteNotFound(String),

    /// More than one note matches the given id prefix.
    #[error("'{prefix}' is ambiguous ({count} notes match); use more characters")]
    AmbiguousId {
        /// Prefix given.
        prefix: String,
        /// Number of matches.
        count: usize,
    },

    /// Unsupported output format.
    #[error("unknown format '{0}' (expected text or json)")]
    UnknownFormat(String),

    /// Output could not be rendered.
    #[error("output error: {0}")]
    Output(String),

    /// Sync, transport or auth failure.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Local store failure.
    #[error(transparent)]
    Store(#[from] CoreError),

    /// Session file failure.
    #[error("session file {path}: {message}")]
    Session {
        /// Path of the session file.
        path: String,
        /// What went wrong.
        message: String,
    },
}
