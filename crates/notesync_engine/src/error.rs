//! Error types for the sync engine.

use notesync_core::CoreError;
use notesync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync and transport operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No credential is available for an operation that requires one.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server rejected the request with validation errors.
    #[error("request rejected with status {status}: {}", errors.join("; "))]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Error descriptions reported by the server.
        errors: Vec<String>,
    },

    /// Server answered with a status the caller has no handling for.
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// Credential store error.
    #[error("credential store error: {0}")]
    Credentials(String),

    /// Connectivity status could not be determined.
    #[error("connectivity check failed: {0}")]
    Connectivity(String),

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::UnexpectedStatus(status) => *status >= 500,
            _ => false,
        }
    }
}
