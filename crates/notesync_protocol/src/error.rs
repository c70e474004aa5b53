//! Error types for the wire protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The value could not be serialised.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The body was not valid for the expected message.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    /// A body was required but the response carried none.
    #[error("empty message body")]
    EmptyBody,
}
