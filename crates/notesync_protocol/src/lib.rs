//! # notesync protocol
//!
//! Wire types for the notes API.
//!
//! This crate provides:
//! - Note DTOs (`RemoteNote`, `NoteCreate`, `NoteUpdate`)
//! - Auth DTOs (login, register, refresh, `me`)
//! - JSON encoding/decoding helpers
//!
//! Field names follow the server's camelCase JSON (`createdAtUtc`,
//! `accessToken`, ...). This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod error;
mod notes;

pub use auth::{AuthResponse, ErrorBody, LoginRequest, MeResponse, RefreshRequest, RegisterRequest};
pub use error::{ProtocolError, ProtocolResult};
pub use notes::{NoteCreate, NoteUpdate, RemoteNote};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Route of the notes collection, relative to the server base URL.
pub const NOTES_PATH: &str = "/api/notes";
/// Route of the login endpoint.
pub const LOGIN_PATH: &str = "/api/auth/login";
/// Route of the registration endpoint.
pub const REGISTER_PATH: &str = "/api/auth/register";
/// Route of the refresh endpoint.
pub const REFRESH_PATH: &str = "/api/auth/refresh";
/// Route of the current-user endpoint.
pub const ME_PATH: &str = "/api/auth/me";

/// Encodes a wire value as a JSON body.
pub fn encode<T: Serialize>(value: &T) -> ProtocolResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(ProtocolError::Encode)
}

/// Decodes a JSON body into a wire value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ProtocolResult<T> {
    if bytes.is_empty() {
        return Err(ProtocolError::EmptyBody);
    }
    serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
}

/// Returns the route of a single note.
pub fn note_path(id: &uuid::Uuid) -> String {
    format!("{NOTES_PATH}/{id}")
}
