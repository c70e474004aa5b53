//! Note messages exchanged with the notes collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A note as the server reports it.
///
/// Returned by list, get and create. There are no dirty or deleted fields:
/// edits and deletions travel as distinct operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteNote {
    /// Server-assigned identity.
    pub id: Uuid,
    /// Note title.
    pub title: String,
    /// Note body.
    pub content: String,
    /// Creation time, server clock.
    pub created_at_utc: DateTime<Utc>,
    /// Last update time, server clock.
    pub updated_at_utc: DateTime<Utc>,
}

/// Body of `POST /api/notes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteCreate {
    /// Note title.
    pub title: String,
    /// Note body.
    pub content: String,
}

impl NoteCreate {
    /// Creates a new create request.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Body of `PUT /api/notes/{id}`.
///
/// `updated_at_utc` is the client's view of the note's last update; the
/// server refuses the write with 409 when its own copy is newer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteUpdate {
    /// Note title.
    pub title: String,
    /// Note body.
    pub content: String,
    /// Last update time known to the client.
    pub updated_at_utc: DateTime<Utc>,
}

impl NoteUpdate {
    /// Creates a new update request.
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        updated_at_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            updated_at_utc,
        }
    }
}
