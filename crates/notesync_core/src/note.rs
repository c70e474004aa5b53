//! The local note record.

use chrono::{DateTime, Utc};
use notesync_protocol::RemoteNote;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a note, either a client placeholder or a server-assigned id.
pub type NoteId = Uuid;

/// A note as held in the local store.
///
/// # Lifecycle
///
/// - [`Note::draft`]: created offline, dirty, keyed by a placeholder id
/// - [`Note::edit`]: user edit, re-marks dirty and bumps `updated_at_utc`
/// - [`Note::mark_deleted`]: soft delete pending remote confirmation
/// - removed from the store only once the remote side has no such note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Record identity.
    pub id: NoteId,
    /// Note title.
    pub title: String,
    /// Note body.
    pub content: String,
    /// Creation time.
    pub created_at_utc: DateTime<Utc>,
    /// Last update time, compared for last-write-wins.
    pub updated_at_utc: DateTime<Utc>,
    /// Local change not yet acknowledged by the remote.
    pub dirty: bool,
    /// Soft delete pending remote propagation.
    pub deleted: bool,
}

impl Note {
    /// Creates a new local note under a fresh placeholder id.
    pub fn draft(title: impl Into<String>, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            content: content.into(),
            created_at_utc: now,
            updated_at_utc: now,
            dirty: true,
            deleted: false,
        }
    }

    /// Builds a clean record from the server's copy.
    ///
    /// Timestamps are taken verbatim.
    pub fn from_remote(remote: &RemoteNote) -> Self {
        Self {
            id: remote.id,
            title: remote.title.clone(),
            content: remote.content.clone(),
            created_at_utc: remote.created_at_utc,
            updated_at_utc: remote.updated_at_utc,
            dirty: false,
            deleted: false,
        }
    }

    /// Applies a user edit.
    pub fn edit(&mut self, title: impl Into<String>, content: impl Into<String>, now: DateTime<Utc>) {
        self.title = title.into();
        self.content = content.into();
        self.updated_at_utc = now;
        self.dirty = true;
    }

    /// Marks the note for deletion on the next sync.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.dirty = true;
    }

    /// Returns true if the record has anything to push.
    pub fn needs_push(&self) -> bool {
        self.dirty || self.deleted
    }

    /// Returns true if the server's copy should replace this one.
    ///
    /// Strictly newer wins; on a tie the local value is kept.
    pub fn is_superseded_by(&self, remote: &RemoteNote) -> bool {
        remote.updated_at_utc > self.updated_at_utc
    }
}
