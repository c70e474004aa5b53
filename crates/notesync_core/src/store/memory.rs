//! In-memory note store.

use super::{pending, visible_sorted, NoteStore};
use crate::error::CoreResult;
use crate::note::{Note, NoteId};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory note store.
///
/// Suitable for tests and for sessions that don't need persistence.
/// Thread-safe; can be shared behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use notesync_core::{MemoryNoteStore, Note, NoteStore};
///
/// let store = MemoryNoteStore::new();
/// let note = Note::draft("groceries", "milk", Utc::now());
/// store.upsert(&note).unwrap();
/// assert_eq!(store.get_dirty_or_deleted().unwrap().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryNoteStore {
    notes: RwLock<BTreeMap<NoteId, Note>>,
}

impl MemoryNoteStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given notes.
    #[must_use]
    pub fn with_notes(notes: impl IntoIterator<Item = Note>) -> Self {
        Self {
            notes: RwLock::new(notes.into_iter().map(|n| (n.id, n)).collect()),
        }
    }

    /// Returns every record, deleted ones included, ordered by id.
    ///
    /// Two snapshots compare equal iff the stores hold identical records.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Note> {
        self.notes.read().values().cloned().collect()
    }

    /// Number of records, deleted ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notes.read().len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.read().is_empty()
    }
}

impl NoteStore for MemoryNoteStore {
    fn get_all(&self) -> CoreResult<Vec<Note>> {
        Ok(visible_sorted(self.notes.read().values()))
    }

    fn get(&self, id: &NoteId) -> CoreResult<Option<Note>> {
        Ok(self.notes.read().get(id).cloned())
    }

    fn upsert(&self, note: &Note) -> CoreResult<()> {
        self.notes.write().insert(note.id, note.clone());
        Ok(())
    }

    fn delete_by_id(&self, id: &NoteId) -> CoreResult<()> {
        self.notes.write().remove(id);
        Ok(())
    }

    fn get_dirty_or_deleted(&self) -> CoreResult<Vec<Note>> {
        Ok(pending(self.notes.read().values()))
    }
}
