//! Keyed note stores.

mod file;
mod memory;

pub use file::FileNoteStore;
pub use memory::MemoryNoteStore;

use crate::error::CoreResult;
use crate::note::{Note, NoteId};
use std::sync::Arc;

/// A keyed note table.
///
/// This is the only view of local persistence the sync engine has. Writes are
/// single-record; there is no transaction spanning a sync cycle, so every
/// write must be safe to replay (upsert twice is harmless).
pub trait NoteStore: Send + Sync {
    /// Returns all notes not marked deleted, most recently updated first.
    fn get_all(&self) -> CoreResult<Vec<Note>>;

    /// Looks up a note by id, including soft-deleted ones.
    fn get(&self, id: &NoteId) -> CoreResult<Option<Note>>;

    /// Inserts or replaces the note keyed by `note.id`.
    fn upsert(&self, note: &Note) -> CoreResult<()>;

    /// Physically removes a note. Removing an absent id is not an error.
    fn delete_by_id(&self, id: &NoteId) -> CoreResult<()>;

    /// Returns every note that is dirty or soft-deleted.
    fn get_dirty_or_deleted(&self) -> CoreResult<Vec<Note>>;
}

impl<S: NoteStore + ?Sized> NoteStore for Arc<S> {
    fn get_all(&self) -> CoreResult<Vec<Note>> {
        (**self).get_all()
    }

    fn get(&self, id: &NoteId) -> CoreResult<Option<Note>> {
        (**self).get(id)
    }

    fn upsert(&self, note: &Note) -> CoreResult<()> {
        (**self).upsert(note)
    }

    fn delete_by_id(&self, id: &NoteId) -> CoreResult<()> {
        (**self).delete_by_id(id)
    }

    fn get_dirty_or_deleted(&self) -> CoreResult<Vec<Note>> {
        (**self).get_dirty_or_deleted()
    }
}

/// Live notes ordered newest first.
fn visible_sorted<'a>(notes: impl Iterator<Item = &'a Note>) -> Vec<Note> {
    let mut visible: Vec<Note> = notes.filter(|n| !n.deleted).cloned().collect();
    visible.sort_by(|a, b| b.updated_at_utc.cmp(&a.updated_at_utc));
    visible
}

fn pending<'a>(notes: impl Iterator<Item = &'a Note>) -> Vec<Note> {
    notes.filter(|n| n.needs_push()).cloned().collect()
}
