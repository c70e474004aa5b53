//! # notesync core
//!
//! Local note records and the keyed store they live in.
//!
//! This crate provides:
//! - [`Note`], the local record with its dirty/deleted bookkeeping
//! - [`NoteStore`], the keyed-record contract the sync engine consumes
//! - [`MemoryNoteStore`] for tests and ephemeral sessions
//! - [`FileNoteStore`], a per-user JSON file store
//!
//! ## Key Invariants
//!
//! - A record with `deleted = true` is never returned by [`NoteStore::get_all`]
//!   but stays in the store until removal is confirmed remotely
//! - `dirty = true` means the local title/body are authoritative until pushed
//! - A store handle is bound to exactly one [`UserKey`] for its whole life

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod note;
mod store;
mod user;

pub use error::{CoreError, CoreResult};
pub use note::{Note, NoteId};
pub use store::{FileNoteStore, MemoryNoteStore, NoteStore};
pub use user::UserKey;
