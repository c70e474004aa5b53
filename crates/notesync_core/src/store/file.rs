//! Per-user JSON file store.

use super::{pending, visible_sorted, NoteStore};
use crate::error::{CoreError, CoreResult};
use crate::note::{Note, NoteId};
use crate::user::UserKey;
use fs2::FileExt;
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

type Table = BTreeMap<NoteId, Note>;

/// A note store persisted as one JSON file per user.
///
/// Several handles may share a file, in one process or in several (a CLI
/// edit running next to a sync). Every operation takes an advisory lock on a
/// sibling `notes-<user>.lock` file and re-reads the table under it, shared
/// for reads and exclusive for writes, so no handle ever writes back a stale
/// copy. Nothing is cached between operations.
///
/// Each rewrite goes to a temporary file that is then renamed over the store
/// file, so a crash leaves either the old or the new table on disk, and a
/// failed write leaves both the disk and every handle on the old table.
///
/// # Example
///
/// ```no_run
/// use notesync_core::{FileNoteStore, NoteStore, UserKey};
/// use std::path::Path;
///
/// let user = UserKey::new("c0ffee").unwrap();
/// let store = FileNoteStore::open(Path::new("/var/lib/notesync"), &user).unwrap();
/// println!("{} notes", store.get_all().unwrap().len());
/// ```
#[derive(Debug)]
pub struct FileNoteStore {
    path: PathBuf,
    user: UserKey,
    /// Lock file handle. The mutex orders this handle's own threads, which
    /// would otherwise share one advisory lock.
    lock: Mutex<File>,
}

/// Advisory lock held on the lock file, released on drop.
struct Locked<'a>(MutexGuard<'a, File>);

impl Drop for Locked<'_> {
    fn drop(&mut self) {
        // Closing the descriptor releases it anyway.
        let _ = FileExt::unlock(&*self.0);
    }
}

impl FileNoteStore {
    /// Opens (or creates) the store of `user` inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or lock file cannot be created or
    /// an existing store file cannot be parsed.
    pub fn open(dir: &Path, user: &UserKey) -> CoreResult<Self> {
        fs::create_dir_all(dir)?;
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(Self::lock_path_for(dir, user))?;

        let store = Self {
            path: Self::path_for(dir, user),
            user: user.clone(),
            lock: Mutex::new(lock),
        };
        let count = store.read(|notes| notes.len())?;
        debug!(user = %user, count, "opened note store");
        Ok(store)
    }

    /// Returns the store file used for `user` inside `dir`.
    #[must_use]
    pub fn path_for(dir: &Path, user: &UserKey) -> PathBuf {
        dir.join(format!("notes-{}.json", user.file_stem()))
    }

    /// Returns the lock file guarding the store of `user` inside `dir`.
    #[must_use]
    pub fn lock_path_for(dir: &Path, user: &UserKey) -> PathBuf {
        dir.join(format!("notes-{}.lock", user.file_stem()))
    }

    /// Returns the path of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the user this store is bound to.
    #[must_use]
    pub fn user(&self) -> &UserKey {
        &self.user
    }

    fn shared(&self) -> CoreResult<Locked<'_>> {
        let file = self.lock.lock();
        FileExt::lock_shared(&*file)?;
        Ok(Locked(file))
    }

    fn exclusive(&self) -> CoreResult<Locked<'_>> {
        let file = self.lock.lock();
        FileExt::lock_exclusive(&*file)?;
        Ok(Locked(file))
    }

    fn read<T>(&self, f: impl FnOnce(&Table) -> T) -> CoreResult<T> {
        let _locked = self.shared()?;
        let notes = Self::load(&self.path)?;
        Ok(f(&notes))
    }

    /// Read-modify-write under the exclusive lock. `f` returns whether it
    /// changed the table; an unchanged table is not rewritten.
    fn modify(&self, f: impl FnOnce(&mut Table) -> bool) -> CoreResult<()> {
        let _locked = self.exclusive()?;
        let mut notes = Self::load(&self.path)?;
        if f(&mut notes) {
            self.persist(&notes)?;
        }
        Ok(())
    }

    fn load(path: &Path) -> CoreResult<Table> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let bytes = fs::read(path)?;
        if bytes.is_empty() {
            return Ok(BTreeMap::new());
        }
        let notes: Vec<Note> =
            serde_json::from_slice(&bytes).map_err(|e| CoreError::CorruptStore {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(notes.into_iter().map(|n| (n.id, n)).collect())
    }

    fn persist(&self, notes: &Table) -> CoreResult<()> {
        let records: Vec<&Note> = notes.values().collect();
        let bytes = serde_json::to_vec_pretty(&records).map_err(CoreError::Serialize)?;

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl NoteStore for FileNoteStore {
    fn get_all(&self) -> CoreResult<Vec<Note>> {
        self.read(|notes| visible_sorted(notes.values()))
    }

    fn get(&self, id: &NoteId) -> CoreResult<Option<Note>> {
        self.read(|notes| notes.get(id).cloned())
    }

    fn upsert(&self, note: &Note) -> CoreResult<()> {
        self.modify(|notes| notes.insert(note.id, note.clone()).as_ref() != Some(note))
    }

    fn delete_by_id(&self, id: &NoteId) -> CoreResult<()> {
        self.modify(|notes| notes.remove(id).is_some())
    }

    fn get_dirty_or_deleted(&self) -> CoreResult<Vec<Note>> {
        self.read(|notes| pending(notes.values()))
    }
}
