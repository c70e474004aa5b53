//! Sync engine state machine.

use crate::connectivity::Connectivity;
use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteNotes, RemoteStatus};
use chrono::{DateTime, Utc};
use notesync_core::{Note, NoteStore};
use notesync_protocol::RemoteNote;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Engine is idle, not syncing.
    Idle,
    /// Engine is pushing local changes.
    Pushing,
    /// Engine is pulling the remote collection.
    Pulling,
    /// Engine has completed a sync cycle.
    Synced,
    /// The last cycle found no network and did nothing.
    Offline,
}

impl SyncState {
    /// Returns true if a cycle is in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Pushing | SyncState::Pulling)
    }
}

/// Statistics accumulated over the engine's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that ran to completion, cancelled and offline ones excluded.
    pub cycles_completed: u64,
    /// Cycles skipped for lack of connectivity.
    pub offline_cycles: u64,
    /// Records pushed successfully (updates, creates and deletes).
    pub records_pushed: u64,
    /// Records left dirty after a failed push.
    pub push_failures: u64,
    /// Remote records written locally by pulls.
    pub records_pulled: u64,
    /// Last sync time.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of one `synchronize()` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// No connectivity; nothing was attempted.
    pub offline: bool,
    /// Live edits accepted by the remote.
    pub updated: u64,
    /// Records created remotely (and remapped to the remote identity).
    pub created: u64,
    /// Soft deletes confirmed and purged locally.
    pub deleted: u64,
    /// Records left dirty for the next cycle.
    pub failed: u64,
    /// Remote records written into the local store.
    pub pulled: u64,
    /// The remote listing could not be fetched.
    pub pull_abandoned: bool,
    /// The run was cancelled before it finished.
    pub cancelled: bool,
    /// Wall time of the call.
    pub duration: Duration,
}

impl SyncOutcome {
    /// Records pushed successfully.
    pub fn pushed(&self) -> u64 {
        self.updated + self.created + self.deleted
    }

    /// Returns true if every pending record was pushed and the pull ran.
    pub fn is_complete(&self) -> bool {
        !self.offline && !self.cancelled && !self.pull_abandoned && self.failed == 0
    }
}

/// Requests cancellation of a running cycle from another thread.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Cancels the cycle in progress.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// What happened to one pushed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pushed {
    Updated,
    Created,
    Deleted,
    Failed,
    Cancelled,
}

/// The sync engine reconciles the local store with the remote collection.
///
/// A cycle pushes every dirty or soft-deleted record, one at a time, then
/// pulls the whole remote collection and merges it last-write-wins.
/// Per-record failures leave the record dirty and are retried by the next
/// cycle; only store failures and connectivity probe failures escape.
///
/// Calls may overlap with user edits and with each other. Each push works
/// from a snapshot of the record and re-reads it before writing back, so an
/// edit made while its request was in flight stays dirty.
pub struct SyncEngine<R: RemoteNotes, S: NoteStore, N: Connectivity> {
    remote: R,
    store: S,
    connectivity: N,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    cancelled: Arc<AtomicBool>,
}

impl<R: RemoteNotes, S: NoteStore, N: Connectivity> SyncEngine<R, S, N> {
    /// Creates a new sync engine.
    pub fn new(remote: R, store: S, connectivity: N) -> Self {
        Self {
            remote,
            store,
            connectivity,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the local store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the remote client.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Cancels any ongoing sync operation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns a handle that can cancel a running cycle.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancelled),
        }
    }

    /// Resets the cancelled flag.
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Runs one push-then-pull cycle.
    ///
    /// Returns immediately with `offline` set when there is no network.
    /// Errors are limited to the connectivity check and the local store.
    pub fn synchronize(&self) -> SyncResult<SyncOutcome> {
        let start = Instant::now();
        self.reset_cancel();

        let mut outcome = SyncOutcome::default();
        let result = self.run(&mut outcome);
        outcome.duration = start.elapsed();

        match result {
            Ok(()) => {
                self.finish(&outcome);
                Ok(outcome)
            }
            Err(e) => {
                self.handle_error(&e);
                Err(e)
            }
        }
    }

    fn run(&self, outcome: &mut SyncOutcome) -> SyncResult<()> {
        if !self.connectivity.has_internet()? {
            debug!("no connectivity, skipping sync");
            outcome.offline = true;
            return Ok(());
        }

        self.set_state(SyncState::Pushing);
        for note in self.store.get_dirty_or_deleted()? {
            if self.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            match self.push_one(&note)? {
                Pushed::Updated => outcome.updated += 1,
                Pushed::Created => outcome.created += 1,
                Pushed::Deleted => outcome.deleted += 1,
                Pushed::Failed => outcome.failed += 1,
                Pushed::Cancelled => {
                    outcome.cancelled = true;
                    break;
                }
            }
        }

        if outcome.cancelled {
            debug!("sync cancelled, skipping pull");
            return Ok(());
        }

        self.set_state(SyncState::Pulling);
        self.pull(outcome)
    }

    fn push_one(&self, note: &Note) -> SyncResult<Pushed> {
        if note.deleted {
            self.push_delete(note)
        } else {
            self.push_update(note)
        }
    }

    fn push_delete(&self, note: &Note) -> SyncResult<Pushed> {
        let status = self.remote.delete(&note.id);
        if self.is_cancelled() {
            return Ok(Pushed::Cancelled);
        }

        match status {
            Ok(RemoteStatus::Success(())) | Ok(RemoteStatus::NotFound) => {
                debug!(id = %note.id, "delete confirmed");
                self.store.delete_by_id(&note.id)?;
                Ok(Pushed::Deleted)
            }
            Ok(status) => Ok(failed(note, "delete", &status)),
            Err(e) => Ok(failed(note, "delete", &e)),
        }
    }

    fn push_update(&self, note: &Note) -> SyncResult<Pushed> {
        let status = self
            .remote
            .update(&note.id, &note.title, &note.content, note.updated_at_utc);
        if self.is_cancelled() {
            return Ok(Pushed::Cancelled);
        }

        match status {
            Ok(RemoteStatus::Success(accepted)) => {
                let accepted_at = accepted
                    .map(|remote| remote.updated_at_utc)
                    .unwrap_or(note.updated_at_utc);
                debug!(id = %note.id, "update accepted");
                self.settle_update(note, accepted_at)?;
                Ok(Pushed::Updated)
            }
            Ok(RemoteStatus::NotFound) => self.push_create(note),
            Ok(status) => Ok(failed(note, "update", &status)),
            Err(e) => Ok(failed(note, "update", &e)),
        }
    }

    /// Creates a note the remote has never seen and moves it to the
    /// remote-assigned identity.
    fn push_create(&self, note: &Note) -> SyncResult<Pushed> {
        let status = self.remote.create(&note.title, &note.content);

        match status {
            Ok(RemoteStatus::Success(remote)) => {
                debug!(placeholder = %note.id, id = %remote.id, "created remotely");
                self.remap(note, &remote)?;
                if self.is_cancelled() {
                    return Ok(Pushed::Cancelled);
                }
                Ok(Pushed::Created)
            }
            Ok(RemoteStatus::Unreadable(code)) => {
                let pushed = self.forget_placeholder(note, code)?;
                if self.is_cancelled() {
                    return Ok(Pushed::Cancelled);
                }
                Ok(pushed)
            }
            _ if self.is_cancelled() => Ok(Pushed::Cancelled),
            Ok(status) => Ok(failed(note, "create", &status)),
            Err(e) => Ok(failed(note, "create", &e)),
        }
    }

    /// Handles a create the server accepted without a readable answer.
    ///
    /// The remote identity is unknown, so the placeholder is dropped and the
    /// next listing brings the server's copy back. Retrying the create would
    /// duplicate the note. A record edited meanwhile is kept for the next
    /// cycle, at the risk of a second remote copy.
    fn forget_placeholder(&self, snapshot: &Note, status: u16) -> SyncResult<Pushed> {
        match self.store.get(&snapshot.id)? {
            Some(current) if current != *snapshot => {
                warn!(
                    placeholder = %snapshot.id,
                    status,
                    "create answer unreadable and note edited since, may duplicate remotely"
                );
                Ok(Pushed::Failed)
            }
            _ => {
                warn!(
                    placeholder = %snapshot.id,
                    status,
                    "create answer unreadable, awaiting remote copy from listing"
                );
                self.store.delete_by_id(&snapshot.id)?;
                Ok(Pushed::Created)
            }
        }
    }

    /// Clears the dirty flag unless the record changed while its update was
    /// in flight.
    fn settle_update(&self, snapshot: &Note, accepted_at: DateTime<Utc>) -> SyncResult<()> {
        let Some(current) = self.store.get(&snapshot.id)? else {
            return Ok(());
        };
        if current != *snapshot {
            debug!(id = %snapshot.id, "edited during push, leaving dirty");
            return Ok(());
        }

        let mut clean = current;
        clean.dirty = false;
        clean.updated_at_utc = accepted_at;
        self.store.upsert(&clean)?;
        Ok(())
    }

    /// Writes the record under the remote identity, then drops the
    /// placeholder. Never leaves two records for one note.
    fn remap(&self, snapshot: &Note, remote: &RemoteNote) -> SyncResult<()> {
        let mut record = Note::from_remote(remote);

        if let Some(current) = self.store.get(&snapshot.id)? {
            if current != *snapshot {
                debug!(placeholder = %snapshot.id, "edited during create, keeping local edit");
                record.title = current.title;
                record.content = current.content;
                record.updated_at_utc = current.updated_at_utc.max(remote.updated_at_utc);
                record.dirty = true;
                record.deleted = current.deleted;
            }
        }

        self.store.upsert(&record)?;
        if remote.id != snapshot.id {
            self.store.delete_by_id(&snapshot.id)?;
        }
        Ok(())
    }

    fn pull(&self, outcome: &mut SyncOutcome) -> SyncResult<()> {
        let listing = match self.remote.list() {
            Ok(RemoteStatus::Success(listing)) => listing,
            Ok(status) => {
                warn!(?status, "pull failed, keeping push-only result");
                outcome.pull_abandoned = true;
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "pull failed, keeping push-only result");
                outcome.pull_abandoned = true;
                return Ok(());
            }
        };

        if self.is_cancelled() {
            outcome.cancelled = true;
            return Ok(());
        }

        for remote in &listing {
            let replace = match self.store.get(&remote.id)? {
                None => true,
                Some(local) => local.is_superseded_by(remote),
            };
            if replace {
                debug!(id = %remote.id, "pulled");
                self.store.upsert(&Note::from_remote(remote))?;
                outcome.pulled += 1;
            }
        }
        Ok(())
    }

    fn finish(&self, outcome: &SyncOutcome) {
        let state = if outcome.offline {
            SyncState::Offline
        } else if outcome.cancelled {
            SyncState::Idle
        } else {
            SyncState::Synced
        };
        self.set_state(state);

        {
            let mut stats = self.stats.write();
            if outcome.offline {
                stats.offline_cycles += 1;
            } else if !outcome.cancelled {
                stats.cycles_completed += 1;
                stats.last_sync_time = Some(Instant::now());
            }
            stats.records_pushed += outcome.pushed();
            stats.push_failures += outcome.failed;
            stats.records_pulled += outcome.pulled;
            stats.last_error = None;
        }

        if !outcome.offline {
            info!(
                updated = outcome.updated,
                created = outcome.created,
                deleted = outcome.deleted,
                failed = outcome.failed,
                pulled = outcome.pulled,
                pull_abandoned = outcome.pull_abandoned,
                cancelled = outcome.cancelled,
                elapsed_ms = outcome.duration.as_millis() as u64,
                "sync finished"
            );
        }
    }

    fn handle_error(&self, error: &SyncError) {
        warn!(error = %error, "sync aborted");
        self.set_state(SyncState::Idle);
        self.stats.write().last_error = Some(error.to_string());
    }
}

fn failed(note: &Note, operation: &str, reason: &dyn std::fmt::Debug) -> Pushed {
    warn!(id = %note.id, operation, reason = ?reason, "push failed, record stays dirty");
    Pushed::Failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{AlwaysOnline, ManualConnectivity};
    use crate::remote::{MockRemote, RemoteCall, RemoteOp};
    use notesync_core::MemoryNoteStore;
    use proptest::prelude::*;
    use uuid::Uuid;

    type TestEngine = SyncEngine<Arc<MockRemote>, Arc<MemoryNoteStore>, Arc<ManualConnectivity>>;

    struct Harness {
        remote: Arc<MockRemote>,
        store: Arc<MemoryNoteStore>,
        network: Arc<ManualConnectivity>,
        engine: TestEngine,
    }

    fn harness(remote: MockRemote, local: Vec<Note>) -> Harness {
        let remote = Arc::new(remote);
        let store = Arc::new(MemoryNoteStore::with_notes(local));
        let network = Arc::new(ManualConnectivity::new(true));
        let engine = SyncEngine::new(Arc::clone(&remote), Arc::clone(&store), Arc::clone(&network));
        Harness {
            remote,
            store,
            network,
            engine,
        }
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    fn remote_note(id: Uuid, title: &str, updated: DateTime<Utc>) -> RemoteNote {
        RemoteNote {
            id,
            title: title.into(),
            content: format!("{title} body"),
            created_at_utc: at(0),
            updated_at_utc: updated,
        }
    }

    fn clean_local(id: Uuid, title: &str, updated: DateTime<Utc>) -> Note {
        Note::from_remote(&remote_note(id, title, updated))
    }

    #[test]
    fn sync_state_checks() {
        assert!(SyncState::Pushing.is_active());
        assert!(SyncState::Pulling.is_active());
        assert!(!SyncState::Idle.is_active());
        assert!(!SyncState::Offline.is_active());
    }

    #[test]
    fn sync_engine_initial_state() {
        let h = harness(MockRemote::new(), vec![]);
        assert_eq!(h.engine.state(), SyncState::Idle);
        assert_eq!(h.engine.stats().cycles_completed, 0);
    }

    #[test]
    fn offline_is_a_no_op() {
        let draft = Note::draft("offline", "text", at(1));
        let h = harness(MockRemote::new(), vec![draft]);
        h.network.set_online(false);
        let before = h.store.snapshot();

        let outcome = h.engine.synchronize().unwrap();

        assert!(outcome.offline);
        assert_eq!(h.store.snapshot(), before);
        assert!(h.remote.calls().is_empty());
        assert_eq!(h.engine.state(), SyncState::Offline);
        assert_eq!(h.engine.stats().offline_cycles, 1);
    }

    #[test]
    fn offline_draft_converges_to_remote_identity() {
        let draft = Note::draft("fresh", "text", at(1));
        let placeholder = draft.id;
        let h = harness(MockRemote::new(), vec![draft]);

        let outcome = h.engine.synchronize().unwrap();

        assert_eq!(outcome.created, 1);
        let all = h.store.snapshot();
        assert_eq!(all.len(), 1);
        let note = &all[0];
        assert_ne!(note.id, placeholder);
        assert!(!note.dirty);
        assert!(!note.deleted);
        assert_eq!(note.title, "fresh");
        assert!(h.remote.note(&note.id).is_some());
        assert_eq!(h.remote.count(RemoteOp::Create), 1);
    }

    #[test]
    fn update_clears_dirty_and_keeps_accepted_timestamp() {
        let id = Uuid::new_v4();
        let remote = MockRemote::with_notes([remote_note(id, "old", at(10))]);
        let mut local = clean_local(id, "old", at(10));
        local.edit("new", "new body", at(20));
        let h = harness(remote, vec![local]);

        let outcome = h.engine.synchronize().unwrap();

        assert_eq!(outcome.updated, 1);
        let stored = h.store.get(&id).unwrap().unwrap();
        assert!(!stored.dirty);
        assert_eq!(stored.title, "new");
        assert_eq!(stored.updated_at_utc, at(20));
        assert_eq!(h.remote.note(&id).unwrap().title, "new");
    }

    #[test]
    fn failed_update_stays_dirty_without_create() {
        let id = Uuid::new_v4();
        let remote = MockRemote::with_notes([remote_note(id, "old", at(10))]);
        remote.fail(RemoteOp::Update, 500);
        let mut local = clean_local(id, "old", at(10));
        local.edit("new", "x", at(20));
        let h = harness(remote, vec![local.clone()]);

        let outcome = h.engine.synchronize().unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(h.store.get(&id).unwrap(), Some(local));
        assert_eq!(h.remote.count(RemoteOp::Create), 0);
    }

    #[test]
    fn stale_update_loses_to_remote_on_pull() {
        let id = Uuid::new_v4();
        let remote = MockRemote::with_notes([remote_note(id, "server", at(30))]);
        let mut local = clean_local(id, "old", at(10));
        local.edit("mine", "x", at(20));
        let h = harness(remote, vec![local]);

        let outcome = h.engine.synchronize().unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.pulled, 1);
        let stored = h.store.get(&id).unwrap().unwrap();
        assert_eq!(stored.title, "server");
        assert!(!stored.dirty);
    }

    #[test]
    fn delete_purges_on_success_and_not_found() {
        let existing = Uuid::new_v4();
        let remote = MockRemote::with_notes([remote_note(existing, "gone", at(1))]);
        let mut a = clean_local(existing, "gone", at(1));
        a.mark_deleted();
        let mut b = Note::draft("never pushed", "", at(2));
        b.mark_deleted();
        let h = harness(remote, vec![a, b]);

        let outcome = h.engine.synchronize().unwrap();

        assert_eq!(outcome.deleted, 2);
        assert!(h.store.is_empty());
        assert!(h.remote.notes().is_empty());
    }

    #[test]
    fn delete_failure_keeps_soft_deleted_record() {
        let id = Uuid::new_v4();
        let remote = MockRemote::with_notes([remote_note(id, "keep", at(1))]);
        remote.fail(RemoteOp::Delete, 503);
        remote.fail(RemoteOp::List, 503);
        let mut local = clean_local(id, "keep", at(1));
        local.mark_deleted();
        let h = harness(remote, vec![local]);

        let outcome = h.engine.synchronize().unwrap();

        assert_eq!(outcome.failed, 1);
        let stored = h.store.get(&id).unwrap().unwrap();
        assert!(stored.deleted);
        assert!(stored.dirty);
    }

    #[test]
    fn transport_fault_on_one_record_does_not_abort() {
        let h = harness(MockRemote::new(), vec![Note::draft("a", "", at(1))]);
        h.remote.set_offline(true);

        let outcome = h.engine.synchronize().unwrap();

        assert_eq!(outcome.failed, 1);
        assert!(outcome.pull_abandoned);
        assert!(!outcome.is_complete());
        assert_eq!(h.store.len(), 1);
        assert!(h.store.snapshot()[0].dirty);
    }

    #[test]
    fn second_sync_is_idempotent() {
        let remote = MockRemote::with_notes([
            remote_note(Uuid::new_v4(), "one", at(5)),
            remote_note(Uuid::new_v4(), "two", at(6)),
        ]);
        let h = harness(remote, vec![Note::draft("three", "", at(7))]);

        h.engine.synchronize().unwrap();
        let after_first = h.store.snapshot();
        let outcome = h.engine.synchronize().unwrap();

        assert_eq!(h.store.snapshot(), after_first);
        assert_eq!(outcome.pushed(), 0);
        assert_eq!(outcome.pulled, 0);
        assert!(outcome.is_complete());
    }

    #[test]
    fn pull_does_not_purge_records_missing_remotely() {
        let id = Uuid::new_v4();
        let h = harness(MockRemote::new(), vec![clean_local(id, "orphan", at(1))]);

        h.engine.synchronize().unwrap();

        assert!(h.store.get(&id).unwrap().is_some());
    }

    #[test]
    fn abandoned_pull_is_partial_success() {
        let h = harness(MockRemote::new(), vec![Note::draft("a", "", at(1))]);
        h.remote.fail(RemoteOp::List, 500);

        let outcome = h.engine.synchronize().unwrap();

        assert_eq!(outcome.created, 1);
        assert!(outcome.pull_abandoned);
        assert_eq!(h.engine.state(), SyncState::Synced);
    }

    #[test]
    fn edit_during_update_stays_dirty() {
        let id = Uuid::new_v4();
        let remote = Arc::new(MockRemote::with_notes([remote_note(id, "v1", at(1))]));
        let mut local = clean_local(id, "v1", at(1));
        local.edit("v2", "", at(2));
        let store = Arc::new(MemoryNoteStore::with_notes(vec![local]));

        let hook_store = Arc::clone(&store);
        remote.set_hook(move |call| {
            if let RemoteCall::Update { id, .. } = call {
                let mut note = hook_store.get(id).unwrap().unwrap();
                note.edit("v3", "", at(3));
                hook_store.upsert(&note).unwrap();
            }
        });
        let engine = SyncEngine::new(Arc::clone(&remote), Arc::clone(&store), AlwaysOnline);

        engine.synchronize().unwrap();

        let stored = store.get(&id).unwrap().unwrap();
        assert_eq!(stored.title, "v3");
        assert!(stored.dirty);
    }

    #[test]
    fn edit_during_create_is_kept_under_remote_identity() {
        let draft = Note::draft("first", "", at(1));
        let placeholder = draft.id;
        let remote = Arc::new(MockRemote::new());
        let store = Arc::new(MemoryNoteStore::with_notes(vec![draft]));

        let hook_store = Arc::clone(&store);
        remote.set_hook(move |call| {
            if let RemoteCall::Create { .. } = call {
                let mut note = hook_store.get(&placeholder).unwrap().unwrap();
                note.edit("second", "", at(2));
                hook_store.upsert(&note).unwrap();
            }
        });
        let engine = SyncEngine::new(Arc::clone(&remote), Arc::clone(&store), AlwaysOnline);

        engine.synchronize().unwrap();

        let all = store.snapshot();
        assert_eq!(all.len(), 1);
        assert_ne!(all[0].id, placeholder);
        assert_eq!(all[0].title, "second");
        assert!(all[0].dirty);
    }

    #[test]
    fn cancel_mid_push_leaves_rest_dirty_and_skips_pull() {
        let a = Note::draft("a", "", at(1));
        let b = Note::draft("b", "", at(2));
        let remote = Arc::new(MockRemote::new());
        let store = Arc::new(MemoryNoteStore::with_notes(vec![a, b]));
        let engine = SyncEngine::new(Arc::clone(&remote), Arc::clone(&store), AlwaysOnline);

        let handle = engine.cancel_handle();
        remote.set_hook(move |call| {
            if matches!(call, RemoteCall::Update { .. }) {
                handle.cancel();
            }
        });

        let outcome = engine.synchronize().unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.pushed(), 0);
        assert_eq!(remote.count(RemoteOp::Create), 0);
        assert_eq!(remote.count(RemoteOp::List), 0);
        assert!(store.snapshot().iter().all(|n| n.dirty));
        assert_eq!(engine.state(), SyncState::Idle);
    }

    #[test]
    fn cancel_after_create_still_remaps() {
        let draft = Note::draft("a", "", at(1));
        let remote = Arc::new(MockRemote::new());
        let store = Arc::new(MemoryNoteStore::with_notes(vec![draft]));
        let engine = SyncEngine::new(Arc::clone(&remote), Arc::clone(&store), AlwaysOnline);

        let handle = engine.cancel_handle();
        remote.set_hook(move |call| {
            if matches!(call, RemoteCall::Create { .. }) {
                handle.cancel();
            }
        });

        let outcome = engine.synchronize().unwrap();

        assert!(outcome.cancelled);
        let all = store.snapshot();
        assert_eq!(all.len(), 1);
        assert!(!all[0].dirty);
        assert!(remote.note(&all[0].id).is_some());
    }

    #[test]
    fn unreadable_create_is_settled_by_listing() {
        let draft = Note::draft("a", "body", at(1));
        let remote = MockRemote::new();
        remote.answer_unreadable(RemoteOp::Create);
        let h = harness(remote, vec![draft.clone()]);

        let outcome = h.engine.synchronize().unwrap();

        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.pulled, 1);
        let all = h.store.snapshot();
        assert_eq!(all.len(), 1);
        assert_ne!(all[0].id, draft.id);
        assert_eq!(all[0].content, "body");
        assert!(!all[0].dirty);

        h.engine.synchronize().unwrap();
        assert_eq!(h.remote.count(RemoteOp::Create), 1);
        assert_eq!(h.remote.notes().len(), 1);
    }

    #[test]
    fn unreadable_create_is_not_repeated_when_pull_fails() {
        let draft = Note::draft("a", "", at(1));
        let remote = MockRemote::new();
        remote.answer_unreadable(RemoteOp::Create);
        remote.fail(RemoteOp::List, 503);
        let h = harness(remote, vec![draft]);

        let outcome = h.engine.synchronize().unwrap();
        assert!(outcome.pull_abandoned);
        assert!(h.store.get_dirty_or_deleted().unwrap().is_empty());

        h.remote.clear_failures();
        h.engine.synchronize().unwrap();

        assert_eq!(h.remote.count(RemoteOp::Create), 1);
        assert_eq!(h.store.snapshot().len(), 1);
        assert_eq!(h.store.snapshot()[0].id, h.remote.notes()[0].id);
    }

    #[test]
    fn store_failure_propagates() {
        struct BrokenStore;

        impl NoteStore for BrokenStore {
            fn get_all(&self) -> notesync_core::CoreResult<Vec<Note>> {
                Ok(vec![])
            }
            fn get(&self, _: &Uuid) -> notesync_core::CoreResult<Option<Note>> {
                Ok(None)
            }
            fn upsert(&self, _: &Note) -> notesync_core::CoreResult<()> {
                Ok(())
            }
            fn delete_by_id(&self, _: &Uuid) -> notesync_core::CoreResult<()> {
                Ok(())
            }
            fn get_dirty_or_deleted(&self) -> notesync_core::CoreResult<Vec<Note>> {
                Err(notesync_core::CoreError::Io(std::io::Error::other("disk gone")))
            }
        }

        let engine = SyncEngine::new(MockRemote::new(), BrokenStore, AlwaysOnline);
        let result = engine.synchronize();

        assert!(matches!(result, Err(SyncError::Store(_))));
        assert_eq!(engine.state(), SyncState::Idle);
        assert!(engine.stats().last_error.is_some());
    }

    #[test]
    fn connectivity_failure_propagates() {
        struct Unknown;

        impl Connectivity for Unknown {
            fn has_internet(&self) -> SyncResult<bool> {
                Err(SyncError::Connectivity("no network service".into()))
            }
        }

        let engine = SyncEngine::new(MockRemote::new(), MemoryNoteStore::new(), Unknown);
        assert!(matches!(engine.synchronize(), Err(SyncError::Connectivity(_))));
    }

    #[test]
    fn stats_accumulate() {
        let h = harness(MockRemote::new(), vec![Note::draft("a", "", at(1))]);
        h.engine.synchronize().unwrap();
        h.engine.synchronize().unwrap();

        let stats = h.engine.stats();
        assert_eq!(stats.cycles_completed, 2);
        assert_eq!(stats.records_pushed, 1);
        assert!(stats.last_sync_time.is_some());
    }

    proptest! {
        #[test]
        fn pull_is_last_write_wins(local_secs in 0i64..1_000, remote_secs in 0i64..1_000) {
            let id = Uuid::new_v4();
            let remote = MockRemote::with_notes([remote_note(id, "remote", at(remote_secs))]);
            let h = harness(remote, vec![clean_local(id, "local", at(local_secs))]);

            h.engine.synchronize().unwrap();

            let stored = h.store.get(&id).unwrap().unwrap();
            if remote_secs > local_secs {
                prop_assert_eq!(stored.title, "remote");
                prop_assert_eq!(stored.updated_at_utc, at(remote_secs));
            } else {
                prop_assert_eq!(stored.title, "local");
                prop_assert_eq!(stored.updated_at_utc, at(local_secs));
            }
            prop_assert_eq!(h.remote.count(RemoteOp::Update), 0);
        }
    }

    #[test]
    fn outcome_helpers() {
        let outcome = SyncOutcome {
            updated: 1,
            created: 2,
            deleted: 3,
            ..SyncOutcome::default()
        };
        assert_eq!(outcome.pushed(), 6);
        assert!(outcome.is_complete());
    }
}
