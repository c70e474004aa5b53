//! Integration tests for the sync engine, transport and remote client
//! against the reference server.

use chrono::Duration;
use notesync_core::{FileNoteStore, MemoryNoteStore, NoteId, NoteStore, UserKey};
use notesync_engine::{
    AlwaysOnline, AuthenticatedTransport, ClientConfig, HttpRemoteClient, Method, RemoteNotes,
    RemoteStatus, SyncEngine,
};
use notesync_protocol::{NOTES_PATH, REFRESH_PATH};
use notesync_testkit::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;

const ADA: &str = "ada@example.com";

#[test]
fn offline_note_converges_to_server_identity() {
    let server = FakeNotesServer::shared();
    let client = ClientStack::signed_in(&server, ADA);
    let draft = client.add_note("groceries", "milk, eggs");

    let outcome = client.engine.synchronize().unwrap();

    assert_eq!(outcome.created, 1);
    assert!(outcome.is_complete());

    let remote = server.notes_of(ADA);
    assert_eq!(remote.len(), 1);
    assert_ne!(remote[0].id, draft.id);

    let local = client.all_records();
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].id, remote[0].id);
    assert!(!local[0].dirty);
    assert_eq!(local[0].title, "groceries");
}

#[test]
fn repeated_sync_leaves_store_unchanged() {
    let server = FakeNotesServer::shared();
    let client = ClientStack::signed_in(&server, ADA);
    server.put_note(ADA, "from web", "hello").unwrap();
    client.add_note("from phone", "hi");

    client.engine.synchronize().unwrap();
    let first = client.all_records();
    let outcome = client.engine.synchronize().unwrap();

    assert_eq!(client.all_records(), first);
    assert_eq!(outcome.pushed(), 0);
    assert_eq!(outcome.pulled, 0);
}

#[test]
fn local_delete_reaches_server() {
    let server = FakeNotesServer::shared();
    let client = ClientStack::signed_in(&server, ADA);
    let note = server.put_note(ADA, "old", "").unwrap();
    client.engine.synchronize().unwrap();

    client.delete_note(&note.id);
    let outcome = client.engine.synchronize().unwrap();

    assert_eq!(outcome.deleted, 1);
    assert!(server.notes_of(ADA).is_empty());
    assert!(client.note(&note.id).is_none());
}

#[test]
fn delete_of_note_already_gone_is_purged() {
    let server = FakeNotesServer::shared();
    let client = ClientStack::signed_in(&server, ADA);
    let note = server.put_note(ADA, "old", "").unwrap();
    client.engine.synchronize().unwrap();

    server.remove_note(ADA, &note.id);
    client.delete_note(&note.id);
    let outcome = client.engine.synchronize().unwrap();

    assert_eq!(outcome.deleted, 1);
    assert!(client.all_records().is_empty());
}

#[test]
fn failed_delete_keeps_tombstone() {
    let server = FakeNotesServer::shared();
    let client = ClientStack::signed_in(&server, ADA);
    let note = server.put_note(ADA, "old", "").unwrap();
    client.engine.synchronize().unwrap();

    client.delete_note(&note.id);
    server.fail_next(500);
    let outcome = client.engine.synchronize().unwrap();

    assert_eq!(outcome.failed, 1);
    let record = client.note(&note.id).unwrap();
    assert!(record.deleted);
    assert!(client.visible().is_empty());

    let outcome = client.engine.synchronize().unwrap();
    assert_eq!(outcome.deleted, 1);
    assert!(client.note(&note.id).is_none());
}

#[test]
fn clean_note_missing_on_server_is_kept() {
    let server = FakeNotesServer::shared();
    let orphan = synced_note(NoteId::new_v4(), "orphan", instant(0));
    let client =
        ClientStack::with_store(&server, MemoryNoteStore::with_notes([orphan.clone()]));
    client.sign_in(ADA);

    let outcome = client.engine.synchronize().unwrap();

    assert_eq!(outcome.pushed(), 0);
    assert_eq!(client.all_records(), vec![orphan]);
}

#[test]
fn newer_remote_edit_wins_on_pull() {
    let server = FakeNotesServer::shared();
    let client = ClientStack::signed_in(&server, ADA);
    let note = server.put_note(ADA, "v1", "").unwrap();
    client.engine.synchronize().unwrap();

    server.advance_clock(Duration::minutes(1));
    server.edit_note(ADA, &note.id, "v2", "from web").unwrap();
    let outcome = client.engine.synchronize().unwrap();

    assert_eq!(outcome.pulled, 1);
    let local = client.note(&note.id).unwrap();
    assert_eq!(local.title, "v2");
    assert_eq!(local.content, "from web");
    assert!(!local.dirty);
}

#[test]
fn local_edit_is_pushed_and_restamped() {
    let server = FakeNotesServer::shared();
    let client = ClientStack::signed_in(&server, ADA);
    let note = server.put_note(ADA, "v1", "").unwrap();
    client.engine.synchronize().unwrap();

    client.edit_note(&note.id, "v2", "from phone");
    let outcome = client.engine.synchronize().unwrap();

    assert_eq!(outcome.updated, 1);
    let remote = &server.notes_of(ADA)[0];
    assert_eq!(remote.title, "v2");

    let local = client.note(&note.id).unwrap();
    assert_eq!(local.title, "v2");
    assert!(!local.dirty);
    assert_eq!(local.updated_at_utc, remote.updated_at_utc);
}

#[test]
fn stale_local_edit_loses_to_server() {
    let server = FakeNotesServer::shared();
    let client = ClientStack::signed_in(&server, ADA);
    let note = server.put_note(ADA, "v1", "").unwrap();
    client.engine.synchronize().unwrap();

    server.advance_clock(Duration::hours(1));
    server.edit_note(ADA, &note.id, "server", "").unwrap();
    client.edit_note(&note.id, "phone", "");
    let outcome = client.engine.synchronize().unwrap();

    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.pulled, 1);
    let local = client.note(&note.id).unwrap();
    assert_eq!(local.title, "server");
    assert!(!local.dirty);
}

#[test]
fn expired_access_token_is_refreshed_once() {
    let server = FakeNotesServer::shared();
    let client = ClientStack::signed_in(&server, ADA);
    client.add_note("a", "");
    server.expire_access_tokens();
    server.clear_requests();

    let outcome = client.engine.synchronize().unwrap();

    assert_eq!(outcome.created, 1);
    assert!(outcome.is_complete());
    assert_eq!(server.count(&Method::POST, REFRESH_PATH), 1);
    // PUT rejected with the stale token, then replayed once.
    assert_eq!(server.count(&Method::PUT, NOTES_PATH), 2);
}

#[test]
fn failed_refresh_leaves_record_dirty() {
    let server = FakeNotesServer::shared();
    let client = ClientStack::signed_in(&server, ADA);
    let draft = client.add_note("a", "");
    server.expire_access_tokens();
    server.revoke_refresh_tokens();
    server.clear_requests();

    let outcome = client.engine.synchronize().unwrap();

    assert_eq!(outcome.failed, 1);
    assert!(outcome.pull_abandoned);
    assert_eq!(server.count(&Method::PUT, NOTES_PATH), 1);
    assert!(client.note(&draft.id).unwrap().dirty);
    assert!(server.notes_of(ADA).is_empty());
}

#[test]
fn unreachable_server_is_not_an_error() {
    let server = FakeNotesServer::shared();
    let client = ClientStack::signed_in(&server, ADA);
    let draft = client.add_note("a", "");
    server.set_offline(true);

    let outcome = client.engine.synchronize().unwrap();

    assert_eq!(outcome.failed, 1);
    assert!(outcome.pull_abandoned);
    assert_eq!(client.all_records(), vec![client.note(&draft.id).unwrap()]);
}

#[test]
fn no_connectivity_sends_nothing() {
    let server = FakeNotesServer::shared();
    let client = ClientStack::signed_in(&server, ADA);
    client.add_note("a", "");
    client.network.set_online(false);
    server.clear_requests();
    let before = client.all_records();

    let outcome = client.engine.synchronize().unwrap();

    assert!(outcome.offline);
    assert!(server.requests().is_empty());
    assert_eq!(client.all_records(), before);
}

#[test]
fn two_devices_converge() {
    let server = FakeNotesServer::shared();
    let phone = ClientStack::signed_in(&server, ADA);
    let laptop = ClientStack::signed_in(&server, ADA);

    let draft = phone.add_note("shared", "v1");
    phone.engine.synchronize().unwrap();
    laptop.engine.synchronize().unwrap();

    let on_laptop = laptop.visible();
    assert_eq!(on_laptop.len(), 1);
    assert_eq!(on_laptop[0].content, "v1");
    assert_ne!(on_laptop[0].id, draft.id);

    laptop.edit_note(&on_laptop[0].id, "shared", "v2");
    laptop.engine.synchronize().unwrap();
    phone.engine.synchronize().unwrap();

    assert_eq!(phone.visible()[0].content, "v2");
    assert_eq!(phone.visible(), laptop.visible());
}

#[test]
fn accounts_do_not_see_each_other() {
    let server = FakeNotesServer::shared();
    let ada = ClientStack::signed_in(&server, ADA);
    let bob = ClientStack::signed_in(&server, "bob@example.com");

    ada.add_note("private", "");
    ada.engine.synchronize().unwrap();
    bob.engine.synchronize().unwrap();

    assert!(bob.visible().is_empty());
}

#[test]
fn concurrent_calls_share_one_refresh() {
    let server = FakeNotesServer::shared();
    let client = ClientStack::signed_in(&server, ADA);
    server.put_note(ADA, "a", "").unwrap();
    server.expire_access_tokens();
    server.clear_requests();

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let remote = Arc::clone(&client.remote);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                remote.list().unwrap()
            })
        })
        .collect();

    for handle in handles {
        let status = handle.join().unwrap();
        assert!(matches!(status, RemoteStatus::Success(ref notes) if notes.len() == 1));
    }
    assert_eq!(server.count(&Method::POST, REFRESH_PATH), 1);
}

#[test]
fn me_binds_a_persistent_store() {
    let server = FakeNotesServer::shared();
    let client = ClientStack::signed_in(&server, ADA);
    let dir = tempfile::tempdir().unwrap();

    let me = client.remote.me().unwrap();
    assert_eq!(me.email, ADA);
    let user = UserKey::new(me.id).unwrap();

    {
        let store = FileNoteStore::open(dir.path(), &user).unwrap();
        store
            .upsert(&notesync_core::Note::draft("on disk", "", chrono::Utc::now()))
            .unwrap();

        let transport =
            AuthenticatedTransport::new(Arc::clone(&server), Arc::clone(&client.auth));
        let remote = HttpRemoteClient::new(ClientConfig::new(TEST_BASE_URL), transport);
        let engine = SyncEngine::new(remote, store, AlwaysOnline);
        assert_eq!(engine.synchronize().unwrap().created, 1);
    }

    let reopened = FileNoteStore::open(dir.path(), &user).unwrap();
    let notes = reopened.get_all().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, server.notes_of(ADA)[0].id);
    assert!(reopened.get_dirty_or_deleted().unwrap().is_empty());
}
