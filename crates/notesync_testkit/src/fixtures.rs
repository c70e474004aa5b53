//! Client fixtures wired against [`FakeNotesServer`].

use crate::server::FakeNotesServer;
use chrono::{DateTime, Utc};
use notesync_core::{MemoryNoteStore, Note, NoteId, NoteStore};
use notesync_engine::{
    AuthClient, AuthenticatedTransport, ClientConfig, HttpRemoteClient, ManualConnectivity,
    MemoryCredentialStore, SyncEngine,
};
use std::sync::Arc;

/// Password accepted by the reference server's rules.
pub const TEST_PASSWORD: &str = "Passw0rd!";

/// Base URL the fixtures use; the loopback never resolves it.
pub const TEST_BASE_URL: &str = "http://notes.test";

/// Auth client of a [`ClientStack`].
pub type TestAuth = AuthClient<Arc<FakeNotesServer>, Arc<MemoryCredentialStore>>;

/// Authenticated transport of a [`ClientStack`].
pub type TestTransport = AuthenticatedTransport<Arc<FakeNotesServer>, Arc<TestAuth>>;

/// Remote client of a [`ClientStack`].
pub type TestRemote = HttpRemoteClient<TestTransport>;

/// Sync engine of a [`ClientStack`].
pub type TestEngine = SyncEngine<Arc<TestRemote>, Arc<MemoryNoteStore>, Arc<ManualConnectivity>>;

/// A complete client: credential store, auth client, authenticated
/// transport, remote client, local store and sync engine.
pub struct ClientStack {
    /// The server this client talks to.
    pub server: Arc<FakeNotesServer>,
    /// Credential storage.
    pub credentials: Arc<MemoryCredentialStore>,
    /// Login, registration and refresh.
    pub auth: Arc<TestAuth>,
    /// Notes API behind the authenticated transport.
    pub remote: Arc<TestRemote>,
    /// The local store.
    pub store: Arc<MemoryNoteStore>,
    /// Connectivity switch.
    pub network: Arc<ManualConnectivity>,
    /// The engine under test.
    pub engine: TestEngine,
}

impl ClientStack {
    /// Builds a signed-out client for `server`.
    pub fn new(server: &Arc<FakeNotesServer>) -> Self {
        Self::with_store(server, MemoryNoteStore::new())
    }

    /// Builds a signed-out client with a pre-populated local store.
    pub fn with_store(server: &Arc<FakeNotesServer>, store: MemoryNoteStore) -> Self {
        let config = ClientConfig::new(TEST_BASE_URL);
        let credentials = Arc::new(MemoryCredentialStore::new());
        let auth = Arc::new(AuthClient::new(
            config.clone(),
            Arc::clone(server),
            Arc::clone(&credentials),
        ));
        let transport = AuthenticatedTransport::new(Arc::clone(server), Arc::clone(&auth));
        let remote = Arc::new(HttpRemoteClient::new(config, transport));
        let store = Arc::new(store);
        let network = Arc::new(ManualConnectivity::new(true));
        let engine = SyncEngine::new(Arc::clone(&remote), Arc::clone(&store), Arc::clone(&network));

        Self {
            server: Arc::clone(server),
            credentials,
            auth,
            remote,
            store,
            network,
            engine,
        }
    }

    /// Builds a client logged in as `email`, registering the account first
    /// if the server does not know it.
    pub fn signed_in(server: &Arc<FakeNotesServer>, email: &str) -> Self {
        let stack = Self::new(server);
        stack.sign_in(email);
        stack
    }

    /// Logs in as `email`, registering the account if needed.
    pub fn sign_in(&self, email: &str) {
        if self.server.user_id(email).is_none() {
            self.server
                .register_user(email, TEST_PASSWORD)
                .expect("fixture account should be valid");
        }
        self.auth
            .login(email, TEST_PASSWORD)
            .expect("fixture login should succeed");
    }

    /// Creates a note locally, as the user would while offline.
    pub fn add_note(&self, title: &str, content: &str) -> Note {
        let note = Note::draft(title, content, Utc::now());
        self.store.upsert(&note).expect("memory store write");
        note
    }

    /// Edits a local note.
    pub fn edit_note(&self, id: &NoteId, title: &str, content: &str) -> Note {
        let mut note = self.note(id).expect("note to edit should exist");
        note.edit(title, content, Utc::now());
        self.store.upsert(&note).expect("memory store write");
        note
    }

    /// Soft-deletes a local note.
    pub fn delete_note(&self, id: &NoteId) {
        let mut note = self.note(id).expect("note to delete should exist");
        note.mark_deleted();
        self.store.upsert(&note).expect("memory store write");
    }

    /// Looks up a local note, including soft-deleted ones.
    pub fn note(&self, id: &NoteId) -> Option<Note> {
        self.store.get(id).expect("memory store read")
    }

    /// Returns the notes the user would see.
    pub fn visible(&self) -> Vec<Note> {
        self.store.get_all().expect("memory store read")
    }

    /// Returns every record in the store, soft-deleted ones included.
    pub fn all_records(&self) -> Vec<Note> {
        self.store.snapshot()
    }
}

/// Fixed instant `seconds` after a reference epoch.
pub fn instant(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + seconds, 0).expect("timestamp in range")
}

/// A clean local record, as if pulled earlier.
pub fn synced_note(id: NoteId, title: &str, updated: DateTime<Utc>) -> Note {
    Note {
        id,
        title: title.to_string(),
        content: format!("{title} body"),
        created_at_utc: updated,
        updated_at_utc: updated,
        dirty: false,
        deleted: false,
    }
}
