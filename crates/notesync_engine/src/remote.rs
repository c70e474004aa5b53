//! The remote notes collection.

use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use notesync_core::NoteId;
use notesync_protocol::{note_path, MeResponse, NoteCreate, NoteUpdate, RemoteNote, ME_PATH, NOTES_PATH};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Outcome of a remote call that got an answer from the server.
///
/// Calls that got no answer at all surface as `Err(SyncError::Transport)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus<T> {
    /// 2xx with the decoded payload.
    Success(T),
    /// 404.
    NotFound,
    /// 401 that survived the transport's refresh-and-retry.
    Unauthorized,
    /// Any other status.
    Failed(u16),
    /// 2xx whose body could not be decoded. The server acted on the
    /// request; only its answer is lost.
    Unreadable(u16),
}

impl<T> RemoteStatus<T> {
    /// Classifies a non-2xx status.
    pub fn from_failure(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            401 => Self::Unauthorized,
            other => Self::Failed(other),
        }
    }

    /// Returns true for [`RemoteStatus::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the payload of a successful call.
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Maps the success payload.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RemoteStatus<U> {
        match self {
            Self::Success(value) => RemoteStatus::Success(f(value)),
            Self::NotFound => RemoteStatus::NotFound,
            Self::Unauthorized => RemoteStatus::Unauthorized,
            Self::Failed(status) => RemoteStatus::Failed(status),
            Self::Unreadable(status) => RemoteStatus::Unreadable(status),
        }
    }
}

/// Operations on the remote note collection.
pub trait RemoteNotes: Send + Sync {
    /// Fetches the whole collection.
    fn list(&self) -> SyncResult<RemoteStatus<Vec<RemoteNote>>>;

    /// Creates a note; the server assigns its identity and timestamps.
    fn create(&self, title: &str, content: &str) -> SyncResult<RemoteStatus<RemoteNote>>;

    /// Updates a note.
    ///
    /// The server may answer without a body, in which case the accepted
    /// timestamp is the one that was sent.
    fn update(
        &self,
        id: &NoteId,
        title: &str,
        content: &str,
        updated_at_utc: DateTime<Utc>,
    ) -> SyncResult<RemoteStatus<Option<RemoteNote>>>;

    /// Deletes a note.
    fn delete(&self, id: &NoteId) -> SyncResult<RemoteStatus<()>>;
}

impl<R: RemoteNotes + ?Sized> RemoteNotes for Arc<R> {
    fn list(&self) -> SyncResult<RemoteStatus<Vec<RemoteNote>>> {
        (**self).list()
    }

    fn create(&self, title: &str, content: &str) -> SyncResult<RemoteStatus<RemoteNote>> {
        (**self).create(title, content)
    }

    fn update(
        &self,
        id: &NoteId,
        title: &str,
        content: &str,
        updated_at_utc: DateTime<Utc>,
    ) -> SyncResult<RemoteStatus<Option<RemoteNote>>> {
        (**self).update(id, title, content, updated_at_utc)
    }

    fn delete(&self, id: &NoteId) -> SyncResult<RemoteStatus<()>> {
        (**self).delete(id)
    }
}

/// [`RemoteNotes`] over HTTP.
///
/// `C` is normally an [`AuthenticatedTransport`](crate::AuthenticatedTransport).
pub struct HttpRemoteClient<C: HttpClient> {
    config: ClientConfig,
    http: C,
}

impl<C: HttpClient> HttpRemoteClient<C> {
    /// Creates a new remote client.
    pub fn new(config: ClientConfig, http: C) -> Self {
        Self { config, http }
    }

    /// Returns the underlying HTTP client.
    pub fn http(&self) -> &C {
        &self.http
    }

    /// Returns the account the current credential belongs to.
    pub fn me(&self) -> SyncResult<MeResponse> {
        let response = self.http.execute(&HttpRequest::get(self.config.url(ME_PATH)))?;
        match response.status() {
            401 => Err(SyncError::NotAuthenticated),
            _ if response.is_success() => response.decode(),
            status => Err(SyncError::UnexpectedStatus(status)),
        }
    }

    fn call<T>(
        &self,
        request: HttpRequest,
        on_success: impl FnOnce(&HttpResponse) -> SyncResult<T>,
    ) -> SyncResult<RemoteStatus<T>> {
        let response = self.http.execute(&request)?;
        debug!(
            method = %request.method(),
            path = request.path(),
            status = response.status(),
            "remote call"
        );
        if !response.is_success() {
            return Ok(RemoteStatus::from_failure(response.status()));
        }
        match on_success(&response) {
            Ok(value) => Ok(RemoteStatus::Success(value)),
            Err(e) => {
                warn!(
                    method = %request.method(),
                    path = request.path(),
                    status = response.status(),
                    error = %e,
                    "accepted but response body unreadable"
                );
                Ok(RemoteStatus::Unreadable(response.status()))
            }
        }
    }
}

impl<C: HttpClient> RemoteNotes for HttpRemoteClient<C> {
    fn list(&self) -> SyncResult<RemoteStatus<Vec<RemoteNote>>> {
        self.call(HttpRequest::get(self.config.url(NOTES_PATH)), |r| r.decode())
    }

    fn create(&self, title: &str, content: &str) -> SyncResult<RemoteStatus<RemoteNote>> {
        let request = HttpRequest::post(self.config.url(NOTES_PATH))
            .with_json(&NoteCreate::new(title, content))?;
        self.call(request, |r| r.decode())
    }

    fn update(
        &self,
        id: &NoteId,
        title: &str,
        content: &str,
        updated_at_utc: DateTime<Utc>,
    ) -> SyncResult<RemoteStatus<Option<RemoteNote>>> {
        let request = HttpRequest::put(self.config.url(&note_path(id)))
            .with_json(&NoteUpdate::new(title, content, updated_at_utc))?;
        self.call(request, |r| {
            if r.body().is_empty() {
                Ok(None)
            } else {
                r.decode().map(Some)
            }
        })
    }

    fn delete(&self, id: &NoteId) -> SyncResult<RemoteStatus<()>> {
        self.call(HttpRequest::delete(self.config.url(&note_path(id))), |_| Ok(()))
    }
}

/// Kind of remote call, for failure scripting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    /// [`RemoteNotes::list`].
    List,
    /// [`RemoteNotes::create`].
    Create,
    /// [`RemoteNotes::update`].
    Update,
    /// [`RemoteNotes::delete`].
    Delete,
}

/// A call recorded by [`MockRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// A list call.
    List,
    /// A create call.
    Create {
        /// Title sent.
        title: String,
        /// Body sent.
        content: String,
    },
    /// An update call.
    Update {
        /// Target identity.
        id: NoteId,
        /// Title sent.
        title: String,
        /// Body sent.
        content: String,
        /// Timestamp sent.
        updated_at_utc: DateTime<Utc>,
    },
    /// A delete call.
    Delete(NoteId),
}

impl RemoteCall {
    /// Returns the kind of call.
    pub fn op(&self) -> RemoteOp {
        match self {
            Self::List => RemoteOp::List,
            Self::Create { .. } => RemoteOp::Create,
            Self::Update { .. } => RemoteOp::Update,
            Self::Delete(_) => RemoteOp::Delete,
        }
    }
}

type CallHook = Arc<dyn Fn(&RemoteCall) + Send + Sync>;

/// In-memory remote collection for tests.
///
/// Behaves like the real server: it assigns ids and timestamps on create,
/// answers 404 for unknown ids and 409 for updates older than its copy.
/// Failures can be scripted per operation, and the whole remote can be taken
/// offline.
pub struct MockRemote {
    notes: Mutex<BTreeMap<NoteId, RemoteNote>>,
    calls: Mutex<Vec<RemoteCall>>,
    failures: Mutex<HashMap<RemoteOp, u16>>,
    unreadable: Mutex<HashSet<RemoteOp>>,
    offline: AtomicBool,
    hook: Mutex<Option<CallHook>>,
}

impl MockRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self {
            notes: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            unreadable: Mutex::new(HashSet::new()),
            offline: AtomicBool::new(false),
            hook: Mutex::new(None),
        }
    }

    /// Creates a remote holding `notes`.
    pub fn with_notes(notes: impl IntoIterator<Item = RemoteNote>) -> Self {
        let remote = Self::new();
        for note in notes {
            remote.insert(note);
        }
        remote
    }

    /// Inserts or replaces a note, as another device would.
    pub fn insert(&self, note: RemoteNote) {
        self.notes.lock().insert(note.id, note);
    }

    /// Looks up a note.
    pub fn note(&self, id: &NoteId) -> Option<RemoteNote> {
        self.notes.lock().get(id).cloned()
    }

    /// Returns every note.
    pub fn notes(&self) -> Vec<RemoteNote> {
        self.notes.lock().values().cloned().collect()
    }

    /// Returns the calls received so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Returns how many calls of `op` were received.
    pub fn count(&self, op: RemoteOp) -> usize {
        self.calls.lock().iter().filter(|c| c.op() == op).count()
    }

    /// Answers every `op` call with `status` until cleared.
    pub fn fail(&self, op: RemoteOp, status: u16) {
        self.failures.lock().insert(op, status);
    }

    /// Carries out every `op` call but answers it as
    /// [`RemoteStatus::Unreadable`], until cleared.
    pub fn answer_unreadable(&self, op: RemoteOp) {
        self.unreadable.lock().insert(op);
    }

    /// Removes all scripted failures and unreadable answers.
    pub fn clear_failures(&self) {
        self.failures.lock().clear();
        self.unreadable.lock().clear();
    }

    fn answer<T>(&self, op: RemoteOp, status: u16, value: T) -> RemoteStatus<T> {
        if self.unreadable.lock().contains(&op) {
            RemoteStatus::Unreadable(status)
        } else {
            RemoteStatus::Success(value)
        }
    }

    /// Makes every call fail with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Runs `hook` after each call is recorded and before it is answered.
    pub fn set_hook(&self, hook: impl Fn(&RemoteCall) + Send + Sync + 'static) {
        *self.hook.lock() = Some(Arc::new(hook));
    }

    fn record<T>(&self, call: RemoteCall) -> SyncResult<Option<RemoteStatus<T>>> {
        let op = call.op();
        self.calls.lock().push(call.clone());

        let hook = self.hook.lock().clone();
        if let Some(hook) = hook {
            hook(&call);
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("remote unreachable"));
        }
        Ok(self
            .failures
            .lock()
            .get(&op)
            .map(|status| RemoteStatus::from_failure(*status)))
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteNotes for MockRemote {
    fn list(&self) -> SyncResult<RemoteStatus<Vec<RemoteNote>>> {
        if let Some(status) = self.record(RemoteCall::List)? {
            return Ok(status);
        }
        Ok(self.answer(RemoteOp::List, 200, self.notes()))
    }

    fn create(&self, title: &str, content: &str) -> SyncResult<RemoteStatus<RemoteNote>> {
        let call = RemoteCall::Create {
            title: title.to_string(),
            content: content.to_string(),
        };
        if let Some(status) = self.record(call)? {
            return Ok(status);
        }

        let now = Utc::now();
        let note = RemoteNote {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: content.to_string(),
            created_at_utc: now,
            updated_at_utc: now,
        };
        self.insert(note.clone());
        Ok(self.answer(RemoteOp::Create, 201, note))
    }

    fn update(
        &self,
        id: &NoteId,
        title: &str,
        content: &str,
        updated_at_utc: DateTime<Utc>,
    ) -> SyncResult<RemoteStatus<Option<RemoteNote>>> {
        let call = RemoteCall::Update {
            id: *id,
            title: title.to_string(),
            content: content.to_string(),
            updated_at_utc,
        };
        if let Some(status) = self.record(call)? {
            return Ok(status);
        }

        let mut notes = self.notes.lock();
        let Some(existing) = notes.get_mut(id) else {
            return Ok(RemoteStatus::NotFound);
        };
        if updated_at_utc < existing.updated_at_utc {
            return Ok(RemoteStatus::Failed(409));
        }
        existing.title = title.to_string();
        existing.content = content.to_string();
        existing.updated_at_utc = updated_at_utc;
        Ok(self.answer(RemoteOp::Update, 204, None))
    }

    fn delete(&self, id: &NoteId) -> SyncResult<RemoteStatus<()>> {
        if let Some(status) = self.record(RemoteCall::Delete(*id))? {
            return Ok(status);
        }
        match self.notes.lock().remove(id) {
            Some(_) => Ok(self.answer(RemoteOp::Delete, 204, ())),
            None => Ok(RemoteStatus::NotFound),
        }
    }
}
