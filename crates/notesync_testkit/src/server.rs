//! In-process reference notes server.
//!
//! [`FakeNotesServer`] implements [`HttpClient`] directly, so a client built
//! on it exercises the real request descriptors, JSON bodies and status
//! handling without a socket. Behavior follows the production service:
//!
//! - notes are private to the account that created them
//! - ids and timestamps are assigned by the server
//! - an update whose `updatedAtUtc` is older than the stored note gets 409,
//!   an accepted update is restamped with the server's clock
//! - unknown ids get 404, missing or expired access tokens get 401
//! - refresh tokens are single-use; every refresh rotates the pair

use chrono::{DateTime, Duration, Utc};
use notesync_engine::{HttpClient, HttpRequest, HttpResponse, Method, SyncError, SyncResult};
use notesync_protocol::{
    AuthResponse, ErrorBody, LoginRequest, MeResponse, NoteCreate, NoteUpdate, RefreshRequest,
    RegisterRequest, RemoteNote, LOGIN_PATH, ME_PATH, NOTES_PATH, REFRESH_PATH, REGISTER_PATH,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Lifetime of issued access tokens unless configured otherwise.
pub const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;

/// A request as seen by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    /// HTTP method.
    pub method: Method,
    /// URL path.
    pub path: String,
    /// Bearer token carried, if any.
    pub bearer: Option<String>,
}

#[derive(Debug, Clone)]
struct Account {
    id: String,
    email: String,
    password: String,
}

#[derive(Debug, Clone)]
struct AccessGrant {
    user_id: String,
    expires_utc: DateTime<Utc>,
}

#[derive(Default)]
struct ServerState {
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, AccessGrant>,
    refresh_tokens: HashMap<String, String>,
    notes: HashMap<String, BTreeMap<Uuid, RemoteNote>>,
}

impl ServerState {
    fn account_by_id(&self, user_id: &str) -> Option<&Account> {
        self.accounts.values().find(|a| a.id == user_id)
    }

    fn user_id_of(&self, email: &str) -> Option<String> {
        self.accounts.get(&email.to_ascii_lowercase()).map(|a| a.id.clone())
    }

    fn notes_mut(&mut self, user_id: &str) -> &mut BTreeMap<Uuid, RemoteNote> {
        self.notes.entry(user_id.to_string()).or_default()
    }
}

/// The reference notes server.
pub struct FakeNotesServer {
    state: Mutex<ServerState>,
    faults: Mutex<VecDeque<u16>>,
    offline: AtomicBool,
    log: Mutex<Vec<RequestRecord>>,
    clock_offset: Mutex<Duration>,
    access_ttl: Duration,
}

impl FakeNotesServer {
    /// Creates an empty server.
    pub fn new() -> Self {
        Self::with_access_ttl(Duration::minutes(DEFAULT_ACCESS_TTL_MINUTES))
    }

    /// Creates an empty server issuing access tokens valid for `ttl`.
    pub fn with_access_ttl(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(ServerState::default()),
            faults: Mutex::new(VecDeque::new()),
            offline: AtomicBool::new(false),
            log: Mutex::new(Vec::new()),
            clock_offset: Mutex::new(Duration::zero()),
            access_ttl: ttl,
        }
    }

    /// Creates an empty server behind an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Server clock.
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now() + *self.clock_offset.lock()
    }

    /// Moves the server clock forward.
    pub fn advance_clock(&self, by: Duration) {
        let mut offset = self.clock_offset.lock();
        *offset = *offset + by;
    }

    // ---- fault injection ----

    /// Answers the next request, whatever it is, with `status` and no body.
    pub fn fail_next(&self, status: u16) {
        self.faults.lock().push_back(status);
    }

    /// Refuses every request with a transport error while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Invalidates every access token issued so far.
    pub fn expire_access_tokens(&self) {
        let expired = self.now() - Duration::seconds(1);
        for grant in self.state.lock().access_tokens.values_mut() {
            grant.expires_utc = expired;
        }
    }

    /// Invalidates every refresh token issued so far.
    pub fn revoke_refresh_tokens(&self) {
        self.state.lock().refresh_tokens.clear();
    }

    // ---- inspection ----

    /// Returns every request received.
    pub fn requests(&self) -> Vec<RequestRecord> {
        self.log.lock().clone()
    }

    /// Counts requests with `method` whose path starts with `prefix`.
    pub fn count(&self, method: &Method, prefix: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|r| r.method == *method && r.path.starts_with(prefix))
            .count()
    }

    /// Forgets the request log.
    pub fn clear_requests(&self) {
        self.log.lock().clear();
    }

    // ---- direct manipulation, as another device would ----

    /// Creates an account, returning its id or the validation errors.
    pub fn register_user(&self, email: &str, password: &str) -> Result<String, Vec<String>> {
        let errors = validate_registration(email, password);
        let mut state = self.state.lock();
        let key = email.to_ascii_lowercase();
        if state.accounts.contains_key(&key) {
            return Err(vec![format!("Username '{email}' is already taken.")]);
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let account = Account {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let id = account.id.clone();
        state.accounts.insert(key, account);
        Ok(id)
    }

    /// Returns the id of the account registered under `email`.
    pub fn user_id(&self, email: &str) -> Option<String> {
        self.state.lock().user_id_of(email)
    }

    /// Returns an account's notes, newest first.
    pub fn notes_of(&self, email: &str) -> Vec<RemoteNote> {
        let mut state = self.state.lock();
        let Some(user_id) = state.user_id_of(email) else {
            return Vec::new();
        };
        newest_first(state.notes_mut(&user_id))
    }

    /// Creates a note for an account directly.
    pub fn put_note(&self, email: &str, title: &str, content: &str) -> Option<RemoteNote> {
        let now = self.now();
        let mut state = self.state.lock();
        let user_id = state.user_id_of(email)?;
        let note = RemoteNote {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: content.to_string(),
            created_at_utc: now,
            updated_at_utc: now,
        };
        state.notes_mut(&user_id).insert(note.id, note.clone());
        Some(note)
    }

    /// Edits a note directly, restamping it with the server clock.
    pub fn edit_note(&self, email: &str, id: &Uuid, title: &str, content: &str) -> Option<RemoteNote> {
        let now = self.now();
        let mut state = self.state.lock();
        let user_id = state.user_id_of(email)?;
        let note = state.notes_mut(&user_id).get_mut(id)?;
        note.title = title.to_string();
        note.content = content.to_string();
        note.updated_at_utc = now;
        Some(note.clone())
    }

    /// Deletes a note directly.
    pub fn remove_note(&self, email: &str, id: &Uuid) -> bool {
        let mut state = self.state.lock();
        match state.user_id_of(email) {
            Some(user_id) => state.notes_mut(&user_id).remove(id).is_some(),
            None => false,
        }
    }

    // ---- routing ----

    fn route(&self, request: &HttpRequest) -> HttpResponse {
        let method = request.method();
        let path = request.path();

        if *method == Method::POST && path == REGISTER_PATH {
            return self.handle_register(request);
        }
        if *method == Method::POST && path == LOGIN_PATH {
            return self.handle_login(request);
        }
        if *method == Method::POST && path == REFRESH_PATH {
            return self.handle_refresh(request);
        }
        if *method == Method::GET && path == ME_PATH {
            return self.handle_me(request);
        }
        if path == NOTES_PATH || path.starts_with(&format!("{NOTES_PATH}/")) {
            return self.handle_notes(request);
        }
        HttpResponse::empty(404)
    }

    fn handle_register(&self, request: &HttpRequest) -> HttpResponse {
        let Some(body) = body_of::<RegisterRequest>(request) else {
            return HttpResponse::empty(400);
        };
        match self.register_user(&body.email, &body.password) {
            Ok(_) => HttpResponse::empty(200),
            Err(errors) => json(400, &ErrorBody { errors }),
        }
    }

    fn handle_login(&self, request: &HttpRequest) -> HttpResponse {
        let Some(body) = body_of::<LoginRequest>(request) else {
            return HttpResponse::empty(400);
        };
        let mut state = self.state.lock();
        let user_id = match state.accounts.get(&body.email.to_ascii_lowercase()) {
            Some(account) if account.password == body.password => account.id.clone(),
            _ => return HttpResponse::empty(401),
        };
        json(200, &self.issue(&mut state, &user_id))
    }

    fn handle_refresh(&self, request: &HttpRequest) -> HttpResponse {
        let Some(body) = body_of::<RefreshRequest>(request) else {
            return HttpResponse::empty(400);
        };
        let mut state = self.state.lock();
        let Some(user_id) = state.refresh_tokens.remove(&body.refresh_token) else {
            return HttpResponse::empty(401);
        };
        if state.account_by_id(&user_id).is_none() {
            return HttpResponse::empty(401);
        }
        debug!(user = %user_id, "refresh token rotated");
        json(200, &self.issue(&mut state, &user_id))
    }

    fn handle_me(&self, request: &HttpRequest) -> HttpResponse {
        let state = self.state.lock();
        let Some(user_id) = self.authorize(&state, request) else {
            return HttpResponse::empty(401);
        };
        match state.account_by_id(&user_id) {
            Some(account) => json(
                200,
                &MeResponse {
                    id: account.id.clone(),
                    email: account.email.clone(),
                },
            ),
            None => HttpResponse::empty(404),
        }
    }

    fn handle_notes(&self, request: &HttpRequest) -> HttpResponse {
        let now = self.now();
        let mut state = self.state.lock();
        let Some(user_id) = self.authorize(&state, request) else {
            return HttpResponse::empty(401);
        };
        let notes = state.notes_mut(&user_id);
        let method = request.method();

        let id = match request.path().strip_prefix(&format!("{NOTES_PATH}/")) {
            None => None,
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) => Some(id),
                Err(_) => return HttpResponse::empty(404),
            },
        };

        match id {
            None if *method == Method::GET => json(200, &newest_first(notes)),
            None if *method == Method::POST => {
                let Some(body) = body_of::<NoteCreate>(request) else {
                    return HttpResponse::empty(400);
                };
                let note = RemoteNote {
                    id: Uuid::new_v4(),
                    title: body.title,
                    content: body.content,
                    created_at_utc: now,
                    updated_at_utc: now,
                };
                notes.insert(note.id, note.clone());
                json(201, &note)
            }
            Some(id) if *method == Method::GET => match notes.get(&id) {
                Some(note) => json(200, note),
                None => HttpResponse::empty(404),
            },
            Some(id) if *method == Method::PUT => {
                let Some(body) = body_of::<NoteUpdate>(request) else {
                    return HttpResponse::empty(400);
                };
                let Some(note) = notes.get_mut(&id) else {
                    return HttpResponse::empty(404);
                };
                if body.updated_at_utc < note.updated_at_utc {
                    return json(
                        409,
                        &serde_json::json!({ "message": "Local version is older than the server's." }),
                    );
                }
                note.title = body.title;
                note.content = body.content;
                note.updated_at_utc = now;
                HttpResponse::empty(204)
            }
            Some(id) if *method == Method::DELETE => match notes.remove(&id) {
                Some(_) => HttpResponse::empty(204),
                None => HttpResponse::empty(404),
            },
            _ => HttpResponse::empty(405),
        }
    }

    fn authorize(&self, state: &ServerState, request: &HttpRequest) -> Option<String> {
        let grant = state.access_tokens.get(request.bearer()?)?;
        if grant.expires_utc <= self.now() {
            return None;
        }
        Some(grant.user_id.clone())
    }

    fn issue(&self, state: &mut ServerState, user_id: &str) -> AuthResponse {
        let access_token = format!("at-{}", Uuid::new_v4().simple());
        let refresh_token = format!("rt-{}", Uuid::new_v4().simple());
        let expires_utc = self.now() + self.access_ttl;

        state.access_tokens.insert(
            access_token.clone(),
            AccessGrant {
                user_id: user_id.to_string(),
                expires_utc,
            },
        );
        state
            .refresh_tokens
            .insert(refresh_token.clone(), user_id.to_string());

        AuthResponse {
            access_token,
            expires_utc,
            refresh_token,
        }
    }
}

impl Default for FakeNotesServer {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for FakeNotesServer {
    fn execute(&self, request: &HttpRequest) -> SyncResult<HttpResponse> {
        self.log.lock().push(RequestRecord {
            method: request.method().clone(),
            path: request.path().to_string(),
            bearer: request.bearer().map(str::to_string),
        });

        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("connection refused"));
        }
        if let Some(status) = self.faults.lock().pop_front() {
            return Ok(HttpResponse::empty(status));
        }
        Ok(self.route(request))
    }
}

/// Password and email rules of the production identity service.
fn validate_registration(email: &str, password: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let at = email.find('@');
    if !matches!(at, Some(i) if i > 0 && i + 1 < email.len()) {
        errors.push(format!("Email '{email}' is invalid."));
    }
    if password.chars().count() < 6 {
        errors.push("Passwords must be at least 6 characters.".to_string());
    }
    if password.chars().all(char::is_alphanumeric) {
        errors.push("Passwords must have at least one non alphanumeric character.".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Passwords must have at least one digit ('0'-'9').".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Passwords must have at least one lowercase ('a'-'z').".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Passwords must have at least one uppercase ('A'-'Z').".to_string());
    }
    errors
}

fn newest_first(notes: &BTreeMap<Uuid, RemoteNote>) -> Vec<RemoteNote> {
    let mut all: Vec<RemoteNote> = notes.values().cloned().collect();
    all.sort_by(|a, b| b.updated_at_utc.cmp(&a.updated_at_utc));
    all
}

fn body_of<T: DeserializeOwned>(request: &HttpRequest) -> Option<T> {
    notesync_protocol::decode(request.body()?).ok()
}

fn json<T: Serialize>(status: u16, value: &T) -> HttpResponse {
    HttpResponse::json(status, value).unwrap_or_else(|_| HttpResponse::empty(500))
}
