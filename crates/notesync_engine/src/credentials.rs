//! Credential pair storage and the provider seam used by the transport.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use notesync_protocol::AuthResponse;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Access/refresh credential pair.
///
/// The refresh credential is single-use: every refresh returns a new pair
/// that replaces this one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Short-lived bearer credential.
    pub access_token: String,
    /// Longer-lived credential exchanged for a new pair.
    pub refresh_token: String,
    /// Expiry of `access_token`.
    pub expires_utc: DateTime<Utc>,
}

impl Credentials {
    /// Returns true if the access credential has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_utc
    }
}

impl From<AuthResponse> for Credentials {
    fn from(response: AuthResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_utc: response.expires_utc,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_utc", &self.expires_utc)
            .finish()
    }
}

/// Persistent home of the credential pair (the platform secure store).
pub trait CredentialStore: Send + Sync {
    /// Loads the stored pair.
    fn load(&self) -> SyncResult<Option<Credentials>>;

    /// Replaces the stored pair.
    fn save(&self, credentials: &Credentials) -> SyncResult<()>;

    /// Removes the stored pair.
    fn clear(&self) -> SyncResult<()>;
}

impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    fn load(&self) -> SyncResult<Option<Credentials>> {
        (**self).load()
    }

    fn save(&self, credentials: &Credentials) -> SyncResult<()> {
        (**self).save(credentials)
    }

    fn clear(&self) -> SyncResult<()> {
        (**self).clear()
    }
}

/// Source of the current access credential, able to rotate it.
///
/// This is the only view of credentials the transport has; the sync engine
/// never sees one.
pub trait CredentialProvider: Send + Sync {
    /// Returns the cached access credential, if any.
    fn access_token(&self) -> Option<String>;

    /// Exchanges the refresh credential for a new pair.
    fn refresh(&self) -> SyncResult<()>;
}

impl<P: CredentialProvider + ?Sized> CredentialProvider for Arc<P> {
    fn access_token(&self) -> Option<String> {
        (**self).access_token()
    }

    fn refresh(&self) -> SyncResult<()> {
        (**self).refresh()
    }
}

/// An in-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credentials: RwLock<Option<Credentials>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `credentials`.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials: RwLock::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> SyncResult<Option<Credentials>> {
        Ok(self.credentials.read().clone())
    }

    fn save(&self, credentials: &Credentials) -> SyncResult<()> {
        *self.credentials.write() = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> SyncResult<()> {
        *self.credentials.write() = None;
        Ok(())
    }
}

/// A credential store kept in a JSON file.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Uses the file at `path`, creating parent directories on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the credentials file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> SyncResult<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path).map_err(|e| SyncError::Credentials(e.to_string()))?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| SyncError::Credentials(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, credentials: &Credentials) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::Credentials(e.to_string()))?;
        }
        let bytes = serde_json::to_vec_pretty(credentials)
            .map_err(|e| SyncError::Credentials(e.to_string()))?;
        fs::write(&self.path, bytes).map_err(|e| SyncError::Credentials(e.to_string()))
    }

    fn clear(&self) -> SyncResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Credentials(e.to_string())),
        }
    }
}
