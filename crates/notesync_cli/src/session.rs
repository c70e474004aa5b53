//! The session file: which server, which account.

use crate::error::{CliError, CliResult};
use notesync_core::{CoreError, UserKey};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the session inside the data directory.
pub const SESSION_FILE: &str = "session.json";

/// Persisted session state.
///
/// The credential pair is kept apart, in the credential store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Server base URL, if one was chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    /// Server-side id of the logged-in account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Email of the logged-in account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Session {
    /// Returns the session path for a data directory.
    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(SESSION_FILE)
    }

    /// Loads the session, or an empty one if none was saved.
    pub fn load(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(path).map_err(|e| session_error(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| session_error(path, e))
    }

    /// Saves the session.
    pub fn save(&self, path: &Path) -> CliResult<()> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| session_error(path, e))?;
        fs::write(path, bytes).map_err(|e| session_error(path, e))
    }

    /// Returns the bound user, if any.
    pub fn user(&self) -> CliResult<Option<UserKey>> {
        match &self.user_id {
            Some(id) => Ok(Some(UserKey::new(id.clone()).map_err(|e: CoreError| {
                CliError::Session {
                    path: SESSION_FILE.to_string(),
                    message: e.to_string(),
                }
            })?)),
            None => Ok(None),
        }
    }

    /// Binds an account.
    pub fn bind(&mut self, user: &UserKey, email: &str) {
        self.user_id = Some(user.as_str().to_string());
        self.email = Some(email.to_string());
    }

    /// Unbinds the account, keeping the server choice.
    pub fn unbind(&mut self) {
        self.user_id = None;
        self.email = None;
    }
}

fn session_error(path: &Path, err: impl std::fmt::Display) -> CliError {
    CliError::Session {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
