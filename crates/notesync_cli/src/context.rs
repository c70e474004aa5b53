//! Wiring of the client stack for one CLI invocation.

use crate::error::{CliError, CliResult};
use crate::session::Session;
use notesync_core::{FileNoteStore, UserKey};
use notesync_engine::{
    AuthClient, AuthenticatedTransport, ClientConfig, FileCredentialStore, HttpRemoteClient,
    ReqwestClient, SyncEngine, TcpProbe,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// File name of the credential pair inside the data directory.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Auth client used by the CLI.
pub type Auth = AuthClient<Arc<ReqwestClient>, Arc<FileCredentialStore>>;

/// Remote client used by the CLI.
pub type Remote = HttpRemoteClient<AuthenticatedTransport<Arc<ReqwestClient>, Arc<Auth>>>;

/// Sync engine used by the CLI.
pub type Engine = SyncEngine<Remote, FileNoteStore, TcpProbe>;

/// Everything a command needs.
pub struct Context {
    data_dir: PathBuf,
    session: Session,
    config: ClientConfig,
}

impl Context {
    /// Loads the session from `data_dir` (or the platform default).
    ///
    /// A `server` given on the command line replaces the remembered one.
    pub fn load(data_dir: Option<PathBuf>, server: Option<String>) -> CliResult<Self> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        fs::create_dir_all(&data_dir).map_err(|e| CliError::Session {
            path: data_dir.display().to_string(),
            message: e.to_string(),
        })?;

        let mut session = Session::load(&Session::path_in(&data_dir))?;
        if let Some(server) = server {
            session.server_url = Some(server);
            session.save(&Session::path_in(&data_dir))?;
        }

        let config = match &session.server_url {
            Some(url) => ClientConfig::new(url.as_str()),
            None => ClientConfig::default(),
        };
        debug!(data_dir = %data_dir.display(), server = %config.base_url, "context loaded");

        Ok(Self {
            data_dir,
            session,
            config,
        })
    }

    /// Returns the data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Binds the local store to an account and persists the choice.
    pub fn bind(&mut self, user: &UserKey, email: &str) -> CliResult<()> {
        self.session.bind(user, email);
        self.session.save(&Session::path_in(&self.data_dir))
    }

    /// Unbinds the account and persists the choice.
    pub fn unbind(&mut self) -> CliResult<()> {
        self.session.unbind();
        self.session.save(&Session::path_in(&self.data_dir))
    }

    /// Returns the bound user, failing loudly if there is none.
    pub fn user(&self) -> CliResult<UserKey> {
        self.session.user()?.ok_or(CliError::NotLoggedIn)
    }

    /// Opens the bound user's local store.
    pub fn store(&self) -> CliResult<FileNoteStore> {
        let user = self.user()?;
        Ok(FileNoteStore::open(&self.data_dir, &user)?)
    }

    /// Builds the auth client.
    pub fn auth(&self) -> CliResult<Arc<Auth>> {
        let http = Arc::new(ReqwestClient::new(&self.config)?);
        let credentials = Arc::new(FileCredentialStore::new(self.data_dir.join(CREDENTIALS_FILE)));
        Ok(Arc::new(AuthClient::new(self.config.clone(), http, credentials)))
    }

    /// Builds the notes client behind the authenticated transport.
    pub fn remote(&self) -> CliResult<Remote> {
        let http = Arc::new(ReqwestClient::new(&self.config)?);
        let transport = AuthenticatedTransport::new(http, self.auth()?);
        Ok(HttpRemoteClient::new(self.config.clone(), transport))
    }

    /// Builds the sync engine for the bound user.
    pub fn engine(&self) -> CliResult<Engine> {
        let store = self.store()?;
        let probe = TcpProbe::for_config(&self.config)?;
        Ok(SyncEngine::new(self.remote()?, store, probe))
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("notesync"))
        .unwrap_or_else(|| PathBuf::from(".notesync"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn note_commands_need_a_bound_user() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::load(Some(dir.path().to_path_buf()), None).unwrap();

        assert!(matches!(ctx.user(), Err(CliError::NotLoggedIn)));
        assert!(matches!(ctx.store(), Err(CliError::NotLoggedIn)));
    }

    #[test]
    fn server_flag_is_remembered() {
        let dir = TempDir::new().unwrap();
        let path = Some(dir.path().to_path_buf());

        Context::load(path.clone(), Some("http://notes.test:9000/".into())).unwrap();
        let ctx = Context::load(path, None).unwrap();

        assert_eq!(ctx.config().base_url, "http://notes.test:9000");
    }

    #[test]
    fn bound_user_opens_own_store() {
        let dir = TempDir::new().unwrap();
        let mut ctx = Context::load(Some(dir.path().to_path_buf()), None).unwrap();
        let user = UserKey::new("user-1").unwrap();

        ctx.bind(&user, "ada@example.com").unwrap();
        let store = ctx.store().unwrap();

        assert_eq!(store.user(), &user);
        assert!(store.path().starts_with(ctx.data_dir()));
    }
}
