//! Account operations against the identity endpoints.

use crate::config::ClientConfig;
use crate::credentials::{CredentialProvider, CredentialStore, Credentials};
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use notesync_protocol::{
    AuthResponse, ErrorBody, LoginRequest, RefreshRequest, RegisterRequest, LOGIN_PATH,
    REFRESH_PATH, REGISTER_PATH,
};
use tracing::{debug, warn};

/// Client for login, registration and credential refresh.
///
/// Talks to the identity endpoints over a plain (unauthenticated)
/// [`HttpClient`] and keeps the resulting pair in a [`CredentialStore`].
/// It is also the [`CredentialProvider`] the authenticated transport uses.
pub struct AuthClient<C: HttpClient, S: CredentialStore> {
    config: ClientConfig,
    http: C,
    store: S,
}

impl<C: HttpClient, S: CredentialStore> AuthClient<C, S> {
    /// Creates a new auth client.
    pub fn new(config: ClientConfig, http: C, store: S) -> Self {
        Self {
            config,
            http,
            store,
        }
    }

    /// Returns the credential store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an account.
    ///
    /// Validation failures come back as [`SyncError::Rejected`] carrying the
    /// server's error list.
    pub fn register(&self, email: &str, password: &str) -> SyncResult<()> {
        let request = HttpRequest::post(self.config.url(REGISTER_PATH)).with_json(
            &RegisterRequest {
                email: email.to_string(),
                password: password.to_string(),
            },
        )?;
        let response = self.http.execute(&request)?;
        if response.is_success() {
            return Ok(());
        }
        Err(rejection(&response))
    }

    /// Logs in and stores the issued credential pair.
    pub fn login(&self, email: &str, password: &str) -> SyncResult<Credentials> {
        let request = HttpRequest::post(self.config.url(LOGIN_PATH)).with_json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let response = self.http.execute(&request)?;
        if !response.is_success() {
            return Err(SyncError::AuthenticationFailed(format!(
                "login rejected with status {}",
                response.status()
            )));
        }
        self.accept(&response)
    }

    /// Exchanges the stored refresh credential for a new pair.
    pub fn refresh_credentials(&self) -> SyncResult<Credentials> {
        let current = self.store.load()?.ok_or(SyncError::NotAuthenticated)?;
        if current.refresh_token.trim().is_empty() {
            return Err(SyncError::NotAuthenticated);
        }

        let request = HttpRequest::post(self.config.url(REFRESH_PATH)).with_json(
            &RefreshRequest {
                refresh_token: current.refresh_token,
            },
        )?;
        let response = self.http.execute(&request)?;
        if !response.is_success() {
            return Err(SyncError::AuthenticationFailed(format!(
                "refresh rejected with status {}",
                response.status()
            )));
        }
        let credentials = self.accept(&response)?;
        debug!(expires = %credentials.expires_utc, "credentials refreshed");
        Ok(credentials)
    }

    /// Returns the stored pair, if any.
    pub fn credentials(&self) -> SyncResult<Option<Credentials>> {
        self.store.load()
    }

    /// Forgets the stored pair.
    pub fn logout(&self) -> SyncResult<()> {
        self.store.clear()
    }

    fn accept(&self, response: &HttpResponse) -> SyncResult<Credentials> {
        let auth: AuthResponse = response.decode()?;
        if auth.access_token.trim().is_empty() {
            return Err(SyncError::AuthenticationFailed(
                "server issued an empty access token".into(),
            ));
        }
        let credentials = Credentials::from(auth);
        self.store.save(&credentials)?;
        Ok(credentials)
    }
}

impl<C: HttpClient, S: CredentialStore> CredentialProvider for AuthClient<C, S> {
    fn access_token(&self) -> Option<String> {
        match self.store.load() {
            Ok(credentials) => credentials
                .map(|c| c.access_token)
                .filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "credential store unreadable; sending unauthenticated");
                None
            }
        }
    }

    fn refresh(&self) -> SyncResult<()> {
        self.refresh_credentials().map(|_| ())
    }
}

fn rejection(response: &HttpResponse) -> SyncError {
    let mut errors = response
        .decode::<ErrorBody>()
        .map(|body| body.errors)
        .unwrap_or_default();
    errors.retain(|e| !e.trim().is_empty());

    if errors.is_empty() {
        let text = String::from_utf8_lossy(response.body()).trim().to_string();
        errors.push(if text.is_empty() {
            "registration failed".to_string()
        } else {
            text
        });
    }

    SyncError::Rejected {
        status: response.status(),
        errors,
    }
}
