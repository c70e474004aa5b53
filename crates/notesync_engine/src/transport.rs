//! Bearer-token transport with refresh-and-retry-once.

use crate::credentials::CredentialProvider;
use crate::error::SyncResult;
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use parking_lot::Mutex;
use tracing::{debug, warn};

const UNAUTHORIZED: u16 = 401;

/// Wraps an [`HttpClient`], attaching the current access credential and
/// recovering once from an expired one.
///
/// # Behavior
///
/// 1. Attach the cached access credential as a bearer token, if there is one.
///    Without one the request goes out unauthenticated.
/// 2. Send. Anything but 401 is returned as-is; transport faults propagate
///    unchanged and are never retried here.
/// 3. On 401, refresh. If refresh fails the original 401 is returned.
/// 4. Otherwise replay the same request descriptor with the new credential,
///    exactly once, and return that response whatever it is.
///
/// Refreshes are single-flight: concurrent callers that all saw a 401 queue
/// on one gate, and a caller that finds the credential already rotated by
/// someone else replays with it instead of spending another refresh
/// credential.
pub struct AuthenticatedTransport<C: HttpClient, P: CredentialProvider> {
    inner: C,
    credentials: P,
    refresh_gate: Mutex<()>,
}

impl<C: HttpClient, P: CredentialProvider> AuthenticatedTransport<C, P> {
    /// Creates a new authenticated transport.
    pub fn new(inner: C, credentials: P) -> Self {
        Self {
            inner,
            credentials,
            refresh_gate: Mutex::new(()),
        }
    }

    /// Returns the credential provider.
    pub fn credentials(&self) -> &P {
        &self.credentials
    }

    /// Returns the wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Refreshes unless another caller already did; returns true if a newer
    /// credential is available.
    fn refresh_after_rejection(&self, rejected: Option<&str>) -> bool {
        let _gate = self.refresh_gate.lock();

        if let Some(current) = self.credentials.access_token() {
            if Some(current.as_str()) != rejected {
                debug!("access token already rotated, reusing it");
                return true;
            }
        }

        match self.credentials.refresh() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "credential refresh failed");
                false
            }
        }
    }
}

fn authorize(request: &HttpRequest, token: Option<&str>) -> HttpRequest {
    match token {
        Some(token) => request.clone().with_bearer(token),
        None => request.clone(),
    }
}

impl<C: HttpClient, P: CredentialProvider> HttpClient for AuthenticatedTransport<C, P> {
    fn execute(&self, request: &HttpRequest) -> SyncResult<HttpResponse> {
        let token = self.credentials.access_token();
        let response = self.inner.execute(&authorize(request, token.as_deref()))?;

        if response.status() != UNAUTHORIZED {
            return Ok(response);
        }

        debug!(method = %request.method(), path = request.path(), "unauthorized, refreshing");
        if !self.refresh_after_rejection(token.as_deref()) {
            return Ok(response);
        }

        let fresh = self.credentials.access_token();
        self.inner.execute(&authorize(request, fresh.as_deref()))
    }
}
