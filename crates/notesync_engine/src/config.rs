//! Configuration for the notes client.

use std::time::Duration;

/// Default server address.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7019";

/// Configuration shared by the HTTP stack.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL, without the `/api` suffix.
    pub base_url: String,
    /// Request timeout applied by the HTTP client.
    pub timeout: Duration,
    /// Timeout for the TCP reachability probe.
    pub probe_timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl ClientConfig {
    /// Creates a configuration for the given server.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(3),
            user_agent: format!("notesync/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the reachability probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Resolves an `/api/...` path against the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
