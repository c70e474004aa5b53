//! Network reachability checks.

use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Answers whether the remote is worth trying right now.
///
/// An `Err` means the status could not be determined at all, and aborts the
/// sync; "no network" is `Ok(false)`.
pub trait Connectivity: Send + Sync {
    /// Returns true if the network is available.
    fn has_internet(&self) -> SyncResult<bool>;
}

impl<N: Connectivity + ?Sized> Connectivity for Arc<N> {
    fn has_internet(&self) -> SyncResult<bool> {
        (**self).has_internet()
    }
}

/// Always reports the network as available.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn has_internet(&self) -> SyncResult<bool> {
        Ok(true)
    }
}

/// Connectivity switched by hand.
#[derive(Debug)]
pub struct ManualConnectivity {
    online: AtomicBool,
}

impl ManualConnectivity {
    /// Creates a switch in the given position.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Flips the switch.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ManualConnectivity {
    fn has_internet(&self) -> SyncResult<bool> {
        Ok(self.online.load(Ordering::SeqCst))
    }
}

/// Probes the server with a bare TCP connect.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    /// Creates a probe for the configured server.
    pub fn for_config(config: &ClientConfig) -> SyncResult<Self> {
        let url = reqwest::Url::parse(&config.base_url)
            .map_err(|e| SyncError::Config(format!("invalid base url {}: {e}", config.base_url)))?;
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::Config(format!("base url {} has no host", config.base_url)))?;
        let port = url.port_or_known_default().ok_or_else(|| {
            SyncError::Config(format!("base url {} has no port", config.base_url))
        })?;

        Ok(Self {
            host: host.trim_matches(|c| c == '[' || c == ']').to_string(),
            port,
            timeout: config.probe_timeout,
        })
    }

    fn addresses(&self) -> Vec<SocketAddr> {
        match (self.host.as_str(), self.port).to_socket_addrs() {
            Ok(addrs) => addrs.collect(),
            Err(e) => {
                debug!(host = %self.host, error = %e, "server name did not resolve");
                Vec::new()
            }
        }
    }
}

impl Connectivity for TcpProbe {
    fn has_internet(&self) -> SyncResult<bool> {
        for addr in self.addresses() {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(_) => return Ok(true),
                Err(e) => debug!(%addr, error = %e, "probe failed"),
            }
        }
        Ok(false)
    }
}
