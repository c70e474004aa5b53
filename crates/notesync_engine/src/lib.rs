//! # notesync engine
//!
//! Offline-first synchronization for notesync clients.
//!
//! This crate provides:
//! - An immutable HTTP request descriptor and the [`HttpClient`] seam
//! - [`AuthenticatedTransport`]: bearer attachment with refresh-and-retry-once
//! - [`AuthClient`]: login, registration, refresh and logout
//! - [`HttpRemoteClient`]: the notes collection API as tagged [`RemoteStatus`] results
//! - [`SyncEngine`]: push-then-pull reconciliation with identity remapping
//!
//! ## Architecture
//!
//! The engine implements a **push-then-pull** model:
//! 1. Push every dirty or soft-deleted record, one at a time
//! 2. Fetch the full remote collection and merge it last-write-wins
//!
//! ## Key Invariants
//!
//! - A failed record stays dirty and is retried by the next cycle
//! - A note created offline ends up under exactly one local key, the remote id
//! - An unauthorized response triggers at most one refresh and one replay
//! - Only store failures and connectivity probe failures escape `synchronize()`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod config;
mod connectivity;
mod credentials;
mod error;
mod http;
mod remote;
mod state;
mod transport;

pub use auth::AuthClient;
pub use config::ClientConfig;
pub use connectivity::{AlwaysOnline, Connectivity, ManualConnectivity, TcpProbe};
pub use credentials::{
    CredentialProvider, CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore,
};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpRequest, HttpResponse, Method, ReqwestClient};
pub use remote::{HttpRemoteClient, MockRemote, RemoteCall, RemoteNotes, RemoteOp, RemoteStatus};
pub use state::{CancelHandle, SyncEngine, SyncOutcome, SyncState, SyncStats};
pub use transport::AuthenticatedTransport;
