//! # notesync testkit
//!
//! Test utilities for notesync.
//!
//! This crate provides:
//! - [`FakeNotesServer`]: an in-process notes server reachable through the
//!   [`HttpClient`](notesync_engine::HttpClient) seam, with the same routes,
//!   status codes and token rotation as the real service
//! - [`ClientStack`]: a fully wired client (auth, transport, remote, engine)
//!   talking to that server
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notesync_testkit::prelude::*;
//!
//! #[test]
//! fn offline_note_reaches_server() {
//!     let server = FakeNotesServer::shared();
//!     let client = ClientStack::signed_in(&server, "ada@example.com");
//!     client.add_note("title", "body");
//!     client.engine.synchronize().unwrap();
//!     assert_eq!(server.notes_of("ada@example.com").len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::server::*;
}

pub use fixtures::*;
pub use server::*;
