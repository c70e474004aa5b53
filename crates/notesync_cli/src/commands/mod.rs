//! CLI command implementations.

pub mod account;
pub mod notes;
pub mod sync;
