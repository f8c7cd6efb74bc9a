//! Infrastructure layer for auth-server.
//!
//! Handles all I/O: binding the listener, accepting connections, the SQLite
//! database, and the TOML config file.
//!
//! # What does NOT belong here?
//!
//! - Protocol decisions (which response to send when), which live in
//!   `application::session`.
//! - Credential rules, which live in `auth_core::domain`.

pub mod network;
pub mod storage;

pub use network::acceptor::{bind, run_server};
pub use storage::sqlite::SqliteCredentialStore;
