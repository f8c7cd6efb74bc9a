//! auth-server library crate.
//!
//! A TCP service that lets clients register a username and password and later
//! log in with them.  Passwords are stored only as salted bcrypt hashes in a
//! single SQLite table.
//!
//! # Architecture
//!
//! ```text
//! Client (length-prefixed text fields over TCP)
//!         ↕
//! [auth-server]
//!   ├── application/
//!   │     ├── accounts   Login / availability / registration use cases
//!   │     └── session    Per-connection state machine
//!   └── infrastructure/
//!         ├── network    Accept loop, one task per connection
//!         └── storage    SQLite credential store, TOML config
//! ```
//!
//! # Layer rules
//!
//! - `application` talks to storage and hashing only through the
//!   `auth_core` traits (`CredentialStore`, `PasswordHasher`), so it can be
//!   tested against in-memory or mocked collaborators.
//! - `infrastructure` owns every socket and file handle.

/// Application layer: account use cases and the session protocol.
pub mod application;

/// Infrastructure layer: TCP acceptor, SQLite store, configuration file.
pub mod infrastructure;
