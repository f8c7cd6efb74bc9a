//! Storage infrastructure: the credential database and the configuration file.
//!
//! - `sqlite` implements [`auth_core::CredentialStore`] on top of a single
//!   SQLite connection.
//! - `config` reads the TOML configuration file from an explicit path or the
//!   platform config directory, falling back to defaults on first run.

pub mod config;
pub mod sqlite;
