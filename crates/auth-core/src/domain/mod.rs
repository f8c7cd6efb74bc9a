//! Domain types for the auth service.
//!
//! Pure rules with no I/O: what a valid username or password looks like, the
//! shape of a stored user record, and the [`credentials::CredentialStore`]
//! abstraction the server's storage layer implements.

pub mod credentials;

pub use credentials::{
    validate_password, CredentialError, CredentialStore, InsertOutcome, StoreError, UserRecord,
    Username, MAX_PASSWORD_BYTES, MAX_USERNAME_CHARS,
};
