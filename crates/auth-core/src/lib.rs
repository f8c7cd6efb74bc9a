//! # auth-core
//!
//! Shared library for the auth service containing the wire protocol codec,
//! the credential domain types, and the password hashing wrapper.
//!
//! This crate is used by both the server and the client applications.
//! It has no dependencies on sockets, databases, or the file system; the only
//! I/O it knows about is the generic `AsyncRead`/`AsyncWrite` pair that the
//! [`protocol::stream::FieldStream`] frames fields over.
//!
//! # Architecture overview
//!
//! A client opens one TCP connection and then repeats a short conversation:
//! it sends a *mode token* (`"l"` for login, `"r"` for register) followed by
//! a username and password, and the server answers with a status word such as
//! `LOGIN_SUCCESS` or `USR_EXISTS`.
//!
//! - **`protocol`** – How fields travel over the network.  Every field is a
//!   2-byte big-endian length followed by that many bytes of UTF-8, so the
//!   receiver never has to guess where one field ends and the next begins.
//!
//! - **`domain`** – The rules for usernames and passwords, the persisted
//!   [`domain::credentials::UserRecord`], and the [`CredentialStore`] trait
//!   that storage backends implement.
//!
//! - **`crypto`** – The [`PasswordHasher`] trait and its bcrypt-backed
//!   implementation.

pub mod crypto;
pub mod domain;
pub mod protocol;

pub use crypto::password::{BcryptHasher, HashError, PasswordHash, PasswordHasher};
pub use domain::credentials::{
    CredentialError, CredentialStore, InsertOutcome, StoreError, UserRecord, Username,
};
pub use protocol::codec::{decode_field, encode_field, ProtocolError};
pub use protocol::messages::{Mode, Response};
pub use protocol::stream::{FieldStream, StreamError};
