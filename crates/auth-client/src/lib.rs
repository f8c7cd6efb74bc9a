//! auth-client library crate.
//!
//! [`AuthClient`] drives the client side of the auth protocol over any
//! `AsyncRead + AsyncWrite` transport.  It is used by the `auth-client`
//! binary and by the server's integration tests.
//!
//! One client holds one connection and may run any number of login and
//! registration exchanges on it, one at a time.

pub mod infrastructure;

pub use infrastructure::network::{AuthClient, ClientError};
