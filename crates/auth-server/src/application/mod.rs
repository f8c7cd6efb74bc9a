//! Application layer for auth-server.
//!
//! - `accounts`: login, availability and registration on top of the
//!   credential store and the password hasher.
//! - `session`: the per-connection protocol state machine that reads client
//!   fields, calls into `accounts`, and writes status responses.

pub mod accounts;
pub mod session;

pub use accounts::{AccountError, AccountService};
pub use session::{Session, SessionError, SessionSettings};
