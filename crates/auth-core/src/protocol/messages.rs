//! Wire vocabulary of the auth protocol.
//!
//! Every request cycle starts with a [`Mode`] token.  The server answers each
//! step with one [`Response`] word.  Both travel as ordinary text fields (see
//! [`crate::protocol::codec`]).
//!
//! ```text
//! Client                                Server
//! ──────                                ──────
//! "l" ─► username ─► password
//!                                       LOGIN_SUCCESS | LOGIN_FAILED
//!
//! "r" ─► username
//!                                       USR_EXISTS | USR_AVAILABLE
//!        (only after USR_AVAILABLE)
//!        password
//!                                       REGISTRATION_SUCCESS | REGISTRATION_FAILED
//! ```

use std::fmt;
use std::str::FromStr;

// ── Mode tokens ───────────────────────────────────────────────────────────────

/// The sub-protocol a client selects at the start of each request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Login,
    Register,
}

impl Mode {
    /// Parses a mode token as sent by a client.
    ///
    /// Surrounding whitespace is ignored and matching is case-insensitive, so
    /// `"L"` and `" r\n"` are accepted.  Returns `None` for anything else.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "l" => Some(Mode::Login),
            "r" => Some(Mode::Register),
            _ => None,
        }
    }

    /// The canonical token for this mode.
    pub fn as_token(self) -> &'static str {
        match self {
            Mode::Login => "l",
            Mode::Register => "r",
        }
    }
}

// ── Server responses ──────────────────────────────────────────────────────────

/// Every status the server can send back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Response {
    /// Login credentials were accepted.
    LoginSuccess,
    /// Unknown username or wrong password (deliberately indistinguishable).
    LoginFailed,
    /// Registration phase 1: the username is already taken.
    UserExists,
    /// Registration phase 1: the username is free; send the password next.
    UserAvailable,
    /// Registration phase 2: the record was stored.
    RegistrationSuccess,
    /// Registration was rejected (invalid input or lost a concurrent race).
    RegistrationFailed,
    /// The mode token was not recognised.
    InvalidInput,
    /// The server hit an internal fault and is about to close the connection.
    InternalError,
}

impl Response {
    /// Text sent for [`Response::InvalidInput`].
    pub const INVALID_INPUT_TEXT: &'static str =
        "Invalid input. Please enter 'l' for login or 'r' for register.";

    /// The exact text that goes on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Response::LoginSuccess => "LOGIN_SUCCESS",
            Response::LoginFailed => "LOGIN_FAILED",
            Response::UserExists => "USR_EXISTS",
            Response::UserAvailable => "USR_AVAILABLE",
            Response::RegistrationSuccess => "REGISTRATION_SUCCESS",
            Response::RegistrationFailed => "REGISTRATION_FAILED",
            Response::InvalidInput => Self::INVALID_INPUT_TEXT,
            Response::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a text field is not a known [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown response: {0:?}")]
pub struct UnknownResponse(pub String);

impl FromStr for Response {
    type Err = UnknownResponse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOGIN_SUCCESS" => Ok(Response::LoginSuccess),
            "LOGIN_FAILED" => Ok(Response::LoginFailed),
            "USR_EXISTS" => Ok(Response::UserExists),
            "USR_AVAILABLE" => Ok(Response::UserAvailable),
            "REGISTRATION_SUCCESS" => Ok(Response::RegistrationSuccess),
            "REGISTRATION_FAILED" => Ok(Response::RegistrationFailed),
            "INTERNAL_ERROR" => Ok(Response::InternalError),
            Self::INVALID_INPUT_TEXT => Ok(Response::InvalidInput),
            other => Err(UnknownResponse(other.to_owned())),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
