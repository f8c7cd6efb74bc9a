//! Per-connection session state machine.
//!
//! ```text
//!            ┌──────────────── invalid token ───────────────┐
//!            ▼                                              │
//!     ┌─────────────┐  "l"   ┌───────┐                      │
//! ──► │ AwaitingMode│ ─────► │ Login │ ─┐                   │
//!     └─────────────┘        └───────┘  │                   │
//!        │  ▲   │    "r"    ┌──────────┐│                   │
//!        │  │   └─────────► │ Register ││                   │
//!        │  │               └──────────┘│                   │
//!        │  └──────── flow finished ────┘                   │
//!        │                                                  │
//!        └── EOF / fatal error ──► Closed                   │
//! ```
//!
//! A session owns its transport and talks to shared state only through
//! [`AccountService`].  Protocol errors (unknown mode, malformed field) are
//! answered and the loop continues; connection faults and internal faults end
//! the session.  An internal fault is reported to the client as
//! `INTERNAL_ERROR` before the connection is closed.
//!
//! Passwords are never logged.

use std::sync::Arc;
use std::time::Duration;

use auth_core::{FieldStream, Mode, Response, StreamError, Username};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, warn};

use crate::application::accounts::{
    AccountError, AccountService, Availability, LoginOutcome, RegisterOutcome,
};

/// Everything a session needs besides its transport.  Cloned once per
/// connection.
#[derive(Clone)]
pub struct SessionSettings {
    pub accounts: Arc<AccountService>,
    /// Limit on how long to wait for each client field.  `None` waits forever.
    pub read_timeout: Option<Duration>,
}

/// Where the session is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingMode,
    Login,
    Register,
    Closed,
}

/// Reasons a session ended abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("no field received within {0:?}")]
    Timeout(Duration),

    #[error("internal error: {0}")]
    Account(#[from] AccountError),
}

/// One client connection running the login/registration protocol.
pub struct Session<S> {
    stream: FieldStream<S>,
    settings: SessionSettings,
    state: SessionState,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: S, settings: SessionSettings) -> Self {
        Self {
            stream: FieldStream::new(io),
            settings,
            state: SessionState::AwaitingMode,
        }
    }

    /// Drives the session until the client disconnects or a fatal error
    /// occurs.
    ///
    /// Returns `Ok(())` when the client closed the connection, including in
    /// the middle of a flow.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Stream`] for transport failures.
    /// - [`SessionError::Timeout`] when the client goes quiet for longer than
    ///   the read timeout.
    /// - [`SessionError::Account`] for storage or hashing faults; the client
    ///   has been sent `INTERNAL_ERROR`.
    pub async fn run(mut self) -> Result<(), SessionError> {
        loop {
            let step = match self.state {
                SessionState::AwaitingMode => self.await_mode().await,
                SessionState::Login => self
                    .login_flow()
                    .await
                    .map(|()| SessionState::AwaitingMode),
                SessionState::Register => self
                    .register_flow()
                    .await
                    .map(|()| SessionState::AwaitingMode),
                SessionState::Closed => return Ok(()),
            };

            match step {
                Ok(next) => self.state = next,
                Err(SessionError::Stream(StreamError::Closed)) => {
                    debug!("client disconnected");
                    self.state = SessionState::Closed;
                }
                Err(SessionError::Account(e)) => {
                    error!("aborting session: {e}");
                    // Best effort: the client may already be gone.
                    let _ = self.respond(Response::InternalError).await;
                    let _ = self.stream.shutdown().await;
                    return Err(SessionError::Account(e));
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ── States ────────────────────────────────────────────────────────────────

    async fn await_mode(&mut self) -> Result<SessionState, SessionError> {
        let mode = self
            .next_field()
            .await?
            .and_then(|token| Mode::from_token(&token));

        match mode {
            Some(Mode::Login) => Ok(SessionState::Login),
            Some(Mode::Register) => Ok(SessionState::Register),
            None => {
                debug!("unrecognised mode token");
                self.respond(Response::InvalidInput).await?;
                Ok(SessionState::AwaitingMode)
            }
        }
    }

    async fn login_flow(&mut self) -> Result<(), SessionError> {
        // Always consume both fields so the stream stays aligned.
        let username = self.next_field().await?;
        let password = self.next_field().await?;

        let outcome = match (&username, &password) {
            (Some(username), Some(password)) => {
                self.settings.accounts.login(username, password).await?
            }
            _ => LoginOutcome::Rejected,
        };

        let shown = username.as_deref().map(str::trim).unwrap_or("<malformed>");
        match outcome {
            LoginOutcome::Authenticated => {
                info!("login succeeded for {shown}");
                self.respond(Response::LoginSuccess).await
            }
            LoginOutcome::Rejected => {
                info!("login failed for {shown}");
                self.respond(Response::LoginFailed).await
            }
        }
    }

    async fn register_flow(&mut self) -> Result<(), SessionError> {
        let Some(raw) = self.next_field().await? else {
            return self.respond(Response::RegistrationFailed).await;
        };
        let username = match Username::parse(&raw) {
            Ok(username) => username,
            Err(e) => {
                info!("registration rejected: {e}");
                return self.respond(Response::RegistrationFailed).await;
            }
        };

        if self.settings.accounts.availability(&username).await? == Availability::Taken {
            info!("registration refused: {username} already exists");
            return self.respond(Response::UserExists).await;
        }
        self.respond(Response::UserAvailable).await?;

        let Some(password) = self.next_field().await? else {
            return self.respond(Response::RegistrationFailed).await;
        };

        let outcome = self
            .settings
            .accounts
            .register(username.clone(), &password)
            .await?;
        match outcome {
            RegisterOutcome::Registered => {
                info!("registered {username}");
                self.respond(Response::RegistrationSuccess).await
            }
            RegisterOutcome::LostRace => {
                info!("registration of {username} lost to a concurrent session");
                self.respond(Response::RegistrationFailed).await
            }
            RegisterOutcome::Invalid(e) => {
                info!("registration of {username} rejected: {e}");
                self.respond(Response::RegistrationFailed).await
            }
        }
    }

    // ── I/O helpers ───────────────────────────────────────────────────────────

    /// Reads the next field.  `Ok(None)` means a malformed field was received
    /// and skipped.
    async fn next_field(&mut self) -> Result<Option<String>, SessionError> {
        let read = self.stream.read_field();
        let result = match self.settings.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| SessionError::Timeout(limit))?,
            None => read.await,
        };

        match result {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.is_recoverable() => {
                warn!("ignoring {e}");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn respond(&mut self, response: Response) -> Result<(), SessionError> {
        self.stream.write_field(response.as_str()).await?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use auth_core::crypto::MIN_COST;
    use auth_core::{
        encode_field, BcryptHasher, CredentialStore, InsertOutcome, PasswordHash, StoreError,
        UserRecord,
    };
    use mockall::mock;
    use tokio::io::duplex;

    use super::*;
    use crate::infrastructure::storage::sqlite::SqliteCredentialStore;

    mock! {
        Store {}
        impl CredentialStore for Store {
            fn exists(&self, username: &Username) -> Result<bool, StoreError>;
            fn lookup(&self, username: &Username) -> Result<Option<PasswordHash>, StoreError>;
            fn insert(&self, record: &UserRecord) -> Result<InsertOutcome, StoreError>;
            fn count(&self) -> Result<u64, StoreError>;
        }
    }

    fn frames(fields: &[&str]) -> Vec<u8> {
        fields
            .iter()
            .flat_map(|f| encode_field(f).unwrap())
            .collect()
    }

    fn settings_with(store: Arc<dyn CredentialStore>) -> SessionSettings {
        let hasher = Arc::new(BcryptHasher::new(MIN_COST).unwrap());
        SessionSettings {
            accounts: Arc::new(AccountService::new(store, hasher).unwrap()),
            read_timeout: None,
        }
    }

    fn settings() -> SessionSettings {
        settings_with(Arc::new(SqliteCredentialStore::open_in_memory().unwrap()))
    }

    async fn with_user(settings: &SessionSettings, user: &str, password: &str) {
        let name = Username::parse(user).unwrap();
        settings.accounts.register(name, password).await.unwrap();
    }

    fn failing_store() -> MockStore {
        let mut store = MockStore::new();
        store
            .expect_lookup()
            .returning(|_| Err(StoreError::Backend("disk I/O error".to_string())));
        store
            .expect_exists()
            .returning(|_| Err(StoreError::Backend("disk I/O error".to_string())));
        store
    }

    #[tokio::test]
    async fn test_register_then_login_on_one_connection() {
        // Arrange: the mock asserts every byte in order
        let io = tokio_test::io::Builder::new()
            .read(&frames(&["r", "alice"]))
            .write(&frames(&["USR_AVAILABLE"]))
            .read(&frames(&["secret1"]))
            .write(&frames(&["REGISTRATION_SUCCESS"]))
            .read(&frames(&["l", "alice", "secret1"]))
            .write(&frames(&["LOGIN_SUCCESS"]))
            .build();

        // Act
        let result = Session::new(io, settings()).run().await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_register_existing_user_gets_usr_exists_without_password_phase() {
        let settings = settings();
        with_user(&settings, "alice", "secret1").await;
        let io = tokio_test::io::Builder::new()
            .read(&frames(&["r", "alice"]))
            .write(&frames(&["USR_EXISTS"]))
            .build();

        Session::new(io, settings).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_login_wrong_password_and_unknown_user_both_fail() {
        let settings = settings();
        with_user(&settings, "alice", "secret1").await;
        let io = tokio_test::io::Builder::new()
            .read(&frames(&["l", "alice", "wrongpass"]))
            .write(&frames(&["LOGIN_FAILED"]))
            .read(&frames(&["l", "bob", "anything"]))
            .write(&frames(&["LOGIN_FAILED"]))
            .build();

        Session::new(io, settings).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_mode_gets_help_text_and_session_continues() {
        let io = tokio_test::io::Builder::new()
            .read(&frames(&["x"]))
            .write(&frames(&[Response::INVALID_INPUT_TEXT]))
            .read(&frames(&["L", "bob", "pw"]))
            .write(&frames(&["LOGIN_FAILED"]))
            .build();

        Session::new(io, settings()).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_mode_frame_is_treated_as_invalid_input() {
        // Arrange: a two-byte payload that is not UTF-8
        let mut bytes = vec![0x00, 0x02, 0xC3, 0x28];
        bytes.extend(frames(&["r", "dave"]));
        let io = tokio_test::io::Builder::new()
            .read(&bytes)
            .write(&frames(&[Response::INVALID_INPUT_TEXT]))
            .write(&frames(&["USR_AVAILABLE"]))
            .build();

        // Act / Assert: client hangs up after USR_AVAILABLE
        Session::new(io, settings()).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_register_blank_username_fails_without_password_phase() {
        let io = tokio_test::io::Builder::new()
            .read(&frames(&["r", "   "]))
            .write(&frames(&["REGISTRATION_FAILED"]))
            .build();

        Session::new(io, settings()).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_register_blank_password_fails_and_stores_nothing() {
        // Arrange
        let settings = settings();
        let accounts = Arc::clone(&settings.accounts);
        let io = tokio_test::io::Builder::new()
            .read(&frames(&["r", "erin"]))
            .write(&frames(&["USR_AVAILABLE"]))
            .read(&frames(&[" "]))
            .write(&frames(&["REGISTRATION_FAILED"]))
            .build();

        // Act
        Session::new(io, settings).run().await.unwrap();

        // Assert
        assert_eq!(accounts.user_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_login_with_malformed_password_consumes_both_fields_and_fails() {
        let mut bytes = frames(&["l", "alice"]);
        bytes.extend([0x00, 0x01, 0xFF]);
        bytes.extend(frames(&["l", "alice", "secret1"]));
        let settings = settings();
        with_user(&settings, "alice", "secret1").await;
        let io = tokio_test::io::Builder::new()
            .read(&bytes)
            .write(&frames(&["LOGIN_FAILED"]))
            .write(&frames(&["LOGIN_SUCCESS"]))
            .build();

        Session::new(io, settings).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_mid_login_ends_session_cleanly() {
        let io = tokio_test::io::Builder::new()
            .read(&frames(&["l", "alice"]))
            .build();

        let result = Session::new(io, settings()).run().await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_storage_fault_during_login_sends_internal_error_and_closes() {
        // Arrange
        let io = tokio_test::io::Builder::new()
            .read(&frames(&["l", "alice", "secret1"]))
            .write(&frames(&["INTERNAL_ERROR"]))
            .build();

        // Act
        let result = Session::new(io, settings_with(Arc::new(failing_store())))
            .run()
            .await;

        // Assert
        assert!(matches!(
            result,
            Err(SessionError::Account(AccountError::Storage(_)))
        ));
    }

    #[tokio::test]
    async fn test_storage_fault_during_registration_sends_internal_error() {
        let io = tokio_test::io::Builder::new()
            .read(&frames(&["r", "alice"]))
            .write(&frames(&["INTERNAL_ERROR"]))
            .build();

        let result = Session::new(io, settings_with(Arc::new(failing_store())))
            .run()
            .await;

        assert!(matches!(result, Err(SessionError::Account(_))));
    }

    #[tokio::test]
    async fn test_lost_registration_race_is_reported_as_failed() {
        // Arrange: the name looks free, but the insert finds it taken
        let mut store = MockStore::new();
        store.expect_exists().returning(|_| Ok(false));
        store
            .expect_insert()
            .returning(|_| Ok(InsertOutcome::AlreadyExists));
        let io = tokio_test::io::Builder::new()
            .read(&frames(&["r", "carol"]))
            .write(&frames(&["USR_AVAILABLE"]))
            .read(&frames(&["secret1"]))
            .write(&frames(&["REGISTRATION_FAILED"]))
            .build();

        // Act / Assert
        Session::new(io, settings_with(Arc::new(store)))
            .run()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_idle_client_hits_read_timeout() {
        // Arrange: the client half stays open but never writes
        let (client, server) = duplex(1024);
        let mut settings = settings();
        settings.read_timeout = Some(Duration::from_millis(50));

        // Act
        let result = Session::new(server, settings).run().await;

        // Assert
        assert!(matches!(result, Err(SessionError::Timeout(_))));
        drop(client);
    }

    #[tokio::test]
    async fn test_timeout_applies_per_field_not_per_session() {
        // Arrange: a login whose fields each arrive just inside the limit
        let (client_io, server_io) = duplex(1024);
        let mut settings = settings();
        settings.read_timeout = Some(Duration::from_millis(500));
        let session = tokio::spawn(Session::new(server_io, settings).run());
        let mut client = FieldStream::new(client_io);

        // Act: 900 ms in total, never more than 300 ms between fields
        for field in ["l", "bob", "pw"] {
            tokio::time::sleep(Duration::from_millis(300)).await;
            client.write_field(field).await.unwrap();
        }
        let reply = client.read_field().await.unwrap();
        drop(client);

        // Assert
        assert_eq!(reply, "LOGIN_FAILED");
        assert!(session.await.unwrap().is_ok());
    }
}
