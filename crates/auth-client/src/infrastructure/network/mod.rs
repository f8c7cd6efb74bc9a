//! Network infrastructure for the client application.
//!
//! `AuthClient` owns one connection to the server and turns each protocol
//! exchange into a single async call:
//!
//! - [`AuthClient::login`] sends `"l"`, username, password and returns the
//!   server's verdict.
//! - [`AuthClient::register`] sends `"r"` and the username, and only sends the
//!   password if the server answered `USR_AVAILABLE`.
//!
//! The two registration phases are also exposed separately
//! ([`AuthClient::begin_registration`] / [`AuthClient::finish_registration`])
//! so callers can interleave them, e.g. to race two registrations.

use auth_core::protocol::messages::UnknownResponse;
use auth_core::{FieldStream, Mode, Response, StreamError};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connection to the server failed.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// The connection failed or was closed.
    #[error(transparent)]
    Stream(#[from] StreamError),
    /// The server sent text that is not a protocol status.
    #[error(transparent)]
    UnknownResponse(#[from] UnknownResponse),
    /// The server sent a known status that is not valid at this step.
    #[error("unexpected response {got} during {step}")]
    UnexpectedResponse { step: &'static str, got: Response },
}

/// Client side of the auth protocol.
pub struct AuthClient<S> {
    stream: FieldStream<S>,
}

impl AuthClient<TcpStream> {
    /// Connects to the server at `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectFailed`] if the TCP connection cannot be
    /// established.
    pub async fn connect(host: &str, port: u16) -> Result<Self, ClientError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| ClientError::ConnectFailed {
                addr: format!("{host}:{port}"),
                source,
            })?;
        stream.set_nodelay(true).ok();
        debug!("connected to {host}:{port}");
        Ok(Self::new(stream))
    }
}

impl<S> AuthClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already-connected transport.
    pub fn new(io: S) -> Self {
        Self {
            stream: FieldStream::new(io),
        }
    }

    /// Runs one login exchange.
    ///
    /// Returns `LOGIN_SUCCESS`, `LOGIN_FAILED`, or `INTERNAL_ERROR`.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Response, ClientError> {
        self.stream.write_field(Mode::Login.as_token()).await?;
        self.stream.write_field(username).await?;
        self.stream.write_field(password).await?;
        self.read_expected(
            "login",
            &[
                Response::LoginSuccess,
                Response::LoginFailed,
                Response::InternalError,
            ],
        )
        .await
    }

    /// Runs a complete registration.
    ///
    /// Returns the first-phase answer (`USR_EXISTS`, `REGISTRATION_FAILED`,
    /// `INTERNAL_ERROR`) if the server did not ask for a password, otherwise
    /// the second-phase answer.
    pub async fn register(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<Response, ClientError> {
        match self.begin_registration(username).await? {
            Response::UserAvailable => self.finish_registration(password).await,
            other => Ok(other),
        }
    }

    /// Registration phase 1: sends `"r"` and the username.
    pub async fn begin_registration(&mut self, username: &str) -> Result<Response, ClientError> {
        self.stream.write_field(Mode::Register.as_token()).await?;
        self.stream.write_field(username).await?;
        self.read_expected(
            "registration",
            &[
                Response::UserAvailable,
                Response::UserExists,
                Response::RegistrationFailed,
                Response::InternalError,
            ],
        )
        .await
    }

    /// Registration phase 2: sends the password.  Only valid right after
    /// [`begin_registration`](Self::begin_registration) returned
    /// `USR_AVAILABLE`.
    pub async fn finish_registration(&mut self, password: &str) -> Result<Response, ClientError> {
        self.stream.write_field(password).await?;
        self.read_expected(
            "registration",
            &[
                Response::RegistrationSuccess,
                Response::RegistrationFailed,
                Response::InternalError,
            ],
        )
        .await
    }

    /// Sends one raw field.  For exercising the server with arbitrary input.
    pub async fn send_field(&mut self, text: &str) -> Result<(), ClientError> {
        self.stream.write_field(text).await?;
        Ok(())
    }

    /// Reads and parses one server response.
    pub async fn read_response(&mut self) -> Result<Response, ClientError> {
        let text = self.stream.read_field().await?;
        let response = text.parse::<Response>()?;
        debug!("server replied {response}");
        Ok(response)
    }

    /// Closes the write side, signalling the server that we are done.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn read_expected(
        &mut self,
        step: &'static str,
        allowed: &[Response],
    ) -> Result<Response, ClientError> {
        let got = self.read_response().await?;
        if allowed.contains(&got) {
            Ok(got)
        } else {
            Err(ClientError::UnexpectedResponse { step, got })
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
