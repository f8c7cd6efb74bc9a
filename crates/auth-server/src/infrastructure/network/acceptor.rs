//! TCP accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding the TCP listener on the configured address.
//! 2. Accepting incoming connections.
//! 3. Running one [`Session`] per connection in its own tokio task.
//! 4. Stopping when the `running` flag is cleared and aborting the sessions
//!    that are still open.
//!
//! # Isolation
//!
//! Sessions share nothing but the `Arc<AccountService>` inside
//! [`SessionSettings`].  A session that errors or panics ends its own task;
//! the accept loop logs the outcome and keeps going.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::application::session::{Session, SessionSettings};

/// How often the accept loop wakes up to check the `running` flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Errors from the network layer.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("failed to bind to {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Binds the listening socket.
///
/// # Errors
///
/// Returns [`NetworkError::BindFailed`] if the port is in use or the process
/// lacks permission to bind.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, NetworkError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| NetworkError::BindFailed { addr, source })
}

/// Runs the accept loop until `running` is set to `false`.
///
/// Each accepted connection is handed to a dedicated tokio task, so one slow
/// client never blocks the others.  Finished tasks are reaped on every loop
/// iteration; when the loop exits, any sessions still open are aborted.
pub async fn run_server(
    listener: TcpListener,
    settings: SessionSettings,
    running: Arc<AtomicBool>,
) {
    match listener.local_addr() {
        Ok(addr) => info!("auth server listening on {addr}"),
        Err(e) => warn!("auth server listening (local address unavailable: {e})"),
    }

    let mut sessions = JoinSet::new();

    loop {
        while let Some(finished) = sessions.try_join_next() {
            if let Err(e) = finished {
                if e.is_panic() {
                    error!("session task panicked: {e}");
                }
            }
        }

        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Bounded so the loop can observe the `running` flag.
        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                let span = info_span!("session", id = %Uuid::new_v4(), peer = %peer_addr);
                let settings = settings.clone();
                sessions.spawn(handle_client_session(stream, settings).instrument(span));
            }
            Ok(Err(e)) => {
                // Transient (e.g. too many open files); keep serving.
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    if !sessions.is_empty() {
        info!("aborting {} open session(s)", sessions.len());
    }
    sessions.shutdown().await;
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Runs one session to completion and logs how it ended.
async fn handle_client_session(stream: TcpStream, settings: SessionSettings) {
    info!("client connected");
    if let Err(e) = stream.set_nodelay(true) {
        warn!("could not disable Nagle: {e}");
    }

    match Session::new(stream, settings).run().await {
        Ok(()) => info!("session closed"),
        Err(e) => warn!("session closed with error: {e}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
