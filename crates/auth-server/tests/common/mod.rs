//! Shared harness: a real server on an ephemeral loopback port.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use auth_client::AuthClient;
use auth_core::BcryptHasher;
use auth_server::application::{AccountService, SessionSettings};
use auth_server::infrastructure::{bind, run_server, SqliteCredentialStore};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

/// Lowest bcrypt cost; keeps the suite fast.
pub const TEST_COST: u32 = 4;

pub struct TestServer {
    pub addr: SocketAddr,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Starts a server over an in-memory database.
    pub async fn start() -> Self {
        Self::with_store(SqliteCredentialStore::open_in_memory().unwrap()).await
    }

    /// Starts a server over the database file at `path`.
    pub async fn start_on_file(path: &Path) -> Self {
        Self::with_store(SqliteCredentialStore::open(path).unwrap()).await
    }

    async fn with_store(store: SqliteCredentialStore) -> Self {
        let hasher = Arc::new(BcryptHasher::new(TEST_COST).unwrap());
        let accounts = Arc::new(AccountService::new(Arc::new(store), hasher).unwrap());
        let settings = SessionSettings {
            accounts,
            read_timeout: Some(Duration::from_secs(10)),
        };

        let listener = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(run_server(listener, settings, Arc::clone(&running)));

        Self {
            addr,
            running,
            handle,
        }
    }

    pub async fn client(&self) -> AuthClient<TcpStream> {
        AuthClient::connect("127.0.0.1", self.addr.port())
            .await
            .unwrap()
    }

    /// Clears the running flag and waits for the accept loop to return.
    pub async fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}
