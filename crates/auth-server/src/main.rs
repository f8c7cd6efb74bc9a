//! auth-server: entry point.
//!
//! Listens for TCP clients and runs the login / registration protocol against
//! a SQLite credential database.
//!
//! # Usage
//!
//! ```text
//! auth-server [OPTIONS]
//!
//! Options:
//!   --config       <PATH>  TOML config file [default: platform config dir]
//!   --host         <IP>    Address to listen on [default: 127.0.0.1]
//!   --port         <PORT>  TCP port [default: 6969]
//!   --database     <PATH>  SQLite database file [default: users.db]
//!   --bcrypt-cost  <N>     bcrypt work factor, 4..=31 [default: 12]
//!   --read-timeout <SECS>  Per-field idle limit, 0 disables [default: 300]
//!   --log-level    <LVL>   Level used when RUST_LOG is unset [default: info]
//! ```
//!
//! Every option can also be set through an `AUTH_*` environment variable
//! (`AUTH_PORT`, `AUTH_DATABASE`, ...).  Command-line and environment values
//! override the config file, which overrides the built-in defaults.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use auth_core::BcryptHasher;
use auth_server::application::{AccountService, SessionSettings};
use auth_server::infrastructure::storage::config::{
    load_config, load_config_from, AppConfig, ConfigError,
};
use auth_server::infrastructure::{bind, run_server, SqliteCredentialStore};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Credential service: register and log in over TCP.
#[derive(Debug, Parser)]
#[command(
    name = "auth-server",
    about = "TCP login and registration service backed by SQLite",
    version
)]
struct Cli {
    /// Path of the TOML config file.
    #[arg(long, env = "AUTH_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to listen on.
    #[arg(long, env = "AUTH_HOST")]
    host: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "AUTH_PORT")]
    port: Option<u16>,

    /// SQLite database file; created on first start.
    #[arg(long, env = "AUTH_DATABASE")]
    database: Option<PathBuf>,

    /// bcrypt work factor (4..=31).
    #[arg(long, env = "AUTH_BCRYPT_COST")]
    bcrypt_cost: Option<u32>,

    /// Seconds to wait for each client field; 0 waits forever.
    #[arg(long, env = "AUTH_READ_TIMEOUT")]
    read_timeout: Option<u64>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, env = "AUTH_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file this invocation points at.
    ///
    /// Without `--config`, a missing platform file (or an unknown platform
    /// directory) means defaults.
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display())),
            None => match load_config() {
                Ok(cfg) => Ok(cfg),
                Err(ConfigError::NoPlatformConfigDir) => Ok(AppConfig::default()),
                Err(e) => Err(e).context("failed to load config"),
            },
        }
    }

    /// Applies every flag that was given on top of `config`.
    fn apply_overrides(self, mut config: AppConfig) -> AppConfig {
        if let Some(host) = self.host {
            config.server.bind_address = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(secs) = self.read_timeout {
            config.server.read_timeout_secs = secs;
        }
        if let Some(path) = self.database {
            config.storage.database_path = path;
        }
        if let Some(cost) = self.bcrypt_cost {
            config.security.bcrypt_cost = cost;
        }
        if let Some(level) = self.log_level {
            config.logging.log_level = level;
        }
        config
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    let config = cli.apply_overrides(config);

    // RUST_LOG wins; otherwise the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.log_level)),
        )
        .init();

    let settings = config.into_settings().context("invalid configuration")?;

    // ── Shared state ──────────────────────────────────────────────────────────
    let store = Arc::new(
        SqliteCredentialStore::open(&settings.database_path).with_context(|| {
            format!(
                "failed to open credential database {}",
                settings.database_path.display()
            )
        })?,
    );
    let hasher = Arc::new(
        BcryptHasher::new(settings.bcrypt_cost).context("invalid bcrypt cost")?,
    );
    let accounts = Arc::new(
        AccountService::new(store.clone(), hasher).context("failed to initialise accounts")?,
    );
    let users = accounts
        .user_count()
        .await
        .context("failed to read credential database")?;
    info!(
        "credential database {} ready with {users} user(s)",
        settings.database_path.display()
    );

    let listener = bind(settings.bind_addr).await?;

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Main server loop ──────────────────────────────────────────────────────
    let session_settings = SessionSettings {
        accounts,
        read_timeout: settings.read_timeout,
    };
    run_server(listener, session_settings, running).await;

    // All sessions are gone, so this is normally the last reference.
    match Arc::try_unwrap(store) {
        Ok(store) => store.close().context("failed to close credential database")?,
        Err(_) => warn!("credential database still in use at shutdown; leaving it to drop"),
    }

    info!("auth server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
