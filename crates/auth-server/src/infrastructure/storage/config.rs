//! TOML-based configuration for the auth server.
//!
//! The file is looked up at an explicit path (`--config` / `AUTH_CONFIG`) or
//! in the platform-appropriate directory:
//! - Windows:  `%APPDATA%\AuthServer\config.toml`
//! - Linux:    `~/.config/auth-server/config.toml`
//! - macOS:    `~/Library/Application Support/AuthServer/config.toml`
//!
//! ```toml
//! [server]
//! bind_address = "127.0.0.1"
//! port = 6969
//! read_timeout_secs = 300
//!
//! [storage]
//! database_path = "users.db"
//!
//! [security]
//! bcrypt_cost = 12
//!
//! [logging]
//! log_level = "info"
//! ```
//!
//! Every field has a serde default, so a partial file (or none at all) still
//! yields a complete [`AppConfig`].  Command-line flags are applied on top in
//! `main.rs`, and [`AppConfig::into_settings`] turns the result into the
//! validated [`ServerSettings`] the server actually runs with.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` and `port` do not form a valid socket address.
    #[error("invalid bind address '{addr}': {source}")]
    InvalidBindAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// IP address to listen on.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds to wait for each client field before dropping the connection.
    /// `0` waits forever.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

/// Credential database settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Path of the SQLite database file; created on first start.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

/// Password hashing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityConfig {
    /// bcrypt work factor, 4..=31.
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    6969
}
fn default_read_timeout_secs() -> u64 {
    300
}
fn default_database_path() -> PathBuf {
    PathBuf::from("users.db")
}
fn default_bcrypt_cost() -> u32 {
    auth_core::crypto::password::DEFAULT_COST
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ── Runtime settings ──────────────────────────────────────────────────────────

/// Validated settings the server runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub bcrypt_cost: u32,
    /// `None` disables the per-field read timeout.
    pub read_timeout: Option<Duration>,
}

impl AppConfig {
    /// Validates the configuration and converts it to [`ServerSettings`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if `bind_address` is not an
    /// IP address.
    pub fn into_settings(self) -> Result<ServerSettings, ConfigError> {
        let addr = format!("{}:{}", self.server.bind_address, self.server.port);
        let bind_addr = addr
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddress { addr, source })?;

        let read_timeout = match self.server.read_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(ServerSettings {
            bind_addr,
            database_path: self.storage.database_path,
            bcrypt_cost: self.security.bcrypt_cost,
            read_timeout,
        })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from the platform directory, returning defaults if the
/// file does not exist yet.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the directory cannot be
/// resolved, [`ConfigError::Io`] for file-system errors other than "not
/// found", and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_file_path()?;

    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Loads the config from an explicit path.  Unlike [`load_config`], a
/// missing file is an error: the operator asked for this file by name.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Resolves the platform config directory, including the `auth-server`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("AuthServer"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("auth-server"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("AuthServer")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
