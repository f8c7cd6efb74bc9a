//! One-way salted password hashing.
//!
//! [`BcryptHasher`] produces modular-crypt strings such as
//! `$2b$12$<22-char salt><31-char hash>`.  The salt is generated fresh for
//! every call and embedded in the output, so the stored string is all that
//! verification needs.
//!
//! The cost factor doubles the work per increment; 12 takes roughly a quarter
//! of a second on commodity hardware.  Tests use [`MIN_COST`].
//!
//! Both operations are CPU-bound and should be run off the async executor
//! (see `tokio::task::spawn_blocking`).

use std::fmt;

use thiserror::Error;

use crate::domain::credentials::MAX_PASSWORD_BYTES;

/// Work factor used when none is configured.
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

/// Cheapest accepted work factor.  Only suitable for tests.
pub const MIN_COST: u32 = 4;

/// Most expensive work factor bcrypt supports.
pub const MAX_COST: u32 = 31;

/// Errors raised while hashing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashError {
    /// The configured cost is outside bcrypt's supported range.
    #[error("bcrypt cost {0} is outside the supported range {min}..={max}", min = MIN_COST, max = MAX_COST)]
    InvalidCost(u32),
    /// The plaintext is longer than bcrypt can hash without truncation.
    #[error("password exceeds {MAX_PASSWORD_BYTES} bytes")]
    InputTooLong,
    /// The bcrypt implementation failed.
    #[error("bcrypt failure: {0}")]
    Bcrypt(String),
}

// ── PasswordHash ──────────────────────────────────────────────────────────────

/// An opaque stored password hash (salt included).
///
/// `Debug` is redacted so a hash never ends up in a log line by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wraps a hash string read back from storage.
    pub fn from_stored(encoded: String) -> Self {
        Self(encoded)
    }

    /// The encoded hash, for persisting.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

// ── Hasher trait ──────────────────────────────────────────────────────────────

/// Salted one-way hashing and verification of passwords.
pub trait PasswordHasher: Send + Sync {
    /// Hashes `plaintext` with a fresh random salt.
    fn hash(&self, plaintext: &str) -> Result<PasswordHash, HashError>;

    /// Returns `true` iff `plaintext` matches `hash`.
    ///
    /// Never fails: a malformed hash simply does not match.
    fn verify(&self, plaintext: &str, hash: &PasswordHash) -> bool;
}

/// bcrypt-backed [`PasswordHasher`].
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    /// Creates a hasher with the given work factor.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::InvalidCost`] if `cost` is outside
    /// `MIN_COST..=MAX_COST`.
    pub fn new(cost: u32) -> Result<Self, HashError> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            return Err(HashError::InvalidCost(cost));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self {
            cost: DEFAULT_COST,
        }
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<PasswordHash, HashError> {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(HashError::InputTooLong);
        }
        bcrypt::hash(plaintext, self.cost)
            .map(PasswordHash)
            .map_err(|e| HashError::Bcrypt(e.to_string()))
    }

    fn verify(&self, plaintext: &str, hash: &PasswordHash) -> bool {
        // bcrypt ignores bytes past 72; refuse rather than match a prefix.
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return false;
        }
        bcrypt::verify(plaintext, hash.as_str()).unwrap_or(false)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
