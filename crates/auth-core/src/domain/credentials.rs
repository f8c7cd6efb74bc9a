//! Credential records and the storage contract.
//!
//! # Invariants
//!
//! - A username is case-sensitive, non-empty after trimming, and at most
//!   [`MAX_USERNAME_CHARS`] characters.  Once constructed, a [`Username`] is
//!   always valid.
//! - A stored record never holds plaintext; it holds a [`PasswordHash`]
//!   produced by a [`crate::crypto::password::PasswordHasher`].
//! - A [`CredentialStore`] keeps at most one record per username.  `insert`
//!   re-checks existence inside the same critical section as the write.

use std::fmt;

use thiserror::Error;

use crate::crypto::password::PasswordHash;

/// Longest username accepted, in characters.
pub const MAX_USERNAME_CHARS: usize = 255;

/// Longest password accepted, in bytes.  bcrypt only reads the first 72 bytes
/// of its input, so anything longer would silently alias a shorter password.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Validation failures for client-supplied credentials.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("username cannot be empty")]
    EmptyUsername,
    #[error("username too long ({0} characters, max {MAX_USERNAME_CHARS})")]
    UsernameTooLong(usize),
    #[error("password cannot be empty")]
    EmptyPassword,
    #[error("password too long ({0} bytes, max {MAX_PASSWORD_BYTES})")]
    PasswordTooLong(usize),
}

// ── Username ──────────────────────────────────────────────────────────────────

/// A validated username.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Trims surrounding whitespace and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::EmptyUsername`] or
    /// [`CredentialError::UsernameTooLong`].
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CredentialError::EmptyUsername);
        }
        let chars = trimmed.chars().count();
        if chars > MAX_USERNAME_CHARS {
            return Err(CredentialError::UsernameTooLong(chars));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Checks a plaintext password against the registration rules.
///
/// # Errors
///
/// Returns [`CredentialError::EmptyPassword`] or
/// [`CredentialError::PasswordTooLong`].
pub fn validate_password(password: &str) -> Result<(), CredentialError> {
    if password.is_empty() {
        return Err(CredentialError::EmptyPassword);
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(CredentialError::PasswordTooLong(password.len()));
    }
    Ok(())
}

// ── Stored record ─────────────────────────────────────────────────────────────

/// One row of the credential table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: Username,
    pub password_hash: PasswordHash,
}

// ── Storage contract ──────────────────────────────────────────────────────────

/// Result of [`CredentialStore::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was written and committed.
    Inserted,
    /// A record with this username already exists; nothing was written.
    AlreadyExists,
}

/// A storage-layer failure.  Fatal for the operation that raised it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database reported an error.
    #[error("credential store backend error: {0}")]
    Backend(String),
    /// A stored row could not be interpreted.
    #[error("corrupt credential record for {username}: {reason}")]
    Corrupt { username: String, reason: String },
}

/// Persistent username → password-hash mapping shared by every session.
///
/// Implementations must be safe to call from many threads at once and must
/// make each method atomic with respect to the others.  In particular
/// `insert` must never create a second record for an existing username, even
/// when two callers race between `exists` and `insert`.
pub trait CredentialStore: Send + Sync {
    /// Returns `true` iff a record for `username` exists.
    fn exists(&self, username: &Username) -> Result<bool, StoreError>;

    /// Returns the stored hash for `username`, if any.
    fn lookup(&self, username: &Username) -> Result<Option<PasswordHash>, StoreError>;

    /// Stores `record` unless the username is already taken.
    fn insert(&self, record: &UserRecord) -> Result<InsertOutcome, StoreError>;

    /// Number of stored records.
    fn count(&self) -> Result<u64, StoreError>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_parse_trims_whitespace() {
        let name = Username::parse("  alice \n").unwrap();
        assert_eq!(name.as_str(), "alice");
    }

    #[test]
    fn test_username_parse_is_case_sensitive() {
        let lower = Username::parse("alice").unwrap();
        let upper = Username::parse("Alice").unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_username_parse_rejects_empty_and_blank() {
        assert_eq!(Username::parse(""), Err(CredentialError::EmptyUsername));
        assert_eq!(Username::parse("   "), Err(CredentialError::EmptyUsername));
    }

    #[test]
    fn test_username_parse_enforces_character_limit() {
        let max = "é".repeat(MAX_USERNAME_CHARS);
        assert!(Username::parse(&max).is_ok(), "limit counts chars, not bytes");

        let over = "a".repeat(MAX_USERNAME_CHARS + 1);
        assert_eq!(
            Username::parse(&over),
            Err(CredentialError::UsernameTooLong(MAX_USERNAME_CHARS + 1))
        );
    }

    #[test]
    fn test_validate_password_accepts_up_to_limit() {
        assert!(validate_password("secret1").is_ok());
        assert!(validate_password(&"p".repeat(MAX_PASSWORD_BYTES)).is_ok());
    }

    #[test]
    fn test_validate_password_rejects_empty() {
        assert_eq!(validate_password(""), Err(CredentialError::EmptyPassword));
    }

    #[test]
    fn test_validate_password_rejects_over_limit() {
        let long = "p".repeat(MAX_PASSWORD_BYTES + 1);
        assert_eq!(
            validate_password(&long),
            Err(CredentialError::PasswordTooLong(MAX_PASSWORD_BYTES + 1))
        );
    }
}
