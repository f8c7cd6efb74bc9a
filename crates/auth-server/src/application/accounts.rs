//! Account use cases: login, username availability, and registration.
//!
//! [`AccountService`] is the only place that combines the credential store
//! with the password hasher.  Both collaborators are blocking (SQLite and
//! bcrypt), so every method moves its work onto tokio's blocking pool and the
//! session task just awaits the result.
//!
//! Usernames and passwords arrive exactly as the client typed them; surrounding
//! whitespace is stripped here before any rule is applied.

use std::sync::Arc;

use auth_core::{
    domain::validate_password, CredentialError, CredentialStore, HashError, InsertOutcome,
    PasswordHash, PasswordHasher, StoreError, UserRecord, Username,
};
use thiserror::Error;
use tokio::task::{self, JoinError};

/// Plaintext hashed once at startup to build the decoy hash.
const DECOY_PASSWORD: &str = "decoy-password-for-timing";

/// Internal faults.  None of these is the client's fault; the session reports
/// them as `INTERNAL_ERROR` and closes.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("credential store failure: {0}")]
    Storage(#[from] StoreError),
    #[error("password hashing failure: {0}")]
    Hashing(#[from] HashError),
    #[error("blocking worker failed: {0}")]
    Worker(#[from] JoinError),
}

/// Result of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated,
    /// Unknown user, wrong password, or invalid input.  Deliberately one case.
    Rejected,
}

/// Result of the first registration phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Taken,
}

/// Result of the second registration phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    /// Another session registered the same name after the availability check.
    LostRace,
    /// The password broke a credential rule; nothing was stored.
    Invalid(CredentialError),
}

/// Login and registration on top of a [`CredentialStore`] and a
/// [`PasswordHasher`].  Cheap to share: wrap in an `Arc`.
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    decoy: PasswordHash,
}

impl AccountService {
    /// Builds the service and pre-computes the decoy hash used to keep failed
    /// logins for unknown users as slow as those for known ones.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Hashing`] if the hasher cannot produce the
    /// decoy hash.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self, AccountError> {
        let decoy = hasher.hash(DECOY_PASSWORD)?;
        Ok(Self {
            store,
            hasher,
            decoy,
        })
    }

    /// Checks `password` against the stored hash for `username`.
    ///
    /// Runs one bcrypt verification whether or not the user exists.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, AccountError> {
        let username = Username::parse(username).ok();
        let password = password.trim().to_owned();
        let store = Arc::clone(&self.store);
        let hasher = Arc::clone(&self.hasher);
        let decoy = self.decoy.clone();

        task::spawn_blocking(move || -> Result<LoginOutcome, AccountError> {
            let stored = match &username {
                Some(name) => store.lookup(name)?,
                None => None,
            };
            let authenticated = match stored {
                Some(hash) => hasher.verify(&password, &hash),
                None => {
                    let _ = hasher.verify(&password, &decoy);
                    false
                }
            };
            Ok(if authenticated {
                LoginOutcome::Authenticated
            } else {
                LoginOutcome::Rejected
            })
        })
        .await?
    }

    /// Reports whether `username` is free.
    pub async fn availability(&self, username: &Username) -> Result<Availability, AccountError> {
        let store = Arc::clone(&self.store);
        let username = username.clone();

        let taken = task::spawn_blocking(move || store.exists(&username)).await??;
        Ok(if taken {
            Availability::Taken
        } else {
            Availability::Available
        })
    }

    /// Hashes `password` and stores the record unless the name was taken in
    /// the meantime.
    pub async fn register(
        &self,
        username: Username,
        password: &str,
    ) -> Result<RegisterOutcome, AccountError> {
        let password = password.trim().to_owned();
        if let Err(e) = validate_password(&password) {
            return Ok(RegisterOutcome::Invalid(e));
        }

        let store = Arc::clone(&self.store);
        let hasher = Arc::clone(&self.hasher);

        task::spawn_blocking(move || -> Result<RegisterOutcome, AccountError> {
            let password_hash = hasher.hash(&password)?;
            let record = UserRecord {
                username,
                password_hash,
            };
            Ok(match store.insert(&record)? {
                InsertOutcome::Inserted => RegisterOutcome::Registered,
                InsertOutcome::AlreadyExists => RegisterOutcome::LostRace,
            })
        })
        .await?
    }

    /// Number of registered users.
    pub async fn user_count(&self) -> Result<u64, AccountError> {
        let store = Arc::clone(&self.store);
        Ok(task::spawn_blocking(move || store.count()).await??)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
