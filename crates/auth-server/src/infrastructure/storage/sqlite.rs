//! SQLite-backed credential store.
//!
//! Table:
//! - `users`: username (primary key), password_hash
//!
//! One connection is shared by every session behind a `parking_lot::Mutex`.
//! Each trait method holds the lock for its whole duration, which makes every
//! operation atomic with respect to the others.  `insert` additionally runs the
//! existence re-check and the write inside one transaction, so two sessions
//! racing to register the same name can never both succeed.
//!
//! All methods block; callers on the async runtime go through
//! `tokio::task::spawn_blocking`.

use std::path::Path;
use std::time::Duration;

use auth_core::{CredentialStore, InsertOutcome, PasswordHash, StoreError, UserRecord, Username};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

/// How long a statement waits on a locked database file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS users (
    username      VARCHAR(255) PRIMARY KEY,
    password_hash VARCHAR(255) NOT NULL
);";

/// SQLite implementation of [`CredentialStore`].
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
}

impl SqliteCredentialStore {
    /// Opens (or creates) the database at `path` and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(backend)?;
        debug!("opened credential database at {}", path.display());
        Self::init(conn)
    }

    /// Opens a private in-memory database.  Nothing survives the store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        // WAL for crash safety; FULL so a commit is on disk before we answer.
        // In-memory databases report "memory" here, which is fine.
        let journal: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(backend)?;
        debug!("journal_mode = {journal}");
        conn.pragma_update(None, "synchronous", "FULL").map_err(backend)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(backend)?;
        conn.execute_batch(SCHEMA).map_err(backend)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Closes the database, flushing the WAL.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if SQLite reports a failure on close.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn
            .into_inner()
            .close()
            .map_err(|(_conn, e)| backend(e))
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn exists(&self, username: &Username) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        exists_in(&conn, username)
    }

    fn lookup(&self, username: &Username) -> Result<Option<PasswordHash>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT password_hash FROM users WHERE username = ?1",
                params![username.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional();

        match row {
            Ok(hash) => Ok(hash.map(PasswordHash::from_stored)),
            Err(
                e @ (rusqlite::Error::InvalidColumnType(..)
                | rusqlite::Error::FromSqlConversionFailure(..)),
            ) => Err(StoreError::Corrupt {
                username: username.to_string(),
                reason: e.to_string(),
            }),
            Err(e) => Err(backend(e)),
        }
    }

    fn insert(&self, record: &UserRecord) -> Result<InsertOutcome, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(backend)?;

        // Dropping `tx` without commit rolls back.
        if exists_in(&tx, &record.username)? {
            return Ok(InsertOutcome::AlreadyExists);
        }

        let result = tx.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
            params![record.username.as_str(), record.password_hash.as_str()],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Ok(InsertOutcome::AlreadyExists);
            }
            Err(e) => return Err(backend(e)),
        }

        tx.commit().map_err(backend)?;
        Ok(InsertOutcome::Inserted)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .map_err(backend)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}

fn exists_in(conn: &Connection, username: &Username) -> Result<bool, StoreError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        params![username.as_str()],
        |row| row.get::<_, bool>(0),
    )
    .map_err(backend)
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn name(s: &str) -> Username {
        Username::parse(s).unwrap()
    }

    fn record(user: &str, hash: &str) -> UserRecord {
        UserRecord {
            username: name(user),
            password_hash: PasswordHash::from_stored(hash.to_string()),
        }
    }

    #[test]
    fn test_insert_then_lookup_returns_stored_hash() {
        // Arrange
        let store = SqliteCredentialStore::open_in_memory().unwrap();

        // Act
        let outcome = store.insert(&record("alice", "$2b$04$hash-a")).unwrap();

        // Assert
        assert_eq!(outcome, InsertOutcome::Inserted);
        let hash = store.lookup(&name("alice")).unwrap().unwrap();
        assert_eq!(hash.as_str(), "$2b$04$hash-a");
        assert!(store.exists(&name("alice")).unwrap());
    }

    #[test]
    fn test_lookup_unknown_user_returns_none() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        assert!(store.lookup(&name("bob")).unwrap().is_none());
        assert!(!store.exists(&name("bob")).unwrap());
    }

    #[test]
    fn test_duplicate_insert_reports_already_exists_and_keeps_first_hash() {
        // Arrange
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        store.insert(&record("alice", "first")).unwrap();

        // Act
        let outcome = store.insert(&record("alice", "second")).unwrap();

        // Assert
        assert_eq!(outcome, InsertOutcome::AlreadyExists);
        assert_eq!(store.lookup(&name("alice")).unwrap().unwrap().as_str(), "first");
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_usernames_are_case_sensitive() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        store.insert(&record("alice", "h1")).unwrap();

        let outcome = store.insert(&record("Alice", "h2")).unwrap();

        assert_eq!(outcome, InsertOutcome::Inserted);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_records_survive_close_and_reopen() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.db");
        let store = SqliteCredentialStore::open(&path).unwrap();
        store.insert(&record("alice", "persisted")).unwrap();
        store.close().unwrap();

        // Act
        let reopened = SqliteCredentialStore::open(&path).unwrap();

        // Assert
        assert_eq!(reopened.count().unwrap(), 1);
        assert_eq!(
            reopened.lookup(&name("alice")).unwrap().unwrap().as_str(),
            "persisted"
        );
    }

    #[test]
    fn test_open_creates_users_table_with_expected_columns() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.db");
        SqliteCredentialStore::open(&path).unwrap().close().unwrap();

        // Act: inspect the schema through a separate connection
        let conn = Connection::open(&path).unwrap();
        let mut stmt = conn.prepare("PRAGMA table_info(users)").unwrap();
        let columns: Vec<(String, bool)> = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(5)? > 0)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        // Assert: (name, is_primary_key)
        assert_eq!(
            columns,
            vec![
                ("username".to_string(), true),
                ("password_hash".to_string(), false)
            ]
        );
    }

    #[test]
    fn test_lookup_of_non_text_hash_reports_corrupt_record() {
        // Arrange: a row written behind the store's back with a BLOB hash
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.db");
        SqliteCredentialStore::open(&path).unwrap().close().unwrap();
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO users (username, password_hash) VALUES ('mallory', X'00FF')",
            [],
        )
        .unwrap();
        drop(conn);

        // Act
        let store = SqliteCredentialStore::open(&path).unwrap();
        let result = store.lookup(&name("mallory"));

        // Assert
        match result {
            Err(StoreError::Corrupt { username, .. }) => assert_eq!(username, "mallory"),
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    fn test_concurrent_inserts_of_same_username_admit_exactly_one() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteCredentialStore::open(&dir.path().join("users.db")).unwrap());

        // Act: 16 threads race to register "carol"
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.insert(&record("carol", &format!("hash-{i}"))).unwrap())
            })
            .collect();
        let outcomes: Vec<InsertOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // Assert
        let inserted = outcomes
            .iter()
            .filter(|o| **o == InsertOutcome::Inserted)
            .count();
        assert_eq!(inserted, 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_open_in_unwritable_location_fails_with_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("users.db");
        let result = SqliteCredentialStore::open(&path);
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }
}
