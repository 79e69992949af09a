//! SQLite storage layer for kindred.
//!
//! Provides the shared database behind the account and connection stores.
//! Handles schema creation and CRUD operations for all entity types. Each
//! collection lives in its own id-keyed table with indexes on the scan
//! columns, and the accept path runs its two writes inside one transaction.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StorageError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    NotFound(String),
    AlreadyExists(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Sqlite(e) => write!(f, "sqlite error: {e}"),
            StorageError::Io(e) => write!(f, "io error: {e}"),
            StorageError::NotFound(msg) => write!(f, "not found: {msg}"),
            StorageError::AlreadyExists(msg) => write!(f, "already exists: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Sqlite(e)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// User row stored in the database.
///
/// `friends_count` and `connections_count` are advisory display counters
/// carried on the record itself; they are never recomputed from the
/// connections table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub name: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    #[serde(skip)]
    pub password_hash: String,
    pub join_date: u64,
    pub friends_count: u32,
    pub connections_count: u32,
}

/// Session row mapping a bearer token to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub token: String,
    pub user_id: String,
    pub login_time: u64,
}

/// Connection request row stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRequestRow {
    pub id: i64,
    pub from_user_id: String,
    pub to_user_id: String,
    /// "pending", "accepted", "declined"
    pub status: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Accepted-connection row. Symmetric: either endpoint may appear as
/// `user_id` or `connected_user_id`, so lookups check both orderings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRow {
    pub id: i64,
    pub user_id: String,
    pub connected_user_id: String,
    /// Always "accepted" in practice.
    pub status: String,
    pub created_at: u64,
    pub updated_at: u64,
}

// ---------------------------------------------------------------------------
// Storage handle
// ---------------------------------------------------------------------------

/// Database filename inside the data directory.
pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("kindred.db")
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Main storage handle wrapping a SQLite connection.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create a database at the given path. Creates schema if needed.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    /// Create an in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE,
                username        TEXT NOT NULL UNIQUE,
                name            TEXT NOT NULL,
                bio             TEXT,
                avatar          TEXT,
                password_hash   TEXT NOT NULL,
                join_date       INTEGER NOT NULL,
                friends_count   INTEGER NOT NULL DEFAULT 0,
                connections_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token       TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                login_time  INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS connection_requests (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                from_user_id    TEXT NOT NULL,
                to_user_id      TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'pending',
                created_at      INTEGER NOT NULL,
                updated_at      INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_requests_to
                ON connection_requests(to_user_id, status);
            CREATE INDEX IF NOT EXISTS idx_requests_from
                ON connection_requests(from_user_id, status);

            CREATE TABLE IF NOT EXISTS connections (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id             TEXT NOT NULL,
                connected_user_id   TEXT NOT NULL,
                status              TEXT NOT NULL DEFAULT 'accepted',
                created_at          INTEGER NOT NULL,
                updated_at          INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_connections_user
                ON connections(user_id, status);
            CREATE INDEX IF NOT EXISTS idx_connections_other
                ON connections(connected_user_id, status);

            CREATE TABLE IF NOT EXISTS settings (
                key     TEXT PRIMARY KEY,
                value   TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Users CRUD
    // -----------------------------------------------------------------------

    /// Insert a new user. Email and username carry UNIQUE constraints, so a
    /// duplicate that slips past the service-level check still fails here.
    pub fn insert_user(&self, row: &UserRow) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO users
             (id, email, username, name, bio, avatar, password_hash,
              join_date, friends_count, connections_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                row.id,
                row.email,
                row.username,
                row.name,
                row.bio,
                row.avatar,
                row.password_hash,
                row.join_date as i64,
                row.friends_count as i64,
                row.connections_count as i64,
            ],
        )?;
        Ok(())
    }

    fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
        Ok(UserRow {
            id: row.get(0)?,
            email: row.get(1)?,
            username: row.get(2)?,
            name: row.get(3)?,
            bio: row.get(4)?,
            avatar: row.get(5)?,
            password_hash: row.get(6)?,
            join_date: row.get::<_, i64>(7)? as u64,
            friends_count: row.get::<_, i64>(8)? as u32,
            connections_count: row.get::<_, i64>(9)? as u32,
        })
    }

    const USER_COLUMNS: &'static str = "id, email, username, name, bio, avatar, password_hash,
                join_date, friends_count, connections_count";

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users WHERE id = ?1",
            Self::USER_COLUMNS
        ))?;
        let row = stmt.query_row(params![id], Self::user_from_row).optional()?;
        Ok(row)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users WHERE email = ?1",
            Self::USER_COLUMNS
        ))?;
        let row = stmt
            .query_row(params![email], Self::user_from_row)
            .optional()?;
        Ok(row)
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users WHERE username = ?1",
            Self::USER_COLUMNS
        ))?;
        let row = stmt
            .query_row(params![username], Self::user_from_row)
            .optional()?;
        Ok(row)
    }

    /// Overwrite an existing user record. Returns whether a row was updated.
    pub fn update_user(&self, row: &UserRow) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "UPDATE users
             SET email = ?1, username = ?2, name = ?3, bio = ?4, avatar = ?5,
                 password_hash = ?6, join_date = ?7, friends_count = ?8,
                 connections_count = ?9
             WHERE id = ?10",
            params![
                row.email,
                row.username,
                row.name,
                row.bio,
                row.avatar,
                row.password_hash,
                row.join_date as i64,
                row.friends_count as i64,
                row.connections_count as i64,
                row.id,
            ],
        )?;
        Ok(affected > 0)
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY join_date",
            Self::USER_COLUMNS
        ))?;
        let rows = stmt.query_map([], Self::user_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn count_users(&self) -> Result<u32, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u32)
    }

    // -----------------------------------------------------------------------
    // Sessions CRUD
    // -----------------------------------------------------------------------

    pub fn insert_session(&self, row: &SessionRow) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO sessions (token, user_id, login_time) VALUES (?1, ?2, ?3)",
            params![row.token, row.user_id, row.login_time as i64],
        )?;
        Ok(())
    }

    pub fn get_session(&self, token: &str) -> Result<Option<SessionRow>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT token, user_id, login_time FROM sessions WHERE token = ?1")?;
        let row = stmt
            .query_row(params![token], |row| {
                Ok(SessionRow {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    login_time: row.get::<_, i64>(2)? as u64,
                })
            })
            .optional()?;
        Ok(row)
    }

    pub fn delete_session(&self, token: &str) -> Result<bool, StorageError> {
        let affected = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Connection request CRUD
    // -----------------------------------------------------------------------

    /// Insert a new pending connection request. Returns the new row id.
    pub fn insert_connection_request(
        &self,
        row: &ConnectionRequestRow,
    ) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO connection_requests
             (from_user_id, to_user_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.from_user_id,
                row.to_user_id,
                row.status,
                row.created_at as i64,
                row.updated_at as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn request_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConnectionRequestRow> {
        Ok(ConnectionRequestRow {
            id: row.get(0)?,
            from_user_id: row.get(1)?,
            to_user_id: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get::<_, i64>(4)? as u64,
            updated_at: row.get::<_, i64>(5)? as u64,
        })
    }

    const REQUEST_COLUMNS: &'static str =
        "id, from_user_id, to_user_id, status, created_at, updated_at";

    pub fn get_connection_request(
        &self,
        id: i64,
    ) -> Result<Option<ConnectionRequestRow>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM connection_requests WHERE id = ?1",
            Self::REQUEST_COLUMNS
        ))?;
        let row = stmt
            .query_row(params![id], Self::request_from_row)
            .optional()?;
        Ok(row)
    }

    /// Pending requests addressed to a user, newest first.
    pub fn list_pending_requests_to(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConnectionRequestRow>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM connection_requests
             WHERE to_user_id = ?1 AND status = 'pending'
             ORDER BY created_at DESC",
            Self::REQUEST_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id], Self::request_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Pending requests sent by a user, newest first.
    pub fn list_pending_requests_from(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConnectionRequestRow>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM connection_requests
             WHERE from_user_id = ?1 AND status = 'pending'
             ORDER BY created_at DESC",
            Self::REQUEST_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id], Self::request_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Find the latest request between two users regardless of direction or
    /// status.
    pub fn find_request_between(
        &self,
        user_id: &str,
        other_id: &str,
    ) -> Result<Option<ConnectionRequestRow>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM connection_requests
             WHERE (from_user_id = ?1 AND to_user_id = ?2)
                OR (from_user_id = ?2 AND to_user_id = ?1)
             ORDER BY created_at DESC, id DESC LIMIT 1",
            Self::REQUEST_COLUMNS
        ))?;
        let row = stmt
            .query_row(params![user_id, other_id], Self::request_from_row)
            .optional()?;
        Ok(row)
    }

    pub fn update_request_status(&self, id: i64, status: &str) -> Result<bool, StorageError> {
        let now = now_secs();
        let affected = self.conn.execute(
            "UPDATE connection_requests SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, now as i64, id],
        )?;
        Ok(affected > 0)
    }

    /// Reset a resolved request to pending under a (possibly new) direction.
    /// Used when a previously declined pair is re-requested.
    pub fn reopen_request(
        &self,
        id: i64,
        from_user_id: &str,
        to_user_id: &str,
    ) -> Result<bool, StorageError> {
        let now = now_secs();
        let affected = self.conn.execute(
            "UPDATE connection_requests
             SET from_user_id = ?1, to_user_id = ?2, status = 'pending', updated_at = ?3
             WHERE id = ?4",
            params![from_user_id, to_user_id, now as i64, id],
        )?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Connections CRUD
    // -----------------------------------------------------------------------

    /// Resolve a pending request and create its connection row atomically.
    /// The request status update and the connection insert either both land
    /// or neither does.
    pub fn accept_request_and_connect(
        &self,
        request_id: i64,
    ) -> Result<ConnectionRow, StorageError> {
        let now = now_secs();
        let tx = self.conn.unchecked_transaction()?;

        let request = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM connection_requests WHERE id = ?1 AND status = 'pending'",
                Self::REQUEST_COLUMNS
            ))?;
            stmt.query_row(params![request_id], Self::request_from_row)
                .optional()?
        };
        let request = request.ok_or_else(|| {
            StorageError::NotFound(format!("pending connection request {request_id}"))
        })?;

        tx.execute(
            "UPDATE connection_requests SET status = 'accepted', updated_at = ?1 WHERE id = ?2",
            params![now as i64, request_id],
        )?;
        tx.execute(
            "INSERT INTO connections
             (user_id, connected_user_id, status, created_at, updated_at)
             VALUES (?1, ?2, 'accepted', ?3, ?3)",
            params![request.from_user_id, request.to_user_id, now as i64],
        )?;
        let connection_id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(ConnectionRow {
            id: connection_id,
            user_id: request.from_user_id,
            connected_user_id: request.to_user_id,
            status: "accepted".to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    fn connection_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConnectionRow> {
        Ok(ConnectionRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            connected_user_id: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get::<_, i64>(4)? as u64,
            updated_at: row.get::<_, i64>(5)? as u64,
        })
    }

    /// Find the accepted connection between two users, checking both
    /// orderings.
    pub fn connection_between(
        &self,
        user_id: &str,
        other_id: &str,
    ) -> Result<Option<ConnectionRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, connected_user_id, status, created_at, updated_at
             FROM connections
             WHERE ((user_id = ?1 AND connected_user_id = ?2)
                 OR (user_id = ?2 AND connected_user_id = ?1))
               AND status = 'accepted'
             LIMIT 1",
        )?;
        let row = stmt
            .query_row(params![user_id, other_id], Self::connection_from_row)
            .optional()?;
        Ok(row)
    }

    /// Users connected to the given user, resolved through either side of
    /// the symmetric connection rows.
    pub fn list_connected_users(&self, user_id: &str) -> Result<Vec<UserRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.email, u.username, u.name, u.bio, u.avatar, u.password_hash,
                    u.join_date, u.friends_count, u.connections_count
             FROM connections c
             JOIN users u
               ON u.id = CASE WHEN c.user_id = ?1 THEN c.connected_user_id ELSE c.user_id END
             WHERE (c.user_id = ?1 OR c.connected_user_id = ?1)
               AND c.status = 'accepted'
             ORDER BY c.created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], Self::user_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn count_connections(&self) -> Result<u32, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM connections WHERE status = 'accepted'",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM settings WHERE key = ?1")?;
        let row = stmt
            .query_row(params![key], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(row)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}
