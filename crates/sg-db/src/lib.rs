//! SQLite storage for seraglio sessions.
//!
//! Provides a [`SessionStore`] backed by `rusqlite`.
//!
//! # Thread Safety
//!
//! `rusqlite::Connection` is `Send` but not `Sync`, so [`Database`] keeps it
//! behind a `Mutex`. Every store operation is a single statement executed under
//! the lock, which makes the database safe to share across event handlers.
//!
//! File databases run in WAL mode: readers in other processes (the query
//! subcommands) read a committed snapshot and never block the tracker's writes.
//!
//! # Schema
//!
//! One `sessions` table keyed by `id`, indexed by user, guild and channel.
//! A partial unique index on `user_id WHERE end_time IS NULL` guarantees at
//! most one open session per user; inserting a second one fails with
//! [`StoreError::OpenSessionExists`].
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`), so lexicographic ordering matches
//! chronological ordering and SQL comparisons on the column are meaningful.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use sg_core::{
    ChannelId, GuildId, Scope, Session, SessionId, SessionStore, StoreError, UserId,
    ValidationError,
};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for session {session_id}: {timestamp}")]
    TimestampParse {
        session_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored identifier failed validation.
    #[error("invalid identifier for session {session_id}: {source}")]
    InvalidId {
        session_id: String,
        #[source]
        source: ValidationError,
    },
    /// The user already has an open session.
    #[error("user {user_id} already has an open session")]
    OpenSessionExists { user_id: UserId },
    /// The connection lock was poisoned by a panicking thread.
    #[error("database lock poisoned")]
    LockPoisoned,
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::OpenSessionExists { user_id } => Self::OpenSessionExists { user_id },
            DbError::LockPoisoned => Self::Poisoned,
            other => Self::storage(other),
        }
    }
}

/// How long a connection waits on another process's lock by default.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

const SESSION_COLUMNS: &str = "id, user_id, guild_id, channel_id, start_time, end_time";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Like [`open`](Self::open), waiting up to `busy_timeout` for another
    /// process's write lock before failing with `SQLITE_BUSY`.
    pub fn open_with_busy_timeout(path: &Path, busy_timeout: Duration) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        tracing::debug!(path = ?path, ?busy_timeout, "opened session database");
        Self::init(conn, busy_timeout)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, DEFAULT_BUSY_TIMEOUT)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(conn: Connection, busy_timeout: Duration) -> Result<Self, DbError> {
        conn.busy_timeout(busy_timeout)?;
        // In-memory databases stay in "memory" mode.
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(journal_mode = %journal_mode, "configured journal mode");
        conn.execute_batch(
            "
            -- start_time/end_time: RFC 3339 with milliseconds, always UTC
            -- end_time IS NULL marks a session that is still open
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                guild_id TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_guild ON sessions(guild_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_channel ON sessions(channel_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_open
                ON sessions(user_id) WHERE end_time IS NULL;
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    /// Inserts a session.
    pub fn insert_session(&self, session: &Session) -> Result<(), DbError> {
        let conn = self.conn()?;
        let result = conn.execute(
            "
            INSERT INTO sessions (id, user_id, guild_id, channel_id, start_time, end_time)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
            params![
                session.id.as_str(),
                session.user_id.as_str(),
                session.guild_id.as_str(),
                session.channel_id.as_str(),
                format_timestamp(session.start_time),
                session.end_time.map(format_timestamp),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_open_session_conflict(&e) => Err(DbError::OpenSessionExists {
                user_id: session.user_id.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the open session for a user, if any.
    pub fn open_session_for_user(&self, user_id: &UserId) -> Result<Option<Session>, DbError> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ? AND end_time IS NULL"
                ),
                [user_id.as_str()],
                RawSession::from_row,
            )
            .optional()?;
        raw.map(RawSession::into_session).transpose()
    }

    /// Lists sessions in scope, ordered by start time then ID.
    pub fn sessions_in_scope(&self, scope: &Scope) -> Result<Vec<Session>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "
            SELECT {SESSION_COLUMNS}
            FROM sessions
            WHERE guild_id = ?1
              AND (?2 IS NULL OR channel_id = ?2)
              AND (?3 IS NULL OR user_id = ?3)
            ORDER BY start_time ASC, id ASC
            "
        ))?;
        let rows = stmt.query_map(
            params![
                scope.guild_id.as_str(),
                scope.channel_id.as_ref().map(ChannelId::as_str),
                scope.user_id.as_ref().map(UserId::as_str),
            ],
            RawSession::from_row,
        )?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.into_session()?);
        }
        Ok(sessions)
    }

    /// Closes every open session for a user.
    ///
    /// An end time earlier than the start is clamped to the start.
    pub fn close_user_sessions(
        &self,
        user_id: &UserId,
        end_time: DateTime<Utc>,
    ) -> Result<usize, DbError> {
        let conn = self.conn()?;
        let closed = conn.execute(
            "
            UPDATE sessions
            SET end_time = CASE WHEN start_time > ?1 THEN start_time ELSE ?1 END
            WHERE user_id = ?2 AND end_time IS NULL
            ",
            params![format_timestamp(end_time), user_id.as_str()],
        )?;
        Ok(closed)
    }

    /// Closes every open session.
    pub fn close_all_sessions(&self, end_time: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn()?;
        let closed = conn.execute(
            "
            UPDATE sessions
            SET end_time = CASE WHEN start_time > ?1 THEN start_time ELSE ?1 END
            WHERE end_time IS NULL
            ",
            [format_timestamp(end_time)],
        )?;
        Ok(closed)
    }
}

impl SessionStore for Database {
    fn create(&self, session: &Session) -> Result<(), StoreError> {
        Ok(self.insert_session(session)?)
    }

    fn find_open_by_user(&self, user_id: &UserId) -> Result<Option<Session>, StoreError> {
        Ok(self.open_session_for_user(user_id)?)
    }

    fn find_by_scope(&self, scope: &Scope) -> Result<Vec<Session>, StoreError> {
        Ok(self.sessions_in_scope(scope)?)
    }

    fn close_open_by_user(
        &self,
        user_id: &UserId,
        end_time: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        Ok(self.close_user_sessions(user_id, end_time)?)
    }

    fn close_all_open(&self, end_time: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.close_all_sessions(end_time)?)
    }
}

/// A session row before validation.
struct RawSession {
    id: String,
    user_id: String,
    guild_id: String,
    channel_id: String,
    start_time: String,
    end_time: Option<String>,
}

impl RawSession {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            guild_id: row.get(2)?,
            channel_id: row.get(3)?,
            start_time: row.get(4)?,
            end_time: row.get(5)?,
        })
    }

    fn into_session(self) -> Result<Session, DbError> {
        let invalid = |source| DbError::InvalidId {
            session_id: self.id.clone(),
            source,
        };
        let user_id = UserId::new(self.user_id.as_str()).map_err(invalid)?;
        let guild_id = GuildId::new(self.guild_id.as_str()).map_err(invalid)?;
        let channel_id = ChannelId::new(self.channel_id.as_str()).map_err(invalid)?;
        let start_time = parse_timestamp(&self.id, &self.start_time)?;
        let end_time = self
            .end_time
            .as_deref()
            .map(|t| parse_timestamp(&self.id, t))
            .transpose()?;
        let id = SessionId::new(self.id.as_str()).map_err(invalid)?;

        Ok(Session {
            id,
            user_id,
            guild_id,
            channel_id,
            start_time,
            end_time,
        })
    }
}

fn is_open_session_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(session_id: &str, timestamp: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            session_id: session_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}
