//! Session storage abstraction.
//!
//! The tracker and aggregator only need a handful of keyed record operations,
//! captured by [`SessionStore`]. The SQLite implementation lives in `sg-db`;
//! [`MemoryStore`] keeps everything in process.
//!
//! # One open session per user
//!
//! Stores enforce the invariant themselves: [`SessionStore::create`] of an open
//! session fails with [`StoreError::OpenSessionExists`] when the user already
//! has one. Two racing "entered" events for the same user therefore produce a
//! single open session no matter how the tracker calls are interleaved.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::session::{Scope, Session};
use crate::types::UserId;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed to read or write.
    #[error("storage error: {source}")]
    Storage {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The user already has an open session.
    #[error("user {user_id} already has an open session")]
    OpenSessionExists { user_id: UserId },
    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("session store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Wraps a backend error.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(_: PoisonError<T>) -> Self {
        Self::Poisoned
    }
}

/// Keyed record store for sessions.
///
/// Implementations must be safe to call concurrently for different users.
pub trait SessionStore: Send + Sync {
    /// Persists a new session.
    fn create(&self, session: &Session) -> Result<(), StoreError>;

    /// Returns the open session for a user, if any.
    fn find_open_by_user(&self, user_id: &UserId) -> Result<Option<Session>, StoreError>;

    /// Returns every session in scope, ordered by start time then ID.
    fn find_by_scope(&self, scope: &Scope) -> Result<Vec<Session>, StoreError>;

    /// Closes every open session for a user. Returns the number of sessions closed.
    fn close_open_by_user(
        &self,
        user_id: &UserId,
        end_time: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    /// Closes every open session. Returns the number of sessions closed.
    fn close_all_open(&self, end_time: DateTime<Utc>) -> Result<usize, StoreError>;
}

impl<S: SessionStore + ?Sized> SessionStore for std::sync::Arc<S> {
    fn create(&self, session: &Session) -> Result<(), StoreError> {
        (**self).create(session)
    }

    fn find_open_by_user(&self, user_id: &UserId) -> Result<Option<Session>, StoreError> {
        (**self).find_open_by_user(user_id)
    }

    fn find_by_scope(&self, scope: &Scope) -> Result<Vec<Session>, StoreError> {
        (**self).find_by_scope(scope)
    }

    fn close_open_by_user(
        &self,
        user_id: &UserId,
        end_time: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        (**self).close_open_by_user(user_id, end_time)
    }

    fn close_all_open(&self, end_time: DateTime<Utc>) -> Result<usize, StoreError> {
        (**self).close_all_open(end_time)
    }
}

/// In-process session store.
///
/// Sessions are kept in insertion order behind a single `RwLock`; the
/// uniqueness check and insert happen under the same write guard.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<Vec<Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored session.
    pub fn all(&self) -> Result<Vec<Session>, StoreError> {
        Ok(self.sessions.read()?.clone())
    }
}

fn close(session: &mut Session, end_time: DateTime<Utc>) {
    session.end_time = Some(end_time.max(session.start_time));
}

impl SessionStore for MemoryStore {
    fn create(&self, session: &Session) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write()?;
        if session.is_open()
            && sessions
                .iter()
                .any(|s| s.is_open() && s.user_id == session.user_id)
        {
            return Err(StoreError::OpenSessionExists {
                user_id: session.user_id.clone(),
            });
        }
        sessions.push(session.clone());
        Ok(())
    }

    fn find_open_by_user(&self, user_id: &UserId) -> Result<Option<Session>, StoreError> {
        let sessions = self.sessions.read()?;
        Ok(sessions
            .iter()
            .find(|s| s.is_open() && s.user_id == *user_id)
            .cloned())
    }

    fn find_by_scope(&self, scope: &Scope) -> Result<Vec<Session>, StoreError> {
        let sessions = self.sessions.read()?;
        let mut found: Vec<Session> = sessions
            .iter()
            .filter(|s| scope.matches(s))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(found)
    }

    fn close_open_by_user(
        &self,
        user_id: &UserId,
        end_time: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.write()?;
        let mut closed = 0;
        for session in sessions
            .iter_mut()
            .filter(|s| s.is_open() && s.user_id == *user_id)
        {
            close(session, end_time);
            closed += 1;
        }
        Ok(closed)
    }

    fn close_all_open(&self, end_time: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.write()?;
        let mut closed = 0;
        for session in sessions.iter_mut().filter(|s| s.is_open()) {
            close(session, end_time);
            closed += 1;
        }
        Ok(closed)
    }
}
