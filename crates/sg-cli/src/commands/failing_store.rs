//! A session store that fails on demand.

use chrono::{DateTime, Utc};
use sg_core::{MemoryStore, Scope, Session, SessionStore, StoreError, UserId};

/// Wraps a [`MemoryStore`] and fails operations for one user, or for everyone
/// when no user is given.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    only: Option<UserId>,
}

impl FailingStore {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn for_user(user: &str) -> Self {
        Self {
            inner: MemoryStore::new(),
            only: Some(UserId::new(user).unwrap()),
        }
    }

    pub const fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self, user_id: Option<&UserId>) -> Result<(), StoreError> {
        match &self.only {
            Some(only) if Some(only) != user_id => Ok(()),
            _ => Err(StoreError::storage("database is locked")),
        }
    }
}

impl SessionStore for FailingStore {
    fn create(&self, session: &Session) -> Result<(), StoreError> {
        self.check(Some(&session.user_id))?;
        self.inner.create(session)
    }

    fn find_open_by_user(&self, user_id: &UserId) -> Result<Option<Session>, StoreError> {
        self.check(Some(user_id))?;
        self.inner.find_open_by_user(user_id)
    }

    fn find_by_scope(&self, scope: &Scope) -> Result<Vec<Session>, StoreError> {
        self.check(scope.user_id.as_ref())?;
        self.inner.find_by_scope(scope)
    }

    fn close_open_by_user(
        &self,
        user_id: &UserId,
        end_time: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.check(Some(user_id))?;
        self.inner.close_open_by_user(user_id, end_time)
    }

    fn close_all_open(&self, end_time: DateTime<Utc>) -> Result<usize, StoreError> {
        self.check(None)?;
        self.inner.close_all_open(end_time)
    }
}
