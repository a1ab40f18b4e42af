//! Closing open sessions on graceful shutdown.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use crate::store::{SessionStore, StoreError};

/// Closes every open session once the event intake has stopped.
///
/// Only the first call to [`finalize`](Self::finalize) touches the store.
/// A store failure is logged and returned; later calls still do nothing, so a
/// failed reconciliation never holds up process exit.
#[derive(Debug)]
pub struct ShutdownReconciler<S> {
    store: S,
    finalized: AtomicBool,
}

impl<S: SessionStore> ShutdownReconciler<S> {
    pub const fn new(store: S) -> Self {
        Self {
            store,
            finalized: AtomicBool::new(false),
        }
    }

    /// Closes all open sessions at the current time.
    ///
    /// Returns `Ok(Some(closed))` on the first call, `Ok(None)` if this
    /// reconciler already ran, and the store error if closing failed.
    pub fn finalize(&self) -> Result<Option<usize>, StoreError> {
        self.finalize_at(Utc::now())
    }

    pub fn finalize_at(&self, now: DateTime<Utc>) -> Result<Option<usize>, StoreError> {
        if self.finalized.swap(true, Ordering::SeqCst) {
            tracing::debug!("shutdown reconciliation already ran");
            return Ok(None);
        }

        match self.store.close_all_open(now) {
            Ok(closed) => {
                tracing::info!(closed, "closed open sessions at shutdown");
                Ok(Some(closed))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to close open sessions at shutdown");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::session::Session;
    use crate::store::MemoryStore;
    use crate::store::failing::FailingStore;
    use crate::types::{ChannelId, GuildId, UserId};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn open(user: &str) -> Session {
        Session::open(
            UserId::new(user).unwrap(),
            GuildId::new("guild").unwrap(),
            ChannelId::new("lobby").unwrap(),
            t0(),
        )
    }

    #[test]
    fn closes_open_sessions_at_shutdown_time() {
        let store = Arc::new(MemoryStore::new());
        store.create(&open("alice")).unwrap();
        store.create(&open("bob")).unwrap();
        let t1 = t0() + Duration::minutes(10);

        let reconciler = ShutdownReconciler::new(Arc::clone(&store));
        assert_eq!(reconciler.finalize_at(t1).unwrap(), Some(2));

        for session in store.all().unwrap() {
            assert_eq!(session.end_time, Some(t1));
        }
    }

    #[test]
    fn second_finalize_is_a_noop() {
        let store = Arc::new(MemoryStore::new());
        store.create(&open("alice")).unwrap();
        let t1 = t0() + Duration::minutes(10);

        let reconciler = ShutdownReconciler::new(Arc::clone(&store));
        reconciler.finalize_at(t1).unwrap();
        assert_eq!(
            reconciler.finalize_at(t1 + Duration::minutes(5)).unwrap(),
            None
        );
        assert_eq!(store.all().unwrap()[0].end_time, Some(t1));
    }

    #[test]
    fn fresh_reconciler_leaves_closed_sessions_alone() {
        let store = Arc::new(MemoryStore::new());
        store.create(&open("alice")).unwrap();
        let t1 = t0() + Duration::minutes(10);

        ShutdownReconciler::new(Arc::clone(&store))
            .finalize_at(t1)
            .unwrap();
        let closed = ShutdownReconciler::new(Arc::clone(&store))
            .finalize_at(t1 + Duration::hours(1))
            .unwrap();

        assert_eq!(closed, Some(0));
        assert_eq!(store.all().unwrap()[0].end_time, Some(t1));
    }

    #[test]
    fn store_failure_is_returned_once() {
        let store = FailingStore::always();
        let t1 = t0() + Duration::minutes(10);

        let reconciler = ShutdownReconciler::new(store);
        let err = reconciler.finalize_at(t1).unwrap_err();
        assert!(matches!(err, StoreError::Storage { .. }));

        // The failed attempt still counts as the one run.
        assert_eq!(reconciler.finalize_at(t1).unwrap(), None);
    }
}
