//! Session lifecycle tracking.
//!
//! The tracker turns presence events into session records. Each user is either
//! absent (no open session) or present (exactly one open session):
//!
//! - `snapshot` and `entered` open a session for absent users and do nothing
//!   for present ones, so replays and duplicate deliveries are harmless.
//! - `left` closes the user's open session; for absent users it does nothing.
//!
//! Storage failures are logged and the event is dropped. The gateway re-sends
//! a snapshot whenever a guild becomes available again, which repairs state.

use chrono::{DateTime, Utc};

use crate::event::{PresenceEvent, SnapshotEntry};
use crate::session::Session;
use crate::store::{SessionStore, StoreError};
use crate::types::{ChannelId, GuildId, UserId};

/// What handling an event did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A new session was opened.
    Opened,
    /// The user already had an open session.
    AlreadyPresent,
    /// The user's open session was closed.
    Closed(usize),
    /// `left` for a user with no open session.
    NotPresent,
    /// A snapshot was reconciled against the store. `failed` counts entries
    /// skipped because the store failed for that user.
    Reconciled {
        opened: usize,
        already_present: usize,
        failed: usize,
    },
    /// The event was dropped because the store failed.
    Dropped,
}

/// Applies presence events to a [`SessionStore`].
#[derive(Debug)]
pub struct Tracker<S> {
    store: S,
}

impl<S: SessionStore> Tracker<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Handles an event at the current time.
    pub fn handle(&self, event: &PresenceEvent) -> Outcome {
        self.handle_at(event, Utc::now())
    }

    /// Handles an event as if it arrived at `now`.
    pub fn handle_at(&self, event: &PresenceEvent, now: DateTime<Utc>) -> Outcome {
        let result = match event {
            PresenceEvent::Snapshot { guild_id, entries } => {
                Ok(self.reconcile_snapshot(guild_id, entries, now))
            }
            PresenceEvent::Entered {
                user_id,
                guild_id,
                channel_id,
            } => self.enter(user_id, guild_id, channel_id, now),
            PresenceEvent::Left { user_id, .. } => self.leave(user_id, now),
        };

        match result {
            Ok(outcome) => {
                tracing::debug!(
                    kind = event.kind(),
                    guild_id = %event.guild_id(),
                    ?outcome,
                    "presence event handled"
                );
                outcome
            }
            Err(e) => {
                tracing::warn!(
                    kind = event.kind(),
                    guild_id = %event.guild_id(),
                    error = %e,
                    "dropping presence event"
                );
                Outcome::Dropped
            }
        }
    }

    fn enter(
        &self,
        user_id: &UserId,
        guild_id: &GuildId,
        channel_id: &ChannelId,
        now: DateTime<Utc>,
    ) -> Result<Outcome, StoreError> {
        if let Some(existing) = self.store.find_open_by_user(user_id)? {
            if existing.channel_id != *channel_id {
                tracing::trace!(
                    user_id = %user_id,
                    from = %existing.channel_id,
                    to = %channel_id,
                    "channel switch keeps the original session"
                );
            }
            return Ok(Outcome::AlreadyPresent);
        }

        let session = Session::open(user_id.clone(), guild_id.clone(), channel_id.clone(), now);
        match self.store.create(&session) {
            Ok(()) => {
                tracing::debug!(user_id = %user_id, session_id = %session.id, "session opened");
                Ok(Outcome::Opened)
            }
            // Lost a race with a concurrent enter for the same user.
            Err(StoreError::OpenSessionExists { .. }) => Ok(Outcome::AlreadyPresent),
            Err(e) => Err(e),
        }
    }

    fn leave(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Outcome, StoreError> {
        let closed = self.store.close_open_by_user(user_id, now)?;
        if closed == 0 {
            return Ok(Outcome::NotPresent);
        }
        if closed > 1 {
            tracing::warn!(user_id = %user_id, closed, "closed more than one open session");
        }
        Ok(Outcome::Closed(closed))
    }

    /// Opens sessions for snapshot entries that are not already tracked.
    ///
    /// A failing entry is logged and skipped; the rest of the snapshot still applies.
    fn reconcile_snapshot(
        &self,
        guild_id: &GuildId,
        entries: &[SnapshotEntry],
        now: DateTime<Utc>,
    ) -> Outcome {
        let mut opened = 0;
        let mut already_present = 0;
        let mut failed = 0;
        for entry in entries {
            match self.enter(&entry.user_id, guild_id, &entry.channel_id, now) {
                Ok(Outcome::Opened) => opened += 1,
                Ok(_) => already_present += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        user_id = %entry.user_id,
                        guild_id = %guild_id,
                        error = %e,
                        "skipping snapshot entry"
                    );
                }
            }
        }
        Outcome::Reconciled {
            opened,
            already_present,
            failed,
        }
    }
}
