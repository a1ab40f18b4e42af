//! Time-in-voice aggregation.
//!
//! Totals are computed from raw sessions on every query. Open sessions count
//! up to the query instant, so repeated queries against a user who is still in
//! voice return non-decreasing totals.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::session::{Scope, Session};
use crate::store::{SessionStore, StoreError};
use crate::types::{ChannelId, GuildId, UserId};

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ranking {
    pub user_id: UserId,
    #[serde(rename = "total_seconds", serialize_with = "serialize_seconds")]
    pub total: Duration,
}

fn serialize_seconds<S>(total: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_i64(total.num_seconds())
}

/// Sums per-user totals in first-seen order.
///
/// Returns rows sorted by total, longest first. The sort is stable, so users
/// with equal totals keep the order in which their first session started.
pub fn rank_sessions(sessions: &[Session], now: DateTime<Utc>) -> Vec<Ranking> {
    let mut index: HashMap<&UserId, usize> = HashMap::new();
    let mut rankings: Vec<Ranking> = Vec::new();

    for session in sessions {
        let elapsed = session.elapsed(now);
        if let Some(&i) = index.get(&session.user_id) {
            rankings[i].total += elapsed;
        } else {
            index.insert(&session.user_id, rankings.len());
            rankings.push(Ranking {
                user_id: session.user_id.clone(),
                total: elapsed,
            });
        }
    }

    rankings.sort_by(|a, b| b.total.cmp(&a.total));
    rankings
}

/// Sums the elapsed time of every session.
pub fn total_duration(sessions: &[Session], now: DateTime<Utc>) -> Duration {
    sessions
        .iter()
        .fold(Duration::zero(), |acc, s| acc + s.elapsed(now))
}

/// Answers leaderboard and per-user queries from a [`SessionStore`].
#[derive(Debug)]
pub struct Aggregator<S> {
    store: S,
}

impl<S: SessionStore> Aggregator<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Ranks users in a guild, optionally limited to one channel.
    pub fn leaderboard(
        &self,
        guild_id: &GuildId,
        channel_id: Option<&ChannelId>,
    ) -> Result<Vec<Ranking>, StoreError> {
        self.leaderboard_at(guild_id, channel_id, Utc::now())
    }

    pub fn leaderboard_at(
        &self,
        guild_id: &GuildId,
        channel_id: Option<&ChannelId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Ranking>, StoreError> {
        let scope = Scope::guild(guild_id.clone()).with_channel(channel_id.cloned());
        let sessions = self.store.find_by_scope(&scope)?;
        tracing::debug!(
            guild_id = %guild_id,
            session_count = sessions.len(),
            "loaded sessions for leaderboard"
        );
        Ok(rank_sessions(&sessions, now))
    }

    /// Total time a user spent in voice in a guild, optionally in one channel.
    pub fn user_total(
        &self,
        user_id: &UserId,
        guild_id: &GuildId,
        channel_id: Option<&ChannelId>,
    ) -> Result<Duration, StoreError> {
        self.user_total_at(user_id, guild_id, channel_id, Utc::now())
    }

    pub fn user_total_at(
        &self,
        user_id: &UserId,
        guild_id: &GuildId,
        channel_id: Option<&ChannelId>,
        now: DateTime<Utc>,
    ) -> Result<Duration, StoreError> {
        let scope = Scope::guild(guild_id.clone())
            .with_channel(channel_id.cloned())
            .with_user(Some(user_id.clone()));
        let sessions = self.store.find_by_scope(&scope)?;
        Ok(total_duration(&sessions, now))
    }
}
