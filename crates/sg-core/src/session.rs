//! Tracked voice sessions and query scopes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, GuildId, SessionId, UserId};

/// A continuous interval during which a user sat in one voice channel.
///
/// `end_time` is `None` while the user is still present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Session {
    /// Opens a new session starting at `start_time` with a fresh ID.
    pub fn open(
        user_id: UserId,
        guild_id: GuildId,
        channel_id: ChannelId,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            user_id,
            guild_id,
            channel_id,
            start_time,
            end_time: None,
        }
    }

    pub const fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Time spent in the channel, treating an open session as ending at `now`.
    ///
    /// Never negative: a start time in the future (clock skew) counts as zero.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let end = self.end_time.unwrap_or(now);
        (end - self.start_time).max(Duration::zero())
    }
}

/// Filter for session lookups. Channel and user filters are independent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub guild_id: GuildId,
    pub channel_id: Option<ChannelId>,
    pub user_id: Option<UserId>,
}

impl Scope {
    /// All sessions in a guild.
    pub const fn guild(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            channel_id: None,
            user_id: None,
        }
    }

    #[must_use]
    pub fn with_channel(mut self, channel_id: Option<ChannelId>) -> Self {
        self.channel_id = channel_id;
        self
    }

    #[must_use]
    pub fn with_user(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Returns true if the session falls inside this scope.
    pub fn matches(&self, session: &Session) -> bool {
        session.guild_id == self.guild_id
            && self
                .channel_id
                .as_ref()
                .is_none_or(|channel| *channel == session.channel_id)
            && self
                .user_id
                .as_ref()
                .is_none_or(|user| *user == session.user_id)
    }
}
