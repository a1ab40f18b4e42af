//! Presence events delivered by the voice gateway.
//!
//! Events arrive as newline-delimited JSON tagged by `type`:
//!
//! ```json
//! {"type":"snapshot","guild_id":"g","entries":[{"user_id":"u","channel_id":"c"}]}
//! {"type":"entered","user_id":"u","guild_id":"g","channel_id":"c"}
//! {"type":"left","user_id":"u","guild_id":"g"}
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, GuildId, UserId};

/// One user already present in a voice channel when a guild comes online.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub user_id: UserId,
    pub channel_id: ChannelId,
}

/// A presence change observed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceEvent {
    /// Everyone currently in voice, sent when the guild becomes available.
    Snapshot {
        guild_id: GuildId,
        #[serde(default)]
        entries: Vec<SnapshotEntry>,
    },
    /// A user joined a voice channel.
    Entered {
        user_id: UserId,
        guild_id: GuildId,
        channel_id: ChannelId,
    },
    /// A user disconnected from voice.
    Left { user_id: UserId, guild_id: GuildId },
}

impl PresenceEvent {
    pub const fn guild_id(&self) -> &GuildId {
        match self {
            Self::Snapshot { guild_id, .. }
            | Self::Entered { guild_id, .. }
            | Self::Left { guild_id, .. } => guild_id,
        }
    }

    /// Short name used in log fields.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => "snapshot",
            Self::Entered { .. } => "entered",
            Self::Left { .. } => "left",
        }
    }
}
