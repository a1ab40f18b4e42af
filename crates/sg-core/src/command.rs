//! Command requests and rendered replies.
//!
//! The chat front end parses slash commands into [`CommandRequest`] values and
//! posts the returned [`Reply`]. Failures come back as replies too: storage
//! errors are rendered for the requester and logged, validation problems are
//! only rendered.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::{Aggregator, Ranking};
use crate::format::format_duration;
use crate::store::{SessionStore, StoreError};
use crate::types::{ChannelId, GuildId, UserId, ValidationError};

const LEADERBOARD_TITLE: &str = "Leaderboard";
const LEADERBOARD_HEADING: &str = "Time Spent in VC";
const EMPTY_LEADERBOARD: &str = "No voice activity recorded yet.";

/// Errors raised while answering a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Who can see a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    /// Only the user who ran the command.
    Ephemeral,
}

impl Visibility {
    pub const fn from_ephemeral(ephemeral: bool) -> Self {
        if ephemeral {
            Self::Ephemeral
        } else {
            Self::Public
        }
    }
}

/// The query a user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Command {
    Leaderboard {
        #[serde(default)]
        channel_id: Option<ChannelId>,
    },
    UserTotal {
        #[serde(default)]
        user_id: Option<UserId>,
        #[serde(default)]
        channel_id: Option<ChannelId>,
    },
}

/// A command issued from a guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub guild_id: GuildId,
    #[serde(flatten)]
    pub command: Command,
    #[serde(default)]
    pub ephemeral: bool,
}

/// Rendered response to a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    pub visibility: Visibility,
}

/// Answers a command at the current time.
pub fn respond<S: SessionStore>(aggregator: &Aggregator<S>, request: &CommandRequest) -> Reply {
    respond_at(aggregator, request, Utc::now())
}

pub fn respond_at<S: SessionStore>(
    aggregator: &Aggregator<S>,
    request: &CommandRequest,
    now: DateTime<Utc>,
) -> Reply {
    let visibility = Visibility::from_ephemeral(request.ephemeral);
    let (title, result) = match &request.command {
        Command::Leaderboard { channel_id } => (
            Some(LEADERBOARD_TITLE.to_string()),
            aggregator
                .leaderboard_at(&request.guild_id, channel_id.as_ref(), now)
                .map(|rankings| render_leaderboard(&rankings))
                .map_err(CommandError::from),
        ),
        Command::UserTotal {
            user_id,
            channel_id,
        } => (
            None,
            user_total(aggregator, &request.guild_id, user_id.as_ref(), channel_id.as_ref(), now),
        ),
    };

    match result {
        Ok(content) => Reply {
            title,
            content,
            visibility,
        },
        Err(e) => Reply {
            title: None,
            content: render_error(&request.command, &e),
            visibility,
        },
    }
}

fn user_total<S: SessionStore>(
    aggregator: &Aggregator<S>,
    guild_id: &GuildId,
    user_id: Option<&UserId>,
    channel_id: Option<&ChannelId>,
    now: DateTime<Utc>,
) -> Result<String, CommandError> {
    let user_id = user_id.ok_or(ValidationError::MissingField { field: "user" })?;
    let total = aggregator.user_total_at(user_id, guild_id, channel_id, now)?;
    let place = channel_id.map_or_else(
        || "voice channels".to_string(),
        |channel| format!("<#{channel}>"),
    );
    Ok(format!(
        "<@{user_id}> has spent {} in {place}",
        format_duration(total)
    ))
}

/// Renders ranked totals as numbered mention lines.
pub fn render_leaderboard(rankings: &[Ranking]) -> String {
    if rankings.is_empty() {
        return format!("**{LEADERBOARD_HEADING}**\n{EMPTY_LEADERBOARD}");
    }

    let mut out = format!("**{LEADERBOARD_HEADING}**\n");
    for (n, ranking) in rankings.iter().enumerate() {
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "**{}.** <@{}>: {}",
            n + 1,
            ranking.user_id,
            format_duration(ranking.total)
        );
    }
    out.truncate(out.trim_end().len());
    out
}

fn render_error(command: &Command, error: &CommandError) -> String {
    match error {
        CommandError::Validation(e) => {
            tracing::debug!(error = %e, "rejected command request");
            format!("Invalid request: {e}")
        }
        CommandError::Store(e) => {
            tracing::warn!(error = %e, "command query failed");
            match command {
                Command::Leaderboard { .. } => format!("Error fetching leaderboard: {e}"),
                Command::UserTotal { .. } => format!("Error fetching total: {e}"),
            }
        }
    }
}
