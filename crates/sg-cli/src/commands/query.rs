//! Leaderboard and per-user total commands.
//!
//! Both build a [`CommandRequest`], answer it through the aggregator and print
//! the rendered [`Reply`], either as text or as JSON (`--json`).

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sg_core::{
    Aggregator, ChannelId, Command, CommandRequest, GuildId, Reply, SessionStore, UserId,
    respond_at,
};

/// Prints a reply as plain text: the title (if any) on its own line, then the content.
pub fn write_reply<W: Write>(writer: &mut W, reply: &Reply, json: bool) -> Result<()> {
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(reply)?)?;
        return Ok(());
    }
    if let Some(title) = &reply.title {
        writeln!(writer, "{title}")?;
    }
    writeln!(writer, "{}", reply.content)?;
    Ok(())
}

/// Options shared by the query subcommands.
#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub ephemeral: bool,
    pub json: bool,
}

pub fn leaderboard<S: SessionStore, W: Write>(
    writer: &mut W,
    store: S,
    guild_id: GuildId,
    channel_id: Option<ChannelId>,
    options: OutputOptions,
    now: DateTime<Utc>,
) -> Result<()> {
    let request = CommandRequest {
        guild_id,
        command: Command::Leaderboard { channel_id },
        ephemeral: options.ephemeral,
    };
    let reply = respond_at(&Aggregator::new(store), &request, now);
    write_reply(writer, &reply, options.json)
}

pub fn total<S: SessionStore, W: Write>(
    writer: &mut W,
    store: S,
    guild_id: GuildId,
    user_id: Option<UserId>,
    channel_id: Option<ChannelId>,
    options: OutputOptions,
    now: DateTime<Utc>,
) -> Result<()> {
    let request = CommandRequest {
        guild_id,
        command: Command::UserTotal {
            user_id,
            channel_id,
        },
        ephemeral: options.ephemeral,
    };
    let reply = respond_at(&Aggregator::new(store), &request, now);
    write_reply(writer, &reply, options.json)
}
