//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sg_core::{ChannelId, GuildId, UserId};

/// Voice channel time tracker.
///
/// Records how long each user spends in voice channels from a stream of
/// presence events and answers leaderboard queries over the totals.
#[derive(Debug, Parser)]
#[command(name = "seraglio", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Track presence events read as JSON lines from stdin.
    ///
    /// Runs until interrupted or the input ends, then closes every open session.
    Run,

    /// Rank users by time spent in voice.
    Leaderboard {
        /// Guild to rank.
        #[arg(long)]
        guild: GuildId,

        /// Only count time in this channel.
        #[arg(long)]
        channel: Option<ChannelId>,

        /// Mark the reply as visible only to the requester.
        #[arg(long)]
        ephemeral: bool,

        /// Output the reply as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show how long one user has spent in voice.
    Total {
        /// Guild to search.
        #[arg(long)]
        guild: GuildId,

        /// User to total.
        #[arg(long)]
        user: Option<UserId>,

        /// Only count time in this channel.
        #[arg(long)]
        channel: Option<ChannelId>,

        /// Mark the reply as visible only to the requester.
        #[arg(long)]
        ephemeral: bool,

        /// Output the reply as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Close sessions left open by a crashed tracker.
    CloseOpen,
}
