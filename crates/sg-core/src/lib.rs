//! Core domain logic for seraglio, a voice channel time tracker.
//!
//! This crate contains:
//! - Session tracking: turning presence events into open/closed sessions
//! - Aggregation: per-user totals and leaderboards
//! - Formatting and command replies for the chat front end
//! - Shutdown reconciliation: closing sessions left open at exit

pub mod aggregate;
pub mod command;
pub mod event;
mod format;
pub mod session;
mod shutdown;
pub mod store;
mod tracker;
pub mod types;

pub use aggregate::{Aggregator, Ranking};
pub use command::{Command, CommandError, CommandRequest, Reply, Visibility, respond, respond_at};
pub use event::{PresenceEvent, SnapshotEntry};
pub use format::format_duration;
pub use session::{Scope, Session};
pub use shutdown::ShutdownReconciler;
pub use store::{MemoryStore, SessionStore, StoreError};
pub use tracker::{Outcome, Tracker};
pub use types::{ChannelId, GuildId, SessionId, UserId, ValidationError};
