//! Seraglio CLI library.
//!
//! This crate provides the intake daemon and query commands.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
