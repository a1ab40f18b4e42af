//! CLI subcommand implementations.

pub mod close_open;
pub mod query;
pub mod run;

#[cfg(test)]
mod failing_store;
