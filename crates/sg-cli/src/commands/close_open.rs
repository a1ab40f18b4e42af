//! Manual shutdown reconciliation.
//!
//! Closes sessions left open when a previous `seraglio run` exited without
//! reconciling (crash, `kill -9`). Run it before restarting the tracker.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sg_core::{SessionStore, ShutdownReconciler};

pub fn run<S: SessionStore, W: Write>(writer: &mut W, store: S, now: DateTime<Utc>) -> Result<()> {
    // A fresh reconciler always runs, so `None` never comes back here.
    let closed = ShutdownReconciler::new(store)
        .finalize_at(now)
        .context("failed to close open sessions")?
        .unwrap_or_default();
    writeln!(writer, "Closed {closed} open session(s).")?;
    Ok(())
}
