//! Presence event intake.
//!
//! `seraglio run` reads newline-delimited [`PresenceEvent`] JSON from stdin and
//! feeds it to the tracker one event at a time, preserving arrival order.
//! Intake stops on SIGINT/SIGTERM or when the input ends; the in-flight event
//! finishes first and then every open session is closed exactly once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sg_core::{Outcome, PresenceEvent, SessionStore, ShutdownReconciler, Tracker};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// How long to wait for the blocking stdin reader when the runtime shuts down.
const STDIN_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Counters reported when intake stops.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IntakeStats {
    /// Events parsed and handed to the tracker.
    pub events: usize,
    /// Lines that were not valid presence events.
    pub malformed: usize,
    /// Events dropped because the store failed.
    pub dropped: usize,
    /// Snapshot entries skipped because the store failed for that user. A
    /// snapshot is one event, so these never add to `dropped`.
    pub skipped_entries: usize,
    /// Sessions closed by shutdown reconciliation, or `None` if it failed.
    pub closed_at_shutdown: Option<usize>,
}

/// Runs the intake loop on stdin until a shutdown signal or end of input.
pub fn run<S: SessionStore + 'static>(store: Arc<S>) -> Result<IntakeStats> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let stats = runtime.block_on(async {
        let stdin = BufReader::new(tokio::io::stdin());
        intake(stdin, store, shutdown_signal()).await
    });

    // A pending stdin read never finishes on its own after a signal.
    runtime.shutdown_timeout(STDIN_SHUTDOWN_GRACE);
    stats
}

/// Feeds events from `reader` to a tracker until `shutdown` resolves or the
/// reader is exhausted, then reconciles open sessions.
pub async fn intake<R, S, F>(reader: R, store: Arc<S>, shutdown: F) -> Result<IntakeStats>
where
    R: AsyncBufRead + Unpin,
    S: SessionStore + 'static,
    F: Future<Output = ()>,
{
    let tracker = Arc::new(Tracker::new(Arc::clone(&store)));
    let mut lines = reader.lines();
    let mut stats = IntakeStats::default();
    tokio::pin!(shutdown);

    tracing::info!("tracking presence events");
    loop {
        let line = tokio::select! {
            () = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!("presence stream closed");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to read presence stream");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: PresenceEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed presence event");
                stats.malformed += 1;
                continue;
            }
        };

        stats.events += 1;
        let tracker = Arc::clone(&tracker);
        let outcome = tokio::task::spawn_blocking(move || tracker.handle(&event))
            .await
            .context("presence event handler panicked")?;
        match outcome {
            Outcome::Dropped => stats.dropped += 1,
            Outcome::Reconciled { failed, .. } => stats.skipped_entries += failed,
            _ => {}
        }
    }

    // A failed reconciliation is already logged; exit goes ahead regardless.
    let reconciler = ShutdownReconciler::new(store);
    stats.closed_at_shutdown = tokio::task::spawn_blocking(move || reconciler.finalize())
        .await
        .context("shutdown reconciliation panicked")?
        .ok()
        .flatten();

    tracing::info!(
        events = stats.events,
        malformed = stats.malformed,
        dropped = stats.dropped,
        skipped_entries = stats.skipped_entries,
        "intake stopped"
    );
    Ok(stats)
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
