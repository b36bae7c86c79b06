//! Async control loop driving ingestion and card scheduling.
//!
//! [`run_overlay`] is a single cooperative task multiplexing:
//!
//! - **Ingest interval** (~1 s): spawns a fetch task tagged with a sequence
//!   number. Fetches never block the loop.
//! - **Fetch completions**: responses older than the newest applied one are
//!   discarded; the rest run through [`run_tick`].
//! - **Scheduler interval** (~250 ms): advances card and banner deadlines.
//! - **Toggle changes**: applied synchronously, purging disabled cards.
//! - **Shutdown**: any future; the loop stops as soon as it resolves.
//!
//! The view is republished on a `watch` channel after every tick, poll,
//! and toggle change.
//!
//! [`run_tick`]: crate::tick::run_tick

use std::future::Future;
use std::sync::Arc;

use racecast_types::OverlayView;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{FeatureToggles, TimingConfig};
use crate::source::{FetchSequencer, SnapshotSource, SourceError};
use crate::tick::{self, OverlaySession};

/// Counters describing a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ingest ticks applied.
    pub ticks: u64,
    /// Scheduler polls run.
    pub polls: u64,
    /// Fetch responses discarded as out of order.
    pub stale_responses: u64,
    /// Fetches that failed.
    pub fetch_failures: u64,
}

type FetchResult = (u64, Result<serde_json::Value, SourceError>);

/// Run the overlay until `shutdown` resolves.
pub async fn run_overlay<S, F>(
    session: &mut OverlaySession,
    source: Arc<S>,
    timing: &TimingConfig,
    mut toggles: watch::Receiver<FeatureToggles>,
    view_tx: &watch::Sender<OverlayView>,
    shutdown: F,
) -> RunSummary
where
    S: SnapshotSource,
    F: Future<Output = ()>,
{
    let mut summary = RunSummary::default();
    let mut sequencer = FetchSequencer::new();
    let (fetch_tx, mut fetch_rx) = mpsc::unbounded_channel::<FetchResult>();

    let mut ingest_interval = tokio::time::interval(Duration::from_millis(timing.ingest_poll_ms.max(1)));
    ingest_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut poll_interval =
        tokio::time::interval(Duration::from_millis(timing.scheduler_poll_ms.max(1)));
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    session.set_toggles(*toggles.borrow_and_update());
    view_tx.send_replace(session.view());
    let mut toggles_open = true;

    info!(
        ingest_poll_ms = timing.ingest_poll_ms,
        scheduler_poll_ms = timing.scheduler_poll_ms,
        "Overlay starting"
    );

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }

            _ = ingest_interval.tick() => {
                let seq = sequencer.issue();
                let source = Arc::clone(&source);
                let tx = fetch_tx.clone();
                tokio::spawn(async move {
                    let result = source.fetch().await;
                    // The loop may have stopped; a closed channel is fine.
                    let _ = tx.send((seq, result));
                });
            }

            Some((seq, result)) = fetch_rx.recv() => {
                if sequencer.is_stale(seq) {
                    debug!(seq, last_applied = ?sequencer.last_applied(), "discarding stale snapshot response");
                    summary.stale_responses = summary.stale_responses.saturating_add(1);
                } else {
                    match result {
                        Ok(raw) => {
                            sequencer.mark_applied(seq);
                            tick::run_tick(session, &raw);
                            summary.ticks = summary.ticks.saturating_add(1);
                            view_tx.send_replace(session.view());
                        }
                        Err(e) => {
                            warn!(seq, error = %e, "snapshot fetch failed");
                            summary.fetch_failures = summary.fetch_failures.saturating_add(1);
                        }
                    }
                }
            }

            _ = poll_interval.tick() => {
                session.poll();
                summary.polls = summary.polls.saturating_add(1);
                view_tx.send_replace(session.view());
            }

            changed = toggles.changed(), if toggles_open => {
                if changed.is_ok() {
                    session.set_toggles(*toggles.borrow_and_update());
                    view_tx.send_replace(session.view());
                } else {
                    debug!("toggle channel closed, keeping current toggles");
                    toggles_open = false;
                }
            }
        }
    }

    info!(
        ticks = summary.ticks,
        polls = summary.polls,
        stale_responses = summary.stale_responses,
        fetch_failures = summary.fetch_failures,
        "Overlay stopped"
    );
    summary
}
