//! Tick cycle: one raw feed payload through the whole pipeline.
//!
//! Each ingest tick runs these phases in order:
//!
//! 1. **Ingest** -- coerce the raw JSON into a normalized [`Snapshot`].
//!
//! 2. **Reconcile** -- accept, hold, or reset canonical state, and apply
//!    lap-counter hysteresis.
//!
//! 3. **Session boundary** -- on a reset, forget derivation trackers and
//!    drop every card. While the finish flag is asserted, drop every card
//!    and skip derivation.
//!
//! 4. **Derive** -- diff previous against canonical rows for at most one
//!    position, one fastest-lap, and one lap-finish event.
//!
//! 5. **Enqueue** -- hand the events to the scheduler. Disabled kinds are
//!    dropped here.
//!
//! 6. **Banner** -- feed the race flag to the banner state machine.
//!
//! Scheduler polls run separately, on their own cadence, via
//! [`OverlaySession::poll`].
//!
//! [`Snapshot`]: racecast_types::Snapshot

use std::sync::Arc;

use chrono::Utc;
use racecast_types::{DerivedEvent, OverlayView, ReconcileOutcome};
use tracing::{debug, info};

use crate::banner::BannerState;
use crate::cache::SnapshotCache;
use crate::clock::Clock;
use crate::config::{FeatureToggles, OverlayConfig};
use crate::derive::{self, DeriverState};
use crate::ingest;
use crate::reconcile::{LapCounter, Reconciler};
use crate::scheduler::{PollReport, Scheduler};

/// Summary of a single tick's execution.
#[derive(Debug, Clone)]
pub struct TickSummary {
    /// The tick number that was executed, starting at 1.
    pub tick: u64,
    /// What the reconciler decided.
    pub outcome: ReconcileOutcome,
    /// Canonical row count after the tick.
    pub rows: usize,
    /// Events derived this tick, in derivation order.
    pub events: Vec<DerivedEvent>,
    /// How many of those events were queued as cards.
    pub enqueued: u32,
    /// Whether the session finish flag is asserted.
    pub finished: bool,
    /// Whether the banner changed.
    pub banner_changed: bool,
}

/// Per-overlay state threaded through every tick and poll.
pub struct OverlaySession {
    clock: Arc<dyn Clock>,
    reconciler: Reconciler,
    deriver: DeriverState,
    scheduler: Scheduler,
    banner: BannerState,
    cache: Box<dyn SnapshotCache>,
    toggles: FeatureToggles,
    lap_counter: LapCounter,
    finished: bool,
    ticks: u64,
}

impl core::fmt::Debug for OverlaySession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OverlaySession")
            .field("ticks", &self.ticks)
            .field("toggles", &self.toggles)
            .field("lap_counter", &self.lap_counter)
            .field("finished", &self.finished)
            .field("queued", &self.scheduler.queued_len())
            .finish_non_exhaustive()
    }
}

impl OverlaySession {
    /// Build a session from configuration.
    pub fn new(
        config: &OverlayConfig,
        clock: Arc<dyn Clock>,
        cache: Box<dyn SnapshotCache>,
    ) -> Self {
        Self {
            clock,
            reconciler: Reconciler::new(&config.reconcile),
            deriver: DeriverState::new(),
            scheduler: Scheduler::new(config.cards, config.features),
            banner: BannerState::new(config.banner.green_visible_ms),
            cache,
            toggles: config.features,
            lap_counter: LapCounter::default(),
            finished: false,
            ticks: 0,
        }
    }

    /// Number of ingest ticks run so far.
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Current feature toggles.
    pub const fn toggles(&self) -> FeatureToggles {
        self.toggles
    }

    /// The card scheduler.
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Whether the session finish flag is asserted.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advance card and banner deadlines to the current time.
    pub fn poll(&mut self) -> PollReport {
        let now = self.clock.now_ms();
        self.banner.expire(now);
        self.scheduler.poll(now)
    }

    /// Apply new feature toggles. Newly disabled card kinds are purged at
    /// once, queued and active alike.
    pub fn set_toggles(&mut self, toggles: FeatureToggles) {
        if toggles != self.toggles {
            info!(?toggles, "feature toggles changed");
        }
        self.toggles = toggles;
        self.scheduler.set_toggles(toggles);
    }

    /// The read-only view for the rendering layer.
    pub fn view(&self) -> OverlayView {
        let now = self.clock.now_ms();
        let mut view = OverlayView::blank(Utc::now());

        if let Some(canonical) = self.reconciler.canonical() {
            view.session_name.clone_from(&canonical.session_name);
            view.rows.clone_from(&canonical.rows);
            view.announcements.clone_from(&canonical.announcements);
        }
        view.lap_label = self.lap_counter.label();
        view.finished = self.finished;
        view.queued = u32::try_from(self.scheduler.queued_len()).unwrap_or(u32::MAX);

        if self.toggles.overlay {
            view.active_card = self.scheduler.card_view(now);
        }
        if self.toggles.allows_banners() {
            view.banner = self.banner.view(now);
        }
        view
    }
}

/// Run one ingest tick for a raw feed payload.
///
/// Never fails: malformed payloads degrade to empty snapshots, which the
/// reconciler holds or resets on.
pub fn run_tick(session: &mut OverlaySession, raw: &serde_json::Value) -> TickSummary {
    session.ticks = session.ticks.saturating_add(1);
    let now = session.clock.now_ms();

    // --- Phase 1: Ingest ---
    let snapshot = ingest::normalize_snapshot(raw, Utc::now());

    // --- Phase 2: Reconcile ---
    let reconciliation = session.reconciler.reconcile(snapshot, session.cache.as_mut());
    session.lap_counter = reconciliation.lap_counter;

    // --- Phase 3: Session boundary ---
    if reconciliation.outcome == ReconcileOutcome::Reset {
        session.deriver.reset();
        session.scheduler.clear();
    }
    let finished = reconciliation.current.flag_finish;
    if finished && !session.finished {
        info!(session = %reconciliation.current.session_name, "session finished, halting events");
    }
    session.finished = finished;

    // --- Phase 4: Derive ---
    let events = if finished {
        session.scheduler.clear();
        Vec::new()
    } else {
        derive::derive_events(
            &reconciliation.previous.rows,
            &reconciliation.current.rows,
            &mut session.deriver,
        )
    };

    // --- Phase 5: Enqueue ---
    let mut enqueued: u32 = 0;
    for event in &events {
        if session.scheduler.enqueue(event.clone()).is_some() {
            enqueued = enqueued.saturating_add(1);
        }
    }

    // --- Phase 6: Banner ---
    let banner_changed = session.banner.update(&reconciliation.current.race_flag, now);

    let summary = TickSummary {
        tick: session.ticks,
        outcome: reconciliation.outcome,
        rows: reconciliation.current.rows.len(),
        events,
        enqueued,
        finished,
        banner_changed,
    };

    debug!(
        tick = summary.tick,
        outcome = ?summary.outcome,
        rows = summary.rows,
        events = summary.events.len(),
        enqueued = summary.enqueued,
        lap = %session.lap_counter.label(),
        "tick complete"
    );

    summary
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use racecast_types::CardKind;
    use serde_json::{Value, json};

    use super::*;
    use crate::cache::MemoryCache;
    use crate::clock::ManualClock;

    fn session_with_clock() -> (OverlaySession, ManualClock) {
        let clock = ManualClock::new(0);
        let session = OverlaySession::new(
            &OverlayConfig::default(),
            Arc::new(clock.clone()),
            Box::new(MemoryCache::new()),
        );
        (session, clock)
    }

    fn feed(session_name: &str, rows: &[(&str, &str, u32)]) -> Value {
        let standings: Vec<Value> = rows
            .iter()
            .map(|(number, name, position)| {
                json!({"number": number, "name": name, "position": position})
            })
            .collect();
        json!({"standings": standings, "sessionName": session_name, "raceFlag": "GREEN"})
    }

    #[test]
    fn position_change_becomes_a_card() {
        let (mut session, clock) = session_with_clock();
        run_tick(&mut session, &feed("Race 1", &[("1", "Alpha", 1), ("7", "Smith", 2)]));
        let summary = run_tick(&mut session, &feed("Race 1", &[("7", "Smith", 1), ("1", "Alpha", 2)]));
        assert_eq!(summary.outcome, ReconcileOutcome::Accepted);
        assert_eq!(summary.enqueued, 1);

        clock.advance(250);
        session.poll();
        let view = session.view();
        let card = view.active_card.unwrap();
        assert_eq!(card.kind, CardKind::Position);
        assert_eq!(card.value, "P1");
        assert_eq!(view.rows.len(), 2);
    }

    #[test]
    fn identical_payload_twice_derives_nothing() {
        let (mut session, _clock) = session_with_clock();
        let first = feed("Race 1", &[("1", "Alpha", 1), ("7", "Smith", 2)]);
        let second = feed("Race 1", &[("7", "Smith", 1), ("1", "Alpha", 2)]);
        run_tick(&mut session, &first);
        run_tick(&mut session, &second);
        assert!(run_tick(&mut session, &second).events.is_empty());
    }

    #[test]
    fn reset_clears_cards_and_rows() {
        let (mut session, clock) = session_with_clock();
        run_tick(&mut session, &feed("Race 1", &[("1", "Alpha", 1), ("7", "Smith", 2)]));
        run_tick(&mut session, &feed("Race 1", &[("7", "Smith", 1), ("1", "Alpha", 2)]));
        clock.advance(250);
        session.poll();
        assert!(session.scheduler().active().is_some());

        let summary = run_tick(&mut session, &json!({"standings": [], "sessionName": "Qualifying"}));
        assert_eq!(summary.outcome, ReconcileOutcome::Reset);
        assert!(session.scheduler().active().is_none());
        assert!(session.view().rows.is_empty());
    }

    #[test]
    fn finish_flag_halts_derivation() {
        let (mut session, clock) = session_with_clock();
        run_tick(&mut session, &feed("Race 1", &[("1", "Alpha", 1), ("7", "Smith", 2)]));
        let mut finished = feed("Race 1", &[("7", "Smith", 1), ("1", "Alpha", 2)]);
        finished["flagFinish"] = json!(true);
        let summary = run_tick(&mut session, &finished);
        assert!(summary.finished);
        assert!(summary.events.is_empty());

        clock.advance(250);
        session.poll();
        let view = session.view();
        assert!(view.finished);
        assert!(view.active_card.is_none());
    }

    #[test]
    fn transient_empty_snapshot_keeps_rows() {
        let (mut session, _clock) = session_with_clock();
        run_tick(&mut session, &feed("Race 1", &[("1", "Alpha", 1)]));
        let summary = run_tick(&mut session, &json!({"standings": [], "sessionName": "Race 1"}));
        assert_eq!(summary.outcome, ReconcileOutcome::Held);
        assert_eq!(session.view().rows.len(), 1);
    }

    #[test]
    fn green_banner_expires() {
        let (mut session, clock) = session_with_clock();
        let summary = run_tick(&mut session, &feed("Race 1", &[("1", "Alpha", 1)]));
        assert!(summary.banner_changed);
        assert_eq!(session.view().banner.unwrap().title, "GREEN FLAG");

        clock.advance(5_000);
        session.poll();
        assert!(session.view().banner.is_none());
    }

    #[test]
    fn overlay_toggle_hides_cards_and_banners() {
        let (mut session, clock) = session_with_clock();
        run_tick(&mut session, &feed("Race 1", &[("1", "Alpha", 1), ("7", "Smith", 2)]));
        run_tick(&mut session, &feed("Race 1", &[("7", "Smith", 1), ("1", "Alpha", 2)]));
        clock.advance(250);
        session.poll();

        session.set_toggles(FeatureToggles {
            overlay: false,
            ..FeatureToggles::all_enabled()
        });
        let view = session.view();
        assert!(view.active_card.is_none());
        assert!(view.banner.is_none());
        assert_eq!(view.queued, 0);
        // Standings are still published.
        assert_eq!(view.rows.len(), 2);
    }
}
