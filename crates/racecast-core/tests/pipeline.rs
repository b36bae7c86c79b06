//! End-to-end tests for the overlay pipeline: raw feed JSON in, overlay
//! view out, driven by a manual clock.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use std::sync::Arc;

use racecast_core::cache::{FileCache, MemoryCache, SnapshotCache};
use racecast_core::clock::ManualClock;
use racecast_core::config::OverlayConfig;
use racecast_core::tick::{OverlaySession, run_tick};
use racecast_types::{CachedSnapshot, CardKind, CardStage, ReconcileOutcome, StandingsRow};
use serde_json::{Value, json};

struct Harness {
    session: OverlaySession,
    clock: ManualClock,
}

impl Harness {
    fn new() -> Self {
        Self::with_cache(MemoryCache::new())
    }

    fn with_cache(cache: MemoryCache) -> Self {
        let clock = ManualClock::new(0);
        let session = OverlaySession::new(
            &OverlayConfig::default(),
            Arc::new(clock.clone()),
            Box::new(cache),
        );
        Self { session, clock }
    }

    /// Advance in scheduler-poll steps, as the runner would.
    fn advance(&mut self, ms: u64) {
        let mut left = ms;
        while left > 0 {
            let step = left.min(250);
            self.clock.advance(step);
            self.session.poll();
            left -= step;
        }
    }
}

fn row(number: &str, name: &str, position: u32, laps: u32, last: &str, best: &str) -> Value {
    json!({
        "number": number,
        "name": name,
        "position": position,
        "laps": laps,
        "lastLap": last,
        "bestLap": best,
    })
}

fn feed(rows: Vec<Value>) -> Value {
    json!({
        "standings": rows,
        "sessionName": "Feature Race",
        "sessionLaps": "Lap 5 of 20",
        "raceFlag": "GREEN",
    })
}

#[test]
fn position_fastest_and_finish_play_in_priority_order() {
    let mut h = Harness::new();

    run_tick(
        &mut h.session,
        &feed(vec![
            row("1", "Alpha, Ann", 1, 4, "1:31.000", "1:30.500"),
            row("2", "Bravo, Bob", 2, 4, "1:31.400", "1:31.000"),
            row("7", "Smith, John", 3, 4, "1:31.800", "1:31.200"),
        ]),
    );

    // #7 jumps to the lead on a new fastest lap.
    let summary = run_tick(
        &mut h.session,
        &feed(vec![
            row("7", "John Smith", 1, 5, "1:29.900", "1:29.900"),
            row("1", "Ann Alpha", 2, 4, "1:31.000", "1:30.500"),
            row("2", "Bob Bravo", 3, 4, "1:31.400", "1:31.000"),
        ]),
    );
    let kinds: Vec<CardKind> = summary.events.iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec![CardKind::Position, CardKind::Fastest, CardKind::Finish]);
    assert_eq!(summary.enqueued, 3);

    h.advance(250);
    let view = h.session.view();
    let card = view.active_card.unwrap();
    assert_eq!(card.kind, CardKind::Fastest);
    assert_eq!(card.competitor, "#7 Smith");
    assert_eq!(card.value, "1:29.900");
    assert_eq!(view.queued, 2);
    assert_eq!(view.lap_label, "LAP 5/20");

    h.advance(10_000);
    let card = h.session.view().active_card.unwrap();
    assert_eq!(card.kind, CardKind::Finish);
    assert_eq!(card.stage, CardStage::TimerRunning);

    h.advance(5_000);
    let card = h.session.view().active_card.unwrap();
    assert_eq!(card.stage, CardStage::Result);
    assert_eq!(card.value, "1:29.900");
    // Personal best before the lap was 1:31.200.
    assert_eq!(card.detail.as_deref(), Some("-1.300"));

    h.advance(7_000);
    let card = h.session.view().active_card.unwrap();
    assert_eq!(card.kind, CardKind::Position);
    assert_eq!(card.title, "+2 POSITIONS");

    h.advance(5_000);
    assert!(h.session.view().active_card.is_none());
}

#[test]
fn scrape_gap_does_not_blank_the_overlay() {
    let mut h = Harness::new();
    run_tick(
        &mut h.session,
        &feed(vec![row("1", "Alpha", 1, 4, "1:31.000", "1:30.500")]),
    );

    let gap = json!({"standings": [], "sessionName": "Loading..."});
    let summary = run_tick(&mut h.session, &gap);
    assert_eq!(summary.outcome, ReconcileOutcome::Held);
    assert!(summary.events.is_empty());
    assert_eq!(h.session.view().rows.len(), 1);

    // The same rows coming back derive nothing new.
    let summary = run_tick(
        &mut h.session,
        &feed(vec![row("1", "Alpha", 1, 4, "1:31.000", "1:30.500")]),
    );
    assert!(summary.events.is_empty());
}

/// Two ticks that queue a position, a fastest, and a finish card, with the
/// fastest card on air.
fn harness_with_cards_playing() -> Harness {
    let mut h = Harness::new();
    run_tick(
        &mut h.session,
        &feed(vec![
            row("1", "Alpha", 1, 4, "1:31.000", "1:30.500"),
            row("7", "Smith", 2, 4, "1:31.800", "1:31.200"),
        ]),
    );
    run_tick(
        &mut h.session,
        &feed(vec![
            row("7", "Smith", 1, 5, "1:29.900", "1:29.900"),
            row("1", "Alpha", 2, 4, "1:31.000", "1:30.500"),
        ]),
    );
    h.advance(250);
    let view = h.session.view();
    assert_eq!(view.active_card.unwrap().kind, CardKind::Fastest);
    assert_eq!(view.queued, 2);
    h
}

#[test]
fn finish_flag_during_scrape_gap_ends_session() {
    let mut h = harness_with_cards_playing();

    let summary = run_tick(
        &mut h.session,
        &json!({
            "standings": [],
            "sessionName": "Feature Race",
            "flagFinish": true,
            "raceFlag": "FINISH",
        }),
    );
    assert_eq!(summary.outcome, ReconcileOutcome::Held);
    assert!(summary.finished);
    assert!(summary.banner_changed);

    h.advance(250);
    let view = h.session.view();
    assert!(view.finished);
    assert!(view.active_card.is_none());
    assert_eq!(view.queued, 0);
    assert_eq!(view.rows.len(), 2);
    assert_eq!(view.banner.unwrap().title, "CHEQUERED FLAG");
}

#[test]
fn scrape_gap_carries_incoming_flag_laps_and_announcements() {
    let mut h = harness_with_cards_playing();

    let summary = run_tick(
        &mut h.session,
        &json!({
            "standings": [],
            "sessionName": "Loading...",
            "sessionLaps": "Lap 6 of 20",
            "raceFlag": "YELLOW",
            "announcements": ["Car 12 under investigation"],
        }),
    );
    assert_eq!(summary.outcome, ReconcileOutcome::Held);
    assert!(!summary.finished);
    assert!(summary.events.is_empty());

    let view = h.session.view();
    assert_eq!(view.rows.len(), 2);
    assert_eq!(view.session_name, "Feature Race");
    assert_eq!(view.lap_label, "LAP 6/20");
    assert_eq!(view.banner.unwrap().title, "YELLOW FLAG");
    assert_eq!(view.announcements.len(), 1);
    assert_eq!(view.announcements[0].text, "Car 12 under investigation");
    // Cards already queued keep playing.
    assert_eq!(view.active_card.unwrap().kind, CardKind::Fastest);
    assert_eq!(view.queued, 2);
}

#[test]
fn cold_start_restores_cached_standings() {
    let blob = CachedSnapshot {
        rows: vec![StandingsRow {
            number: "7".to_owned(),
            name: "Smith, John".to_owned(),
            position: Some(1),
            laps: Some(9),
            best_lap: "1:30.000".to_owned(),
            ..StandingsRow::default()
        }],
        title: "Feature Race".to_owned(),
        session_laps: Some("9/20".to_owned()),
        ..CachedSnapshot::default()
    };
    let mut h = Harness::with_cache(MemoryCache::with_blob(blob));

    let summary = run_tick(
        &mut h.session,
        &json!({"standings": [], "sessionName": "Feature Race - Lap 9"}),
    );
    assert_eq!(summary.outcome, ReconcileOutcome::Held);
    assert!(summary.events.is_empty());

    let view = h.session.view();
    assert_eq!(view.rows.len(), 1);
    assert_eq!(view.lap_label, "LAP 9/20");
}

#[test]
fn restart_resumes_from_file_cache() {
    let dir = std::env::temp_dir().join(format!("racecast-pipeline-{}", std::process::id()));
    let clock = ManualClock::new(0);

    // First run: accept live standings, which writes the cache.
    let mut first = OverlaySession::new(
        &OverlayConfig::default(),
        Arc::new(clock.clone()),
        Box::new(FileCache::open(&dir).unwrap()),
    );
    run_tick(
        &mut first,
        &feed(vec![
            row("1", "Alpha", 1, 4, "1:31.000", "1:30.500"),
            row("7", "Smith", 2, 4, "1:31.800", "1:31.200"),
        ]),
    );
    drop(first);
    assert!(FileCache::new(&dir).load().unwrap().is_some());

    // Restart mid-scrape: the feed is empty but the overlay is not.
    let mut second = OverlaySession::new(
        &OverlayConfig::default(),
        Arc::new(clock),
        Box::new(FileCache::new(&dir)),
    );
    let summary = run_tick(
        &mut second,
        &json!({"standings": [], "sessionName": "Loading Feature Race"}),
    );
    assert_eq!(summary.outcome, ReconcileOutcome::Held);
    assert!(summary.events.is_empty());
    assert_eq!(second.view().rows.len(), 2);
    assert_eq!(second.view().session_name, "Feature Race");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn session_change_clears_standings() {
    let mut h = Harness::new();
    run_tick(
        &mut h.session,
        &feed(vec![row("1", "Alpha", 1, 4, "1:31.000", "1:30.500")]),
    );
    let summary = run_tick(&mut h.session, &json!({"standings": [], "sessionName": "Qualifying"}));
    assert_eq!(summary.outcome, ReconcileOutcome::Reset);
    let view = h.session.view();
    assert!(view.rows.is_empty());
    assert!(view.lap_label.is_empty());
}

#[test]
fn configured_toggles_drop_disabled_kinds() {
    let config = OverlayConfig::parse("features:\n  fastest_lap: false\n  lap_finish: false\n").unwrap();
    assert!(!config.features.fastest_lap);
    let clock = ManualClock::new(0);
    let mut session = OverlaySession::new(
        &config,
        Arc::new(clock.clone()),
        Box::new(MemoryCache::new()),
    );

    run_tick(
        &mut session,
        &feed(vec![
            row("1", "Alpha", 1, 4, "1:31.000", "1:30.500"),
            row("7", "Smith", 2, 4, "1:31.800", "1:31.200"),
        ]),
    );
    let summary = run_tick(
        &mut session,
        &feed(vec![
            row("7", "Smith", 1, 5, "1:29.900", "1:29.900"),
            row("1", "Alpha", 2, 4, "1:31.000", "1:30.500"),
        ]),
    );
    // Derivation is unaffected; only the position card is queued.
    assert_eq!(summary.events.len(), 3);
    assert_eq!(summary.enqueued, 1);
    assert!(!session.toggles().fastest_lap);

    clock.advance(250);
    session.poll();
    let card = session.view().active_card.unwrap();
    assert_eq!(card.kind, CardKind::Position);
    assert_eq!(card.detail.as_deref(), Some("from P2"));
}

#[test]
fn chequered_flag_stops_cards() {
    let mut h = Harness::new();
    run_tick(
        &mut h.session,
        &feed(vec![
            row("1", "Alpha", 1, 19, "1:31.000", "1:30.500"),
            row("2", "Bravo", 2, 19, "1:31.400", "1:31.000"),
        ]),
    );
    run_tick(
        &mut h.session,
        &feed(vec![
            row("2", "Bravo", 1, 20, "1:30.000", "1:30.000"),
            row("1", "Alpha", 2, 19, "1:31.000", "1:30.500"),
        ]),
    );
    h.advance(250);
    assert!(h.session.view().active_card.is_some());

    let mut finished = feed(vec![
        row("2", "Bravo", 1, 20, "1:30.000", "1:30.000"),
        row("1", "Alpha", 2, 20, "1:31.200", "1:30.500"),
    ]);
    finished["flagFinish"] = json!(true);
    finished["raceFlag"] = json!("CHEQUERED");
    let summary = run_tick(&mut h.session, &finished);
    assert!(summary.finished);
    assert!(summary.events.is_empty());
    assert!(h.session.is_finished());
    assert_eq!(h.session.ticks(), 3);

    h.advance(250);
    let view = h.session.view();
    assert!(view.finished);
    assert!(view.active_card.is_none());
    assert_eq!(view.queued, 0);
    assert_eq!(view.banner.unwrap().title, "CHEQUERED FLAG");
}
