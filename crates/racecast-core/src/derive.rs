//! Event derivation: diffing previous and canonical standings.
//!
//! Each tick yields at most one position event, one fastest-lap event, and
//! one lap-finish event, always in that order. The trackers that make
//! derivation idempotent live in [`DeriverState`], owned by the session and
//! passed in explicitly.

use std::collections::HashMap;

use racecast_types::{
    DerivedEvent, FastestLap, IdentityKey, LapFinish, PositionChange, StandingsRow,
};
use tracing::debug;

use crate::identity::identity_key;
use crate::laptime::{format_lap_time, parse_lap_time, signed_delta};

/// Trackers carried between ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeriverState {
    last_position_key: Option<String>,
    last_finish_key: Option<String>,
    fastest: Option<(IdentityKey, u64)>,
}

impl DeriverState {
    /// Fresh trackers.
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded session fastest lap.
    pub const fn fastest(&self) -> Option<&(IdentityKey, u64)> {
        self.fastest.as_ref()
    }

    /// Forget everything, as after a session reset.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Diff `previous` against `current` and return the new events.
///
/// With no previous rows (cold start or after a reset) nothing is emitted;
/// the fastest-lap record is seeded from `current` so a standing record is
/// not announced as new.
pub fn derive_events(
    previous: &[StandingsRow],
    current: &[StandingsRow],
    state: &mut DeriverState,
) -> Vec<DerivedEvent> {
    if previous.is_empty() {
        if let Some((row, ms)) = fastest_row(current) {
            state.fastest = Some((identity_key(row), ms));
        }
        return Vec::new();
    }
    if state.fastest.is_none() {
        // Rows restored from cache were never observed here.
        if let Some((row, ms)) = fastest_row(previous) {
            state.fastest = Some((identity_key(row), ms));
        }
    }

    let by_identity: HashMap<IdentityKey, &StandingsRow> = previous
        .iter()
        .map(|row| (identity_key(row), row))
        .collect();
    let matched: Vec<(IdentityKey, &StandingsRow, &StandingsRow)> = current
        .iter()
        .filter_map(|row| {
            let key = identity_key(row);
            by_identity.get(&key).map(|prev| (key, *prev, row))
        })
        .collect();

    let mut events = Vec::new();
    events.extend(position_event(&matched, state));
    events.extend(fastest_event(current, state));
    events.extend(finish_event(&matched, state));
    events
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

fn position_event(
    matched: &[(IdentityKey, &StandingsRow, &StandingsRow)],
    state: &mut DeriverState,
) -> Option<DerivedEvent> {
    let mut best_gain: Option<PositionChange> = None;
    let mut best_drop: Option<PositionChange> = None;

    for (identity, prev, cur) in matched {
        let (Some(from), Some(to)) = (prev.position, cur.position) else {
            continue;
        };
        let delta = i64::from(from).saturating_sub(i64::from(to));
        if delta == 0 {
            continue;
        }
        let change = PositionChange {
            identity: identity.clone(),
            number: cur.number.clone(),
            name: cur.name.clone(),
            from_position: from,
            to_position: to,
            delta,
        };
        // Strict comparisons keep the first row in canonical order on ties.
        if delta > 0 {
            if best_gain.as_ref().is_none_or(|best| delta > best.delta) {
                best_gain = Some(change);
            }
        } else if best_drop.as_ref().is_none_or(|best| delta < best.delta) {
            best_drop = Some(change);
        }
    }

    let event = match (best_gain, best_drop) {
        (Some(gain), _) => DerivedEvent::PositionUp(gain),
        (None, Some(drop)) => DerivedEvent::PositionDown(drop),
        (None, None) => return None,
    };

    let key = event.dedup_key();
    if state.last_position_key.as_deref() == Some(key.as_str()) {
        debug!(key = %key, "suppressed duplicate position event");
        return None;
    }
    state.last_position_key = Some(key);
    Some(event)
}

// ---------------------------------------------------------------------------
// Fastest lap
// ---------------------------------------------------------------------------

/// Best lap of a row, falling back to its last lap.
fn row_lap_ms(row: &StandingsRow) -> Option<u64> {
    parse_lap_time(&row.best_lap).or_else(|| parse_lap_time(&row.last_lap))
}

/// The row holding the minimum valid lap time. The first row wins ties.
fn fastest_row(rows: &[StandingsRow]) -> Option<(&StandingsRow, u64)> {
    rows.iter()
        .filter_map(|row| row_lap_ms(row).map(|ms| (row, ms)))
        .fold(None, |best, (row, ms)| match best {
            Some((_, best_ms)) if best_ms <= ms => best,
            _ => Some((row, ms)),
        })
}

fn fastest_event(current: &[StandingsRow], state: &mut DeriverState) -> Option<DerivedEvent> {
    let (row, ms) = fastest_row(current)?;
    let identity = identity_key(row);

    let previous_ms = state.fastest.as_ref().map(|(_, recorded)| *recorded);
    let changed = match &state.fastest {
        None => true,
        Some((recorded_identity, recorded_ms)) => {
            *recorded_identity != identity || ms < *recorded_ms
        }
    };
    state.fastest = Some((identity.clone(), ms));

    if !changed {
        return None;
    }
    Some(DerivedEvent::FastestLap(FastestLap {
        identity,
        number: row.number.clone(),
        name: row.name.clone(),
        lap_time: format_lap_time(ms),
        lap_time_ms: ms,
        previous_ms,
    }))
}

// ---------------------------------------------------------------------------
// Lap finish
// ---------------------------------------------------------------------------

fn finish_event(
    matched: &[(IdentityKey, &StandingsRow, &StandingsRow)],
    state: &mut DeriverState,
) -> Option<DerivedEvent> {
    let mut selected: Option<LapFinish> = None;

    for (identity, prev, cur) in matched {
        let (Some(prev_laps), Some(laps)) = (prev.laps, cur.laps) else {
            continue;
        };
        if laps <= prev_laps {
            continue;
        }
        let Some(lap_ms) = parse_lap_time(&cur.last_lap) else {
            continue;
        };

        let delta_ms = parse_lap_time(&prev.last_lap).map(|prev_ms| signed_delta(lap_ms, prev_ms));
        let personal_best_ms = parse_lap_time(&prev.best_lap).or_else(|| {
            parse_lap_time(&cur.best_lap).filter(|best| *best != lap_ms)
        });

        let candidate = LapFinish {
            identity: identity.clone(),
            number: cur.number.clone(),
            name: cur.name.clone(),
            lap: laps,
            lap_time: format_lap_time(lap_ms),
            lap_time_ms: lap_ms,
            delta_ms,
            personal_best_ms,
        };

        if selected
            .as_ref()
            .is_none_or(|best| ranks_before(candidate.delta_ms, best.delta_ms))
        {
            selected = Some(candidate);
        }
    }

    let event = DerivedEvent::LapFinish(selected?);
    let key = event.dedup_key();
    if state.last_finish_key.as_deref() == Some(key.as_str()) {
        debug!(key = %key, "suppressed duplicate lap finish event");
        return None;
    }
    state.last_finish_key = Some(key);
    Some(event)
}

/// Numeric deltas before missing ones, then ascending. Equal ranks keep the
/// earlier candidate.
fn ranks_before(candidate: Option<i64>, incumbent: Option<i64>) -> bool {
    match (candidate, incumbent) {
        (Some(c), Some(i)) => c < i,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
