//! Reconciliation of incoming snapshots against canonical state.
//!
//! The upstream scraper routinely returns empty standings for a poll or two
//! while a page reloads. Those must not blank the overlay, but a genuine
//! change of session must clear it. The [`Reconciler`] decides between
//! accepting, holding, and resetting, and owns the lap-counter hysteresis
//! that keeps the lap label from flickering backwards.

use racecast_types::{CachedSnapshot, ReconcileOutcome, Snapshot, StandingsRow};
use tracing::{debug, info, warn};

use crate::cache::SnapshotCache;
use crate::config::ReconcileConfig;

// ---------------------------------------------------------------------------
// Lap counter
// ---------------------------------------------------------------------------

/// The session lap counter shown in the overlay header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LapCounter {
    /// Current lap.
    pub current: Option<u32>,
    /// Scheduled race distance in laps.
    pub total: Option<u32>,
}

impl LapCounter {
    /// `"LAP 8"`, `"LAP 8/20"`, or empty when the current lap is unknown.
    pub fn label(&self) -> String {
        match (self.current, self.total) {
            (Some(current), Some(total)) => format!("LAP {current}/{total}"),
            (Some(current), None) => format!("LAP {current}"),
            (None, _) => String::new(),
        }
    }
}

/// Parse session lap text. The first number is the current lap and the
/// second, if any, the total: `"8"`, `"8/20"`, `"Lap 8 of 20"`.
pub fn parse_session_laps(text: &str) -> LapCounter {
    let mut numbers = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .filter_map(|run| run.parse::<u32>().ok());
    LapCounter {
        current: numbers.next(),
        total: numbers.next(),
    }
}

/// Lap counter of a snapshot, falling back to the highest row lap count
/// when the session lap text carries no number.
pub fn lap_counter(snapshot: &Snapshot) -> LapCounter {
    let mut counter = snapshot
        .session_laps
        .as_deref()
        .map(parse_session_laps)
        .unwrap_or_default();
    if counter.current.is_none() {
        counter.current = snapshot.rows.iter().filter_map(|row| row.laps).max();
    }
    counter
}

/// Resistance to small backward changes in the lap counter.
#[derive(Debug, Clone)]
pub struct LapHysteresis {
    tracked: Option<u32>,
    margin: u32,
    reset_lap: u32,
}

impl LapHysteresis {
    /// A tracker that suppresses backward drops of up to `margin` laps
    /// unless some row reports `reset_lap`.
    pub const fn new(margin: u32, reset_lap: u32) -> Self {
        Self {
            tracked: None,
            margin,
            reset_lap,
        }
    }

    /// Feed one lap value and return the value to display.
    pub fn observe(&mut self, value: u32, rows: &[StandingsRow]) -> u32 {
        let Some(tracked) = self.tracked else {
            self.tracked = Some(value);
            return value;
        };

        let accept = value >= tracked
            || tracked.saturating_sub(value) > self.margin
            || rows.iter().any(|row| row.laps == Some(self.reset_lap));

        if accept {
            self.tracked = Some(value);
            value
        } else {
            debug!(tracked, value, "suppressed backward lap counter change");
            tracked
        }
    }

    /// The currently tracked lap value.
    pub const fn tracked(&self) -> Option<u32> {
        self.tracked
    }

    /// Forget the tracked value.
    pub const fn clear(&mut self) {
        self.tracked = None;
    }
}

// ---------------------------------------------------------------------------
// Session identity
// ---------------------------------------------------------------------------

/// Normalize a session title for identity comparison.
///
/// Lowercases, drops `noise_tokens`, drops embedded lap counters
/// (`lap 5`, `5 laps`, `lap 5 of 20`, `5/20`), and collapses punctuation
/// and whitespace into single spaces.
pub fn normalize_session_name(name: &str, noise_tokens: &[String]) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '/' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    let mut tokens: Vec<&str> = Vec::new();
    for token in cleaned.split_whitespace() {
        if is_lap_fraction(token) {
            continue;
        }
        tokens.extend(token.split('/').filter(|part| !part.is_empty()));
    }

    let mut kept: Vec<&str> = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if noise_tokens.iter().any(|noise| noise == token) {
            continue;
        }
        match token {
            "lap" => {
                // "lap 5" and "lap 5 of 20"
                if iter.next_if(|next| is_number(next)).is_some()
                    && iter.next_if_eq(&"of").is_some()
                {
                    let _ = iter.next_if(|next| is_number(next));
                }
            }
            "laps" => {
                // "5 laps": the number was already kept.
                if kept.last().is_some_and(|prev| is_number(prev)) {
                    kept.pop();
                }
            }
            _ => kept.push(token),
        }
    }
    kept.join(" ")
}

/// Whether two normalized session names describe the same session.
pub fn same_session(a: &str, b: &str) -> bool {
    a == b || a.contains(b) || b.contains(a)
}

fn is_number(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

fn is_lap_fraction(token: &str) -> bool {
    token
        .split_once('/')
        .is_some_and(|(a, b)| is_number(a) && is_number(b))
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Result of reconciling one snapshot.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Canonical state before this snapshot.
    pub previous: Snapshot,
    /// Canonical state after this snapshot.
    pub current: Snapshot,
    /// What was decided.
    pub outcome: ReconcileOutcome,
    /// Lap counter after hysteresis.
    pub lap_counter: LapCounter,
}

/// Owner of canonical standings state.
#[derive(Debug)]
pub struct Reconciler {
    canonical: Option<Snapshot>,
    cache_consulted: bool,
    laps: LapHysteresis,
    noise_tokens: Vec<String>,
}

impl Reconciler {
    /// A reconciler with no canonical state yet.
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            canonical: None,
            cache_consulted: false,
            laps: LapHysteresis::new(config.lap_reset_margin, config.reset_lap),
            noise_tokens: config
                .noise_tokens
                .iter()
                .map(|token| token.to_lowercase())
                .collect(),
        }
    }

    /// The current canonical snapshot, if any snapshot has been seen.
    pub const fn canonical(&self) -> Option<&Snapshot> {
        self.canonical.as_ref()
    }

    /// Reconcile one normalized snapshot.
    ///
    /// Never fails. The cache is read only on the first call, and only when
    /// that call brings no rows; it is written whenever rows are accepted.
    pub fn reconcile(&mut self, raw: Snapshot, cache: &mut dyn SnapshotCache) -> Reconciliation {
        let bootstrapping = !self.cache_consulted;
        self.cache_consulted = true;

        let previous = match self.canonical.take() {
            Some(previous) => previous,
            None if bootstrapping && raw.is_empty() => restore_from_cache(cache, &raw),
            None => Snapshot::empty(raw.received_at),
        };

        let (current, outcome) = if !raw.is_empty() {
            store_in_cache(cache, &raw);
            (raw, ReconcileOutcome::Accepted)
        } else if previous.is_empty() {
            (raw, ReconcileOutcome::Idle)
        } else if self.matches_previous(&raw, &previous) {
            debug!(
                session = %previous.session_name,
                rows = previous.rows.len(),
                "empty snapshot for same session, holding previous rows"
            );
            (hold_rows(raw, &previous), ReconcileOutcome::Held)
        } else {
            info!(
                previous_session = %previous.session_name,
                session = %raw.session_name,
                "session changed, resetting standings"
            );
            self.laps.clear();
            (raw, ReconcileOutcome::Reset)
        };

        let mut counter = lap_counter(&current);
        if let Some(value) = counter.current {
            counter.current = Some(self.laps.observe(value, &current.rows));
        }

        self.canonical = Some(current.clone());
        Reconciliation {
            previous,
            current,
            outcome,
            lap_counter: counter,
        }
    }

    /// Whether an empty snapshot belongs to the previous session.
    ///
    /// A blank title asserts no identity and resets. A title that is
    /// entirely noise ("Loading...") normalizes to nothing and matches.
    fn matches_previous(&self, raw: &Snapshot, previous: &Snapshot) -> bool {
        if raw.session_name.trim().is_empty() {
            return false;
        }
        let incoming = normalize_session_name(&raw.session_name, &self.noise_tokens);
        let known = normalize_session_name(&previous.session_name, &self.noise_tokens);
        same_session(&incoming, &known)
    }
}

/// An empty same-session snapshot with the previous rows put back.
///
/// Session metadata comes from the incoming snapshot. The title stays the
/// previous one so a noise-only title cannot erase the session identity.
/// Blank flag, lap, and announcement fields keep their previous values, and
/// an asserted finish flag is never withdrawn by a scrape gap.
fn hold_rows(raw: Snapshot, previous: &Snapshot) -> Snapshot {
    Snapshot {
        rows: previous.rows.clone(),
        session_name: previous.session_name.clone(),
        session_laps: raw.session_laps.or_else(|| previous.session_laps.clone()),
        flag_finish: raw.flag_finish || previous.flag_finish,
        race_flag: if raw.race_flag.trim().is_empty() {
            previous.race_flag.clone()
        } else {
            raw.race_flag
        },
        announcements: if raw.announcements.is_empty() {
            previous.announcements.clone()
        } else {
            raw.announcements
        },
        received_at: raw.received_at,
    }
}

fn restore_from_cache(cache: &dyn SnapshotCache, raw: &Snapshot) -> Snapshot {
    match cache.load() {
        Ok(Some(blob)) => {
            info!(
                session = %blob.title,
                rows = blob.rows.len(),
                "restored last-good snapshot from cache"
            );
            blob.into_snapshot(raw.received_at)
        }
        Ok(None) => Snapshot::empty(raw.received_at),
        Err(e) => {
            warn!(error = %e, "failed to read snapshot cache");
            Snapshot::empty(raw.received_at)
        }
    }
}

fn store_in_cache(cache: &mut dyn SnapshotCache, snapshot: &Snapshot) {
    if let Err(e) = cache.store(&CachedSnapshot::from_snapshot(snapshot)) {
        warn!(error = %e, "failed to write snapshot cache");
    }
}
