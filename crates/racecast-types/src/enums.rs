//! Enumeration types for the Racecast overlay.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// The kind of on-screen card a derived event is presented as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CardKind {
    /// New fastest lap of the session.
    Fastest,
    /// A competitor completed a lap (dramatized timer, then result).
    Finish,
    /// The biggest position gain or drop of a tick.
    Position,
}

impl CardKind {
    /// Dequeue priority. Lower values are presented first.
    pub const fn priority(self) -> u8 {
        match self {
            Self::Fastest => 0,
            Self::Finish => 1,
            Self::Position => 2,
        }
    }
}

/// Presentation stage of a scheduled card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CardStage {
    /// Waiting in the queue.
    Queued,
    /// Visible with static content.
    Showing,
    /// Finish card counting up toward the final lap time.
    TimerRunning,
    /// Finish card holding the final time and delta.
    Result,
}

/// Direction of a position change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum PositionDirection {
    /// Gained places.
    Up,
    /// Lost places.
    Down,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// What the reconciler decided for one incoming snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ReconcileOutcome {
    /// Non-empty rows were adopted as the new canonical state.
    Accepted,
    /// Empty rows with a matching session: previous rows were kept.
    Held,
    /// Empty rows with a different or absent session: state was cleared.
    Reset,
    /// Empty rows and nothing to hold or reset.
    Idle,
}

// ---------------------------------------------------------------------------
// Race flags
// ---------------------------------------------------------------------------

/// Race control flag as reported by the timing feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "flag", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum RaceFlag {
    /// Racing conditions.
    Green,
    /// Local caution.
    Yellow,
    /// Session stopped.
    Red,
    /// Safety car deployed.
    SafetyCar,
    /// Virtual safety car.
    VirtualSafetyCar,
    /// Slow zone.
    Slow,
    /// Faster car approaching.
    Blue,
    /// Final lap or slow vehicle on track.
    White,
    /// Chequered flag.
    Finish,
    /// Disqualification for a competitor.
    Black {
        /// Competitor number, if the payload carried one.
        number: Option<String>,
    },
    /// Mechanical problem flag for a competitor.
    Meatball {
        /// Competitor number, if the payload carried one.
        number: Option<String>,
    },
    /// Time penalty for a competitor.
    Penalty {
        /// Competitor number, if the payload carried one.
        number: Option<String>,
        /// Penalty time text, if the payload carried one.
        time: Option<String>,
    },
    /// Any other non-empty flag text, shown verbatim.
    Other {
        /// The raw flag text.
        text: String,
    },
}

impl RaceFlag {
    /// Whether this is a parameterized competitor flag (black, meatball, penalty).
    pub const fn is_special(&self) -> bool {
        matches!(
            self,
            Self::Black { .. } | Self::Meatball { .. } | Self::Penalty { .. }
        )
    }
}
