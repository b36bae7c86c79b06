//! Core value structs for the Racecast overlay.
//!
//! Covers the normalized standings row and snapshot, the derived event
//! variants, the cached snapshot blob, and the read-only overlay view handed
//! to the rendering layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{CardKind, CardStage, PositionDirection, RaceFlag};
use crate::ids::CardId;

// ---------------------------------------------------------------------------
// Standings
// ---------------------------------------------------------------------------

/// One competitor row, normalized once at ingest.
///
/// Time columns keep the feed's text because they may hold status words
/// such as `PIT` instead of a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct StandingsRow {
    /// Competitor (car) number as displayed.
    pub number: String,
    /// Raw name string ("Last, First", "First Last", or a single token).
    pub name: String,
    /// 1-based position, if reported.
    pub position: Option<u32>,
    /// Completed laps, if reported.
    pub laps: Option<u32>,
    /// Last lap time or status text.
    pub last_lap: String,
    /// Best lap time or status text.
    pub best_lap: String,
    /// Gap to the leader.
    pub gap: String,
    /// Interval to the car ahead.
    pub diff: String,
    /// Total elapsed race time.
    pub total_time: String,
    /// Whether the competitor has taken the chequered flag.
    pub finished: bool,
}

/// A competitor's stable identity across ticks.
///
/// Position changes every tick so it never takes part in identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct IdentityKey {
    /// Competitor number, trimmed.
    pub number: String,
    /// Lowercased surname with punctuation removed.
    pub surname: String,
}

impl core::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}/{}", self.number, self.surname)
    }
}

/// A free-text race control announcement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export, export_to = "bindings/")]
pub struct Announcement {
    /// Time of day the message was issued, as reported.
    pub time: String,
    /// Message body.
    pub text: String,
}

/// One polled read of standings plus session metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Rows in feed order.
    pub rows: Vec<StandingsRow>,
    /// Session title as reported (may contain noise such as "Loading").
    pub session_name: String,
    /// Session lap text (number, "8/20", "Lap 8 of 20", ...).
    pub session_laps: Option<String>,
    /// Whether the session finish flag is asserted.
    pub flag_finish: bool,
    /// Raw race flag text.
    pub race_flag: String,
    /// Race control announcements.
    pub announcements: Vec<Announcement>,
    /// When the snapshot was received.
    pub received_at: DateTime<Utc>,
}

impl Snapshot {
    /// An empty snapshot received at `received_at`.
    pub const fn empty(received_at: DateTime<Utc>) -> Self {
        Self {
            rows: Vec::new(),
            session_name: String::new(),
            session_laps: None,
            flag_finish: false,
            race_flag: String::new(),
            announcements: Vec::new(),
            received_at,
        }
    }

    /// Whether the snapshot carries no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The last-good snapshot blob kept for cold starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct CachedSnapshot {
    /// Standings rows.
    pub rows: Vec<StandingsRow>,
    /// Session title.
    pub title: String,
    /// Session finish flag.
    pub finish_flag: bool,
    /// Session lap text.
    pub session_laps: Option<String>,
    /// Race control announcements.
    pub announcements: Vec<Announcement>,
}

impl CachedSnapshot {
    /// Capture the cacheable parts of a snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            rows: snapshot.rows.clone(),
            title: snapshot.session_name.clone(),
            finish_flag: snapshot.flag_finish,
            session_laps: snapshot.session_laps.clone(),
            announcements: snapshot.announcements.clone(),
        }
    }

    /// Rebuild a snapshot from the blob, stamped with `received_at`.
    pub fn into_snapshot(self, received_at: DateTime<Utc>) -> Snapshot {
        Snapshot {
            rows: self.rows,
            session_name: self.title,
            session_laps: self.session_laps,
            flag_finish: self.finish_flag,
            race_flag: String::new(),
            announcements: self.announcements,
            received_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Derived events
// ---------------------------------------------------------------------------

/// A position change between two ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PositionChange {
    /// Competitor identity.
    pub identity: IdentityKey,
    /// Competitor number as displayed.
    pub number: String,
    /// Raw competitor name.
    pub name: String,
    /// Position in the previous snapshot.
    pub from_position: u32,
    /// Position in the canonical snapshot.
    pub to_position: u32,
    /// `from_position - to_position`; positive when places were gained.
    pub delta: i64,
}

impl PositionChange {
    /// Direction of the change.
    pub const fn direction(&self) -> PositionDirection {
        if self.delta > 0 {
            PositionDirection::Up
        } else {
            PositionDirection::Down
        }
    }

    /// Number of places gained or lost.
    pub const fn magnitude(&self) -> u64 {
        self.delta.unsigned_abs()
    }
}

/// A new fastest lap of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct FastestLap {
    /// Competitor identity.
    pub identity: IdentityKey,
    /// Competitor number as displayed.
    pub number: String,
    /// Raw competitor name.
    pub name: String,
    /// Formatted lap time (`M:SS.mmm`).
    pub lap_time: String,
    /// Lap time in milliseconds.
    pub lap_time_ms: u64,
    /// The fastest time this one replaced, if any.
    pub previous_ms: Option<u64>,
}

/// A completed lap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LapFinish {
    /// Competitor identity.
    pub identity: IdentityKey,
    /// Competitor number as displayed.
    pub number: String,
    /// Raw competitor name.
    pub name: String,
    /// Lap counter after the lap.
    pub lap: u32,
    /// Formatted lap time (`M:SS.mmm`).
    pub lap_time: String,
    /// Lap time in milliseconds.
    pub lap_time_ms: u64,
    /// This lap minus the previous lap, when both parse.
    pub delta_ms: Option<i64>,
    /// Personal best before this lap, when known.
    pub personal_best_ms: Option<u64>,
}

/// A semantically meaningful change computed by diffing two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DerivedEvent {
    /// A competitor gained places.
    PositionUp(PositionChange),
    /// A competitor lost places.
    PositionDown(PositionChange),
    /// A new fastest lap.
    FastestLap(FastestLap),
    /// A competitor completed a lap.
    LapFinish(LapFinish),
}

impl DerivedEvent {
    /// The card kind this event is presented as.
    pub const fn kind(&self) -> CardKind {
        match self {
            Self::PositionUp(_) | Self::PositionDown(_) => CardKind::Position,
            Self::FastestLap(_) => CardKind::Fastest,
            Self::LapFinish(_) => CardKind::Finish,
        }
    }

    /// Identity of the competitor the event is about.
    pub const fn identity(&self) -> &IdentityKey {
        match self {
            Self::PositionUp(change) | Self::PositionDown(change) => &change.identity,
            Self::FastestLap(lap) => &lap.identity,
            Self::LapFinish(lap) => &lap.identity,
        }
    }

    /// Stable deduplication key.
    pub fn dedup_key(&self) -> String {
        match self {
            Self::PositionUp(change) | Self::PositionDown(change) => format!(
                "pos:{:?}:{}:{}:{}",
                change.direction(),
                change.number,
                change.magnitude(),
                change.to_position
            ),
            Self::FastestLap(lap) => format!("fastest:{}:{}", lap.identity, lap.lap_time_ms),
            Self::LapFinish(lap) => format!("finish:{}:{}", lap.identity, lap.lap),
        }
    }
}

// ---------------------------------------------------------------------------
// Overlay view
// ---------------------------------------------------------------------------

/// Display strings for the active card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CardView {
    /// Card identifier.
    pub id: CardId,
    /// Card kind.
    pub kind: CardKind,
    /// Current stage.
    pub stage: CardStage,
    /// Heading line ("FASTEST LAP", "LAP 12", "+2 POSITIONS").
    pub title: String,
    /// Competitor line ("#7 Smith").
    pub competitor: String,
    /// Main value (lap time, running clock, new position).
    pub value: String,
    /// Secondary value (delta text), if any.
    pub detail: Option<String>,
    /// Milliseconds until the card leaves the screen.
    pub remaining_ms: u64,
}

/// Display strings for the active banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct BannerView {
    /// The flag behind the banner.
    pub flag: RaceFlag,
    /// Banner heading ("GREEN FLAG", "PENALTY").
    pub title: String,
    /// Payload detail ("#12", "#12 +5s"), if any.
    pub detail: Option<String>,
    /// Whether the banner hides itself after a fixed time.
    pub transient: bool,
    /// Milliseconds until a transient banner hides.
    pub remaining_ms: Option<u64>,
}

/// Read-only view handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct OverlayView {
    /// Canonical session title.
    pub session_name: String,
    /// Canonical standings rows.
    pub rows: Vec<StandingsRow>,
    /// Lap counter label ("LAP 8/20"), empty when unknown.
    pub lap_label: String,
    /// The single active card, if any.
    pub active_card: Option<CardView>,
    /// Number of cards waiting.
    pub queued: u32,
    /// The active banner, if any.
    pub banner: Option<BannerView>,
    /// Race control announcements.
    pub announcements: Vec<Announcement>,
    /// Whether the session has finished.
    pub finished: bool,
    /// When the view was computed.
    pub updated_at: DateTime<Utc>,
}

impl OverlayView {
    /// A view with nothing to show.
    pub const fn blank(updated_at: DateTime<Utc>) -> Self {
        Self {
            session_name: String::new(),
            rows: Vec::new(),
            lap_label: String::new(),
            active_card: None,
            queued: 0,
            banner: None,
            announcements: Vec::new(),
            finished: false,
            updated_at,
        }
    }
}
