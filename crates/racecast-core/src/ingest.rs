//! Ingestion boundary: loosely-typed feed JSON to normalized snapshots.
//!
//! The feed is scraped, so any field may be missing, null, a number where
//! a string was expected, or the other way round. Everything is coerced
//! here, once, into fully-defaulted [`Snapshot`] and [`StandingsRow`]
//! values. Nothing in this module fails: malformed input degrades to empty
//! or absent fields.

use chrono::{DateTime, Utc};
use racecast_types::{Announcement, Snapshot, StandingsRow};
use serde_json::{Map, Value};

/// Normalize one raw feed payload.
///
/// Non-object payloads and a non-array `standings` field yield a snapshot
/// with no rows. Rows carrying neither a number nor a name are dropped.
pub fn normalize_snapshot(raw: &Value, received_at: DateTime<Utc>) -> Snapshot {
    let Some(obj) = raw.as_object() else {
        return Snapshot::empty(received_at);
    };

    let rows = field(obj, &["standings", "rows"])
        .and_then(Value::as_array)
        .map(|rows| rows.iter().filter_map(normalize_row).collect())
        .unwrap_or_default();

    let announcements = field(obj, &["announcements"])
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(normalize_announcement).collect())
        .unwrap_or_default();

    Snapshot {
        rows,
        session_name: text_field(obj, &["sessionName", "session_name", "title"]),
        session_laps: field(obj, &["sessionLaps", "session_laps"])
            .and_then(as_text)
            .filter(|laps| !laps.is_empty()),
        flag_finish: field(obj, &["flagFinish", "flag_finish", "finishFlag"])
            .is_some_and(as_bool),
        race_flag: text_field(obj, &["raceFlag", "race_flag", "flag"]),
        announcements,
        received_at,
    }
}

/// Normalize one standings row.
pub fn normalize_row(raw: &Value) -> Option<StandingsRow> {
    let obj = raw.as_object()?;

    let row = StandingsRow {
        number: text_field(obj, &["number", "no", "num"]),
        name: text_field(obj, &["name", "driver"]),
        position: field(obj, &["position", "pos"])
            .and_then(as_u32)
            .filter(|pos| *pos > 0),
        laps: field(obj, &["laps"]).and_then(as_u32),
        last_lap: text_field(obj, &["lastLap", "last_lap", "last"]),
        best_lap: text_field(obj, &["bestLap", "best_lap", "best"]),
        gap: text_field(obj, &["gap"]),
        diff: text_field(obj, &["diff"]),
        total_time: text_field(obj, &["totalTime", "total_time", "total"]),
        finished: field(obj, &["finished", "finishFlag", "finish_flag"]).is_some_and(as_bool),
    };

    if row.number.is_empty() && row.name.is_empty() {
        return None;
    }
    Some(row)
}

fn normalize_announcement(raw: &Value) -> Option<Announcement> {
    match raw {
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| Announcement {
                time: String::new(),
                text: text.to_owned(),
            })
        }
        Value::Object(obj) => {
            let text = text_field(obj, &["text", "message"]);
            (!text.is_empty()).then(|| Announcement {
                time: text_field(obj, &["time", "timestamp"]),
                text,
            })
        }
        _ => None,
    }
}

/// First present, non-null field among `names`.
fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|value| !value.is_null())
}

fn text_field(obj: &Map<String, Value>, names: &[&str]) -> String {
    field(obj, names).and_then(as_text).unwrap_or_default()
}

/// Strings are trimmed; numbers and booleans are rendered as text.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Non-negative integers from numbers or numeric strings.
fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_u64().is_some_and(|n| n != 0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        ),
        _ => false,
    }
}
