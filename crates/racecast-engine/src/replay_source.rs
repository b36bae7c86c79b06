//! Replay source: recorded feed payloads played back one per fetch.
//!
//! Accepts either a JSON array of payloads or JSON lines (one payload per
//! non-empty line). Once the recording runs out the last payload repeats,
//! so the overlay settles on the final state instead of resetting.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use racecast_core::source::{SnapshotSource, SourceError};
use serde_json::Value;

/// Plays back recorded payloads.
pub struct ReplaySource {
    frames: Vec<Value>,
    cursor: AtomicUsize,
}

impl ReplaySource {
    /// Load a recording from disk.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if the file cannot be read and
    /// [`SourceError::Decode`] if any payload is not valid JSON.
    pub fn from_file(path: &Path) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse a recording from text.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Decode`] if any payload is not valid JSON.
    pub fn parse(text: &str) -> Result<Self, SourceError> {
        let trimmed = text.trim_start();
        let frames = if trimmed.starts_with('[') {
            serde_json::from_str::<Vec<Value>>(trimmed)
                .map_err(|e| SourceError::Decode(format!("replay array: {e}")))?
        } else {
            text.lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(index, line)| {
                    serde_json::from_str(line).map_err(|e| {
                        SourceError::Decode(format!("replay line {}: {e}", index.saturating_add(1)))
                    })
                })
                .collect::<Result<Vec<Value>, _>>()?
        };
        Ok(Self {
            frames,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Number of recorded payloads.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the recording holds no payloads.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn next_frame(&self) -> Result<Value, SourceError> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.frames
            .get(index)
            .or_else(|| self.frames.last())
            .cloned()
            .ok_or(SourceError::Exhausted)
    }
}

impl SnapshotSource for ReplaySource {
    async fn fetch(&self) -> Result<Value, SourceError> {
        self.next_frame()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plays_json_array_and_holds_last() {
        let source = ReplaySource::parse(r#"[{"sessionName": "A"}, {"sessionName": "B"}]"#).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.fetch().await.unwrap()["sessionName"], "A");
        assert_eq!(source.fetch().await.unwrap()["sessionName"], "B");
        assert_eq!(source.fetch().await.unwrap()["sessionName"], "B");
    }

    #[tokio::test]
    async fn plays_json_lines() {
        let text = "{\"sessionName\": \"A\"}\n\n{\"sessionName\": \"B\"}\n";
        let source = ReplaySource::parse(text).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.fetch().await.unwrap()["sessionName"], "A");
    }

    #[test]
    fn reports_bad_line_number() {
        let err = ReplaySource::parse("{}\n{oops\n").err().unwrap();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn empty_recording_is_exhausted() {
        let source = ReplaySource::parse("").unwrap();
        assert!(source.is_empty());
        assert!(matches!(source.fetch().await, Err(SourceError::Exhausted)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = ReplaySource::from_file(Path::new("/nonexistent/racecast-replay.jsonl"));
        assert!(matches!(result, Err(SourceError::Io { .. })));
    }
}
