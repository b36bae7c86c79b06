//! Snapshot sources and fetch sequencing.
//!
//! A [`SnapshotSource`] produces one raw feed payload per call. The runner
//! spawns every fetch as its own task, so completions can arrive out of
//! order; [`FetchSequencer`] tags each fetch and rejects any response older
//! than the newest one already applied.

use std::future::Future;

/// Errors from a snapshot source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The request could not be sent or timed out.
    #[error("snapshot request failed: {0}")]
    Http(String),

    /// The feed answered with a non-success status.
    #[error("snapshot feed returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The payload was not valid JSON.
    #[error("failed to decode snapshot payload: {0}")]
    Decode(String),

    /// Reading a local snapshot file failed.
    #[error("failed to read snapshot file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A finite source has nothing left to yield.
    #[error("snapshot source exhausted")]
    Exhausted,
}

/// Something that can be polled for raw feed payloads.
pub trait SnapshotSource: Send + Sync + 'static {
    /// Fetch the current raw payload.
    fn fetch(&self) -> impl Future<Output = Result<serde_json::Value, SourceError>> + Send;
}

/// Monotonic tags for in-flight fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSequencer {
    issued: u64,
    applied: Option<u64>,
}

impl FetchSequencer {
    /// No fetches issued yet.
    pub const fn new() -> Self {
        Self {
            issued: 0,
            applied: None,
        }
    }

    /// Tag a new fetch. Tags start at 1 and strictly increase.
    pub const fn issue(&mut self) -> u64 {
        self.issued = self.issued.saturating_add(1);
        self.issued
    }

    /// Whether a response tagged `seq` is no newer than one already applied.
    pub fn is_stale(&self, seq: u64) -> bool {
        self.applied.is_some_and(|applied| seq <= applied)
    }

    /// Record that the response tagged `seq` was applied.
    pub fn mark_applied(&mut self, seq: u64) {
        self.applied = Some(self.applied.map_or(seq, |applied| applied.max(seq)));
    }

    /// Newest applied tag.
    pub const fn last_applied(&self) -> Option<u64> {
        self.applied
    }
}
