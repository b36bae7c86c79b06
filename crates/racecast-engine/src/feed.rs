//! Feed source selection.
//!
//! The runner is generic over [`SnapshotSource`], and async trait methods
//! are not dyn-compatible, so the configured source is picked at startup
//! and dispatched through an enum.

use std::path::Path;
use std::time::Duration;

use racecast_core::config::SourceConfig;
use racecast_core::source::{SnapshotSource, SourceError};
use tracing::{info, warn};

use crate::http_source::HttpSource;
use crate::replay_source::ReplaySource;

/// The snapshot source chosen by configuration.
pub enum FeedSource {
    /// Live polling of the scraper endpoint.
    Http(HttpSource),
    /// Playback of a recorded session.
    Replay(ReplaySource),
}

impl FeedSource {
    /// Build the source described by `config`: a replay when
    /// `replay_path` is set, HTTP polling otherwise.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the replay file cannot be loaded or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        if let Some(path) = config.replay_path.as_deref().filter(|p| !p.trim().is_empty()) {
            let replay = ReplaySource::from_file(Path::new(path))?;
            if replay.is_empty() {
                warn!(path, "Recorded feed has no frames, every poll will fail");
            } else {
                info!(path, frames = replay.len(), "Replaying recorded feed");
            }
            return Ok(Self::Replay(replay));
        }
        let http = HttpSource::new(
            &config.feed_url,
            Duration::from_millis(config.request_timeout_ms),
        )?;
        info!(
            url = http.url(),
            timeout_ms = config.request_timeout_ms,
            "Polling live feed"
        );
        Ok(Self::Http(http))
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Http(_) => "http",
            Self::Replay(_) => "replay",
        }
    }
}

impl SnapshotSource for FeedSource {
    async fn fetch(&self) -> Result<serde_json::Value, SourceError> {
        match self {
            Self::Http(source) => source.fetch().await,
            Self::Replay(source) => source.fetch().await,
        }
    }
}
