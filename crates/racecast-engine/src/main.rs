//! Overlay engine binary for Racecast.
//!
//! Wires the timing feed, the last-good snapshot cache, and the overlay
//! session together and runs the control loop until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `racecast-config.yaml` (or `RACECAST_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the snapshot source (HTTP polling or replay)
//! 4. Open the snapshot cache
//! 5. Create the overlay session and its channels
//! 6. Watch for toggle reloads (SIGHUP) and log on-air changes
//! 7. Run the overlay loop until Ctrl-C
//! 8. Log the result

mod error;
mod feed;
mod http_source;
mod replay_source;
mod view_logger;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use racecast_core::cache::{FileCache, NoCache, SnapshotCache};
use racecast_core::clock::MonotonicClock;
use racecast_core::config::{FeatureToggles, OverlayConfig};
use racecast_core::runner;
use racecast_core::tick::OverlaySession;
use racecast_types::OverlayView;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::feed::FeedSource;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "racecast-config.yaml";

/// Application entry point for the overlay engine.
///
/// # Errors
///
/// Returns an error if configuration, the snapshot source, or the cache
/// cannot be initialized.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = config_path();
    let config = load_config(&config_path)?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        config = %config_path.display(),
        feed_url = %config.source.feed_url,
        ingest_poll_ms = config.timing.ingest_poll_ms,
        scheduler_poll_ms = config.timing.scheduler_poll_ms,
        "racecast-engine starting"
    );

    // 3. Build the snapshot source.
    let source = Arc::new(FeedSource::from_config(&config.source).map_err(EngineError::from)?);
    info!(source = source.name(), "Snapshot source ready");

    // 4. Open the snapshot cache.
    let cache: Box<dyn SnapshotCache> = if config.cache.enabled {
        let cache = FileCache::open(&config.cache.dir).map_err(EngineError::from)?;
        info!(path = %cache.path().display(), "Snapshot cache opened");
        Box::new(cache)
    } else {
        info!("Snapshot cache disabled");
        Box::new(NoCache)
    };

    // 5. Create the session and its channels.
    let mut session = OverlaySession::new(&config, Arc::new(MonotonicClock::new()), cache);
    let (toggle_tx, toggle_rx) = watch::channel(config.features);
    let (view_tx, view_rx) = watch::channel(OverlayView::blank(Utc::now()));

    // 6. Toggle reloads and on-air logging.
    spawn_toggle_reloader(config_path, toggle_tx);
    let logger = view_logger::spawn_view_logger(view_rx);

    // 7. Run until Ctrl-C.
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    };
    let summary = runner::run_overlay(
        &mut session,
        source,
        &config.timing,
        toggle_rx,
        &view_tx,
        shutdown,
    )
    .await;

    // 8. Log results.
    drop(view_tx);
    if let Err(e) = logger.await {
        warn!(error = %e, "view logger task failed");
    }
    info!(
        ticks = summary.ticks,
        polls = summary.polls,
        stale_responses = summary.stale_responses,
        fetch_failures = summary.fetch_failures,
        "racecast-engine shutdown complete"
    );

    Ok(())
}

/// Config file location: `RACECAST_CONFIG` if set, else the default.
fn config_path() -> PathBuf {
    std::env::var_os("RACECAST_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load the overlay configuration, falling back to defaults when the file
/// does not exist. Environment overrides apply either way.
fn load_config(path: &std::path::Path) -> Result<OverlayConfig, EngineError> {
    if path.exists() {
        Ok(OverlayConfig::from_file(path)?)
    } else {
        let mut config = OverlayConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

/// Re-read feature toggles from the config file on SIGHUP.
#[cfg(unix)]
fn spawn_toggle_reloader(path: PathBuf, toggles: watch::Sender<FeatureToggles>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "failed to install SIGHUP handler, toggles are fixed");
            return;
        }
    };
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            match OverlayConfig::from_file(&path) {
                Ok(config) => {
                    info!(toggles = ?config.features, "Reloaded feature toggles");
                    toggles.send_replace(config.features);
                }
                Err(e) => warn!(error = %e, "failed to reload config, keeping toggles"),
            }
        }
    });
}

/// Toggle reloads need SIGHUP; elsewhere the configured toggles are fixed.
#[cfg(not(unix))]
fn spawn_toggle_reloader(_path: PathBuf, toggles: watch::Sender<FeatureToggles>) {
    // Keep the sender alive so the runner never sees a closed channel.
    tokio::spawn(async move {
        toggles.closed().await;
    });
}
