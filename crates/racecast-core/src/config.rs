//! Configuration loading and typed config structures for the Racecast overlay.
//!
//! The canonical configuration lives in `racecast-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure, and a
//! loader that reads the file. Every field has a default, so an empty file
//! (or no file at all) yields a working overlay.

use std::path::Path;

use racecast_types::CardKind;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level overlay configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OverlayConfig {
    /// Where snapshots come from.
    #[serde(default)]
    pub source: SourceConfig,

    /// Poll intervals.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Card durations and display limits.
    #[serde(default)]
    pub cards: CardConfig,

    /// Reconciler thresholds.
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Banner durations.
    #[serde(default)]
    pub banner: BannerConfig,

    /// Feature toggles.
    #[serde(default)]
    pub features: FeatureToggles,

    /// Last-good snapshot cache.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl OverlayConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `RACECAST_FEED_URL` overrides `source.feed_url`
    /// - `RACECAST_CACHE_DIR` overrides `cache.dir`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse_yaml(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_yaml(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yml reports an empty document as a unit value.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override deployment-specific values with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RACECAST_FEED_URL") {
            self.source.feed_url = val;
        }
        if let Ok(val) = std::env::var("RACECAST_CACHE_DIR") {
            self.cache.dir = val;
        }
    }
}

/// Snapshot source configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    /// URL polled for standings JSON.
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// Replay file (JSON array or JSON lines). Takes precedence over the URL.
    #[serde(default)]
    pub replay_path: Option<String>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            feed_url: default_feed_url(),
            replay_path: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Poll intervals for the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimingConfig {
    /// Scheduler poll interval in milliseconds.
    #[serde(default = "default_scheduler_poll_ms")]
    pub scheduler_poll_ms: u64,

    /// Snapshot ingestion interval in milliseconds.
    #[serde(default = "default_ingest_poll_ms")]
    pub ingest_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            scheduler_poll_ms: default_scheduler_poll_ms(),
            ingest_poll_ms: default_ingest_poll_ms(),
        }
    }
}

/// Card durations. Each kind's total is its hard maximum on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CardConfig {
    /// How long a fastest-lap card shows.
    #[serde(default = "default_fastest_visible_ms")]
    pub fastest_visible_ms: u64,

    /// Length of the dramatized finish countdown.
    #[serde(default = "default_finish_timer_ms")]
    pub finish_timer_ms: u64,

    /// How long the finish result holds after the countdown.
    #[serde(default = "default_finish_result_ms")]
    pub finish_result_ms: u64,

    /// How long a position card shows.
    #[serde(default = "default_position_visible_ms")]
    pub position_visible_ms: u64,

    /// Deltas at or beyond this magnitude show as "no delta".
    #[serde(default = "default_delta_display_limit_ms")]
    pub delta_display_limit_ms: u64,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            fastest_visible_ms: default_fastest_visible_ms(),
            finish_timer_ms: default_finish_timer_ms(),
            finish_result_ms: default_finish_result_ms(),
            position_visible_ms: default_position_visible_ms(),
            delta_display_limit_ms: default_delta_display_limit_ms(),
        }
    }
}

/// Reconciler thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconcileConfig {
    /// A lap drop larger than this is a new session.
    #[serde(default = "default_lap_reset_margin")]
    pub lap_reset_margin: u32,

    /// A row reporting this lap proves a real reset.
    #[serde(default)]
    pub reset_lap: u32,

    /// Tokens stripped from session names before comparison.
    #[serde(default = "default_noise_tokens")]
    pub noise_tokens: Vec<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            lap_reset_margin: default_lap_reset_margin(),
            reset_lap: 0,
            noise_tokens: default_noise_tokens(),
        }
    }
}

/// Banner durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BannerConfig {
    /// How long a green flag banner shows.
    #[serde(default = "default_green_visible_ms")]
    pub green_visible_ms: u64,
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            green_visible_ms: default_green_visible_ms(),
        }
    }
}

/// Feature toggles consumed as plain booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct FeatureToggles {
    /// Master switch for cards and banners.
    #[serde(default = "default_true")]
    pub overlay: bool,

    /// Position change cards.
    #[serde(default = "default_true")]
    pub position_events: bool,

    /// Fastest lap cards.
    #[serde(default = "default_true")]
    pub fastest_lap: bool,

    /// Lap finish cards.
    #[serde(default = "default_true")]
    pub lap_finish: bool,

    /// Flag banners.
    #[serde(default = "default_true")]
    pub banners: bool,
}

impl FeatureToggles {
    /// Everything switched on.
    pub const fn all_enabled() -> Self {
        Self {
            overlay: true,
            position_events: true,
            fastest_lap: true,
            lap_finish: true,
            banners: true,
        }
    }

    /// Whether cards of `kind` may be queued or shown.
    pub const fn allows(self, kind: CardKind) -> bool {
        if !self.overlay {
            return false;
        }
        match kind {
            CardKind::Fastest => self.fastest_lap,
            CardKind::Finish => self.lap_finish,
            CardKind::Position => self.position_events,
        }
    }

    /// Whether flag banners may be shown.
    pub const fn allows_banners(self) -> bool {
        self.overlay && self.banners
    }
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self::all_enabled()
    }
}

/// Last-good snapshot cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// Whether the cache is read and written at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding the cache file.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_feed_url() -> String {
    "http://localhost:8080/api/standings".to_owned()
}

const fn default_request_timeout_ms() -> u64 {
    2_000
}

const fn default_scheduler_poll_ms() -> u64 {
    250
}

const fn default_ingest_poll_ms() -> u64 {
    1_000
}

const fn default_fastest_visible_ms() -> u64 {
    10_000
}

const fn default_finish_timer_ms() -> u64 {
    5_000
}

const fn default_finish_result_ms() -> u64 {
    7_000
}

const fn default_position_visible_ms() -> u64 {
    5_000
}

const fn default_delta_display_limit_ms() -> u64 {
    10_000
}

const fn default_lap_reset_margin() -> u32 {
    5
}

fn default_noise_tokens() -> Vec<String> {
    [
        "loading",
        "live",
        "timing",
        "results",
        "speedhive",
        "mylaps",
        "orbits",
        "apex",
        "alkamel",
    ]
    .iter()
    .map(|token| (*token).to_owned())
    .collect()
}

const fn default_green_visible_ms() -> u64 {
    5_000
}

fn default_cache_dir() -> String {
    ".racecast-cache".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = OverlayConfig::default();
        assert_eq!(config.timing.scheduler_poll_ms, 250);
        assert_eq!(config.timing.ingest_poll_ms, 1_000);
        assert_eq!(config.cards.fastest_visible_ms, 10_000);
        assert_eq!(config.cards.finish_timer_ms, 5_000);
        assert_eq!(config.cards.finish_result_ms, 7_000);
        assert_eq!(config.reconcile.lap_reset_margin, 5);
        assert_eq!(config.reconcile.reset_lap, 0);
        assert_eq!(config.banner.green_visible_ms, 5_000);
        assert!(config.features.overlay);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
source:
  feed_url: "http://timing.local/feed"
  replay_path: "replays/race1.jsonl"
  request_timeout_ms: 900

timing:
  scheduler_poll_ms: 100
  ingest_poll_ms: 500

cards:
  fastest_visible_ms: 8000
  finish_timer_ms: 4000
  finish_result_ms: 6000
  position_visible_ms: 3000
  delta_display_limit_ms: 5000

reconcile:
  lap_reset_margin: 3
  reset_lap: 1
  noise_tokens: ["loading"]

banner:
  green_visible_ms: 2500

features:
  overlay: true
  position_events: false
  fastest_lap: true
  lap_finish: false
  banners: true

cache:
  enabled: false
  dir: "/tmp/racecast"

logging:
  level: "debug"
"#;

        let config = OverlayConfig::parse_yaml(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.source.feed_url, "http://timing.local/feed");
        assert_eq!(config.source.replay_path.as_deref(), Some("replays/race1.jsonl"));
        assert_eq!(config.timing.scheduler_poll_ms, 100);
        assert_eq!(config.cards.finish_timer_ms, 4_000);
        assert_eq!(config.reconcile.lap_reset_margin, 3);
        assert_eq!(config.reconcile.noise_tokens, vec!["loading".to_owned()]);
        assert!(!config.features.position_events);
        assert!(!config.features.lap_finish);
        assert!(!config.cache.enabled);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "cards:\n  fastest_visible_ms: 4000\n";
        let config = OverlayConfig::parse_yaml(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.cards.fastest_visible_ms, 4_000);
        // Everything else uses defaults
        assert_eq!(config.cards.finish_result_ms, 7_000);
        assert_eq!(config.timing.ingest_poll_ms, 1_000);
        assert!(!config.reconcile.noise_tokens.is_empty());
    }

    #[test]
    fn parse_empty_yaml() {
        let config = OverlayConfig::parse_yaml("");
        assert!(config.is_ok());
        assert_eq!(config.ok(), Some(OverlayConfig::default()));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let config = OverlayConfig::parse_yaml("timing: [1, 2");
        assert!(matches!(config, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn toggles_gate_card_kinds() {
        let mut toggles = FeatureToggles::all_enabled();
        assert!(toggles.allows(CardKind::Finish));

        toggles.lap_finish = false;
        assert!(!toggles.allows(CardKind::Finish));
        assert!(toggles.allows(CardKind::Fastest));

        toggles.overlay = false;
        assert!(!toggles.allows(CardKind::Fastest));
        assert!(!toggles.allows_banners());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("racecast-config.yaml");
        if path.exists() {
            let config = OverlayConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
