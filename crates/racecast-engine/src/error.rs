//! Error types for the overlay engine binary.
//!
//! [`EngineError`] wraps every failure that can stop the engine during
//! startup. Once the loop is running, fetch and cache failures are logged
//! and never end the run.

/// Top-level error for the overlay engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: racecast_core::config::ConfigError,
    },

    /// A snapshot source could not be constructed.
    #[error("source error: {source}")]
    Source {
        /// The underlying source error.
        #[from]
        source: racecast_core::source::SourceError,
    },

    /// The snapshot cache directory is unusable.
    #[error("cache error: {source}")]
    Cache {
        /// The underlying cache error.
        #[from]
        source: racecast_core::cache::CacheError,
    },
}
