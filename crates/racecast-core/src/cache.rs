//! Last-good snapshot cache for cold starts.
//!
//! A single blob lives under [`CACHE_KEY`]. The reconciler reads it once,
//! when the overlay boots into an empty feed, and overwrites it every time
//! it accepts non-empty rows. Cache failures are never fatal: callers log
//! them and carry on.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use racecast_types::CachedSnapshot;

/// Key of the single cached blob.
pub const CACHE_KEY: &str = "racecast:last-snapshot";

/// Errors from a snapshot cache backend.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Reading or writing the backing file failed.
    #[error("cache I/O failed: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// The blob could not be encoded or decoded.
    #[error("cache blob serialization failed: {source}")]
    Serialization {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// Storage for the last-good snapshot blob.
pub trait SnapshotCache: Send {
    /// Read the cached blob, `None` when nothing has been stored.
    fn load(&self) -> Result<Option<CachedSnapshot>, CacheError>;

    /// Replace the cached blob.
    fn store(&mut self, blob: &CachedSnapshot) -> Result<(), CacheError>;
}

/// In-process cache, used by tests and when file caching is disabled.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    blob: Option<CachedSnapshot>,
}

impl MemoryCache {
    /// An empty cache.
    pub const fn new() -> Self {
        Self { blob: None }
    }

    /// A cache pre-seeded with `blob`.
    pub const fn with_blob(blob: CachedSnapshot) -> Self {
        Self { blob: Some(blob) }
    }

    /// The stored blob, if any.
    pub const fn blob(&self) -> Option<&CachedSnapshot> {
        self.blob.as_ref()
    }
}

impl SnapshotCache for MemoryCache {
    fn load(&self) -> Result<Option<CachedSnapshot>, CacheError> {
        Ok(self.blob.clone())
    }

    fn store(&mut self, blob: &CachedSnapshot) -> Result<(), CacheError> {
        self.blob = Some(blob.clone());
        Ok(())
    }
}

/// A cache that never holds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl SnapshotCache for NoCache {
    fn load(&self) -> Result<Option<CachedSnapshot>, CacheError> {
        Ok(None)
    }

    fn store(&mut self, _blob: &CachedSnapshot) -> Result<(), CacheError> {
        Ok(())
    }
}

/// JSON file cache inside a directory.
///
/// The file is named after [`CACHE_KEY`] with the colon replaced, and is
/// written through a temporary sibling and renamed into place so a crash
/// mid-write never leaves a truncated blob behind.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    /// A cache storing its blob inside `dir`. The directory is created on
    /// first store.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(file_name()),
        }
    }

    /// Like [`FileCache::new`], but creates `dir` up front so an unusable
    /// path is reported at startup.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self::new(dir))
    }

    /// Full path of the blob file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn file_name() -> String {
    format!("{}.json", CACHE_KEY.replace(':', "-"))
}

impl SnapshotCache for FileCache {
    fn load(&self) -> Result<Option<CachedSnapshot>, CacheError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn store(&mut self, blob: &CachedSnapshot) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec(blob)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use racecast_types::StandingsRow;

    use super::*;

    fn blob(title: &str) -> CachedSnapshot {
        CachedSnapshot {
            rows: vec![StandingsRow {
                number: "7".to_owned(),
                name: "Smith, John".to_owned(),
                position: Some(1),
                ..StandingsRow::default()
            }],
            title: title.to_owned(),
            ..CachedSnapshot::default()
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "racecast-cache-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn memory_cache_stores_and_loads() {
        let mut cache = MemoryCache::new();
        assert!(cache.load().unwrap().is_none());
        cache.store(&blob("Race 1")).unwrap();
        assert_eq!(cache.load().unwrap().unwrap().title, "Race 1");
    }

    #[test]
    fn no_cache_forgets_everything() {
        let mut cache = NoCache;
        cache.store(&blob("Race 1")).unwrap();
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn file_name_is_derived_from_key() {
        let cache = FileCache::new("/tmp/x");
        assert!(cache.path().ends_with("racecast-last-snapshot.json"));
    }

    #[test]
    fn open_creates_directory() {
        let dir = scratch_dir("open");
        let cache = FileCache::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert!(cache.load().unwrap().is_none());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_cache_missing_file_is_empty() {
        let cache = FileCache::new(scratch_dir("missing"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn file_cache_overwrites_blob() {
        let dir = scratch_dir("overwrite");
        let mut cache = FileCache::new(&dir);
        cache.store(&blob("Race 1")).unwrap();
        cache.store(&blob("Race 2")).unwrap();

        let reopened = FileCache::new(&dir);
        assert_eq!(reopened.load().unwrap().unwrap().title, "Race 2");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_cache_reports_corrupt_blob() {
        let dir = scratch_dir("corrupt");
        fs::create_dir_all(&dir).unwrap();
        let cache = FileCache::new(&dir);
        fs::write(cache.path(), b"{not json").unwrap();
        assert!(matches!(
            cache.load(),
            Err(CacheError::Serialization { .. })
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
