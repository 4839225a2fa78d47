use crate::types::{BucketKey, PlayEvent};
use crate::{ChartError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// All cached weeks, keyed by user and ISO week.
pub type BucketMap = HashMap<BucketKey, Vec<PlayEvent>>;

/// Durable storage for the bucket cache.
///
/// The store always reads and writes the cache as a whole: it loads once when
/// opened and saves the full map after every newly fetched week.
pub trait BucketPersistence {
    /// Load every stored bucket. A backend with nothing stored returns an empty map.
    fn load_all(&self) -> Result<BucketMap>;

    /// Replace the stored cache with `buckets`.
    fn save_all(&self, buckets: &BucketMap) -> Result<()>;

    /// Remove the stored cache. Removing a cache that does not exist is not an error.
    fn delete_all(&self) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct StoredBucket {
    #[serde(flatten)]
    key: BucketKey,
    events: Vec<PlayEvent>,
}

#[derive(Serialize, Deserialize)]
struct StoredCache {
    version: u32,
    buckets: Vec<StoredBucket>,
}

const CACHE_FORMAT_VERSION: u32 = 1;

/// Cache persistence in a single JSON file.
///
/// The default location follows the XDG Base Directory Specification:
/// `~/.cache/lastfm-charts/buckets.json` on Linux.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Persistence at the default cache location.
    pub fn at_default_location() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    /// Get the default cache file path using XDG directories.
    pub fn default_path() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir().ok_or_else(|| {
            ChartError::Persistence("Cannot determine XDG cache directory".to_string())
        })?;
        Ok(cache_dir.join("lastfm-charts").join("buckets.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BucketPersistence for JsonFilePersistence {
    fn load_all(&self) -> Result<BucketMap> {
        if !self.path.exists() {
            log::debug!("No cache file at {}", self.path.display());
            return Ok(BucketMap::new());
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| ChartError::Persistence(format!("Failed to read cache file: {e}")))?;
        let stored: StoredCache = serde_json::from_str(&json)
            .map_err(|e| ChartError::Persistence(format!("Failed to parse cache file: {e}")))?;

        if stored.version != CACHE_FORMAT_VERSION {
            return Err(ChartError::Persistence(format!(
                "Unsupported cache format version {}",
                stored.version
            )));
        }

        let buckets: BucketMap = stored
            .buckets
            .into_iter()
            .map(|bucket| (bucket.key, bucket.events))
            .collect();
        log::debug!(
            "Loaded {} cached weeks from {}",
            buckets.len(),
            self.path.display()
        );
        Ok(buckets)
    }

    fn save_all(&self, buckets: &BucketMap) -> Result<()> {
        // Create parent directories if they don't exist
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ChartError::Persistence(format!("Failed to create cache directory: {e}"))
            })?;
        }

        let mut stored: Vec<StoredBucket> = buckets
            .iter()
            .map(|(key, events)| StoredBucket {
                key: key.clone(),
                events: events.clone(),
            })
            .collect();
        stored.sort_by(|a, b| a.key.cmp(&b.key));

        let json = serde_json::to_string(&StoredCache {
            version: CACHE_FORMAT_VERSION,
            buckets: stored,
        })
        .map_err(|e| ChartError::Persistence(format!("Failed to serialize cache: {e}")))?;

        fs::write(&self.path, json)
            .map_err(|e| ChartError::Persistence(format!("Failed to write cache file: {e}")))?;

        log::debug!("Cache saved to: {}", self.path.display());
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                ChartError::Persistence(format!("Failed to remove cache file: {e}"))
            })?;
            log::debug!("Cache removed from: {}", self.path.display());
        }
        Ok(())
    }
}

/// In-memory persistence for tests and throwaway runs.
///
/// Clones share the same storage, so a test can keep one handle while the
/// store owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    buckets: Arc<Mutex<BucketMap>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persistence that starts out holding `buckets`.
    pub fn with_buckets(buckets: BucketMap) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(buckets)),
            saves: Arc::default(),
        }
    }

    /// A copy of what is currently stored.
    pub fn snapshot(&self) -> BucketMap {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of `save_all` calls so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BucketPersistence for MemoryPersistence {
    fn load_all(&self) -> Result<BucketMap> {
        Ok(self.snapshot())
    }

    fn save_all(&self, buckets: &BucketMap) -> Result<()> {
        *self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = buckets.clone();
        *self.saves.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        Ok(())
    }
}
