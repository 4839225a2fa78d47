use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::ScrobbleSource;
use crate::events::{ChartEvent, ChartEventReceiver, SharedEventBroadcaster};
use crate::ingest::{fetch_events, FetchOptions};
use crate::period::week_interval;
use crate::persistence::{BucketMap, BucketPersistence};
use crate::types::{BucketKey, PlayEvent};
use crate::Result;

/// Cache of weekly play buckets in front of a [`ScrobbleSource`].
///
/// Each `(user, iso_year, iso_week)` is fetched at most once. A fetched week
/// stays cached, even when it came back empty or cut short by a source
/// failure, until [`clear`](Self::clear) is called. Every newly fetched week
/// triggers a write of the whole cache to the persistence backend.
///
/// # Examples
///
/// ```rust,no_run
/// use lastfm_charts::{BucketStore, FetchOptions, JsonFilePersistence, LastFmApiClient};
///
/// # tokio_test::block_on(async {
/// let http_client = http_client::native::NativeClient::new();
/// let source = LastFmApiClient::new(Box::new(http_client), "api-key".to_string());
/// let store = BucketStore::open(
///     Box::new(source),
///     Box::new(JsonFilePersistence::at_default_location()?),
///     FetchOptions::default(),
/// );
///
/// let plays = store.get("rj", 2024, 3).await?;
/// println!("{} plays in 2024-W03", plays.len());
/// # Ok::<(), lastfm_charts::ChartError>(())
/// # });
/// ```
pub struct BucketStore {
    source: Box<dyn ScrobbleSource>,
    persistence: Box<dyn BucketPersistence>,
    buckets: RwLock<BucketMap>,
    options: FetchOptions,
    broadcaster: Arc<SharedEventBroadcaster>,
}

impl BucketStore {
    /// Open the store, loading the persisted cache once.
    ///
    /// A cache that cannot be loaded is reported and replaced by an empty one.
    pub fn open(
        source: Box<dyn ScrobbleSource>,
        persistence: Box<dyn BucketPersistence>,
        options: FetchOptions,
    ) -> Self {
        Self::with_broadcaster(
            source,
            persistence,
            options,
            Arc::new(SharedEventBroadcaster::new()),
        )
    }

    /// Open the store, emitting events on an existing broadcaster.
    pub fn with_broadcaster(
        source: Box<dyn ScrobbleSource>,
        persistence: Box<dyn BucketPersistence>,
        options: FetchOptions,
        broadcaster: Arc<SharedEventBroadcaster>,
    ) -> Self {
        let buckets = match persistence.load_all() {
            Ok(buckets) => {
                log::debug!("Loaded {} cached weeks", buckets.len());
                buckets
            }
            Err(e) => {
                log::warn!("Failed to load bucket cache, starting empty: {e}");
                broadcaster.persistence_failed(e.to_string());
                BucketMap::new()
            }
        };

        Self {
            source,
            persistence,
            buckets: RwLock::new(buckets),
            options,
            broadcaster,
        }
    }

    /// The plays of `user` in ISO week `iso_week` of `iso_year`.
    ///
    /// Served from the cache when present; otherwise fetched from the source,
    /// cached and persisted. Only an invalid week is an error.
    pub async fn get(&self, user: &str, iso_year: i32, iso_week: u32) -> Result<Vec<PlayEvent>> {
        let (from, to) = week_interval(iso_year, iso_week)?;
        let key = BucketKey::new(user, iso_year, iso_week);

        if let Some(events) = self.buckets.read().await.get(&key) {
            log::debug!("Cache hit for {key} ({} plays)", events.len());
            return Ok(events.clone());
        }

        log::info!("Fetching {key} from Last.fm");
        self.broadcaster.broadcast_event(ChartEvent::FetchStarted {
            timestamp: Utc::now(),
            user: user.to_string(),
            iso_year,
            iso_week,
        });

        // No lock is held while fetching; a concurrent miss on the same key
        // fetches too and the later insert wins.
        let events = fetch_events(
            self.source.as_ref(),
            user,
            from,
            to,
            &self.options,
            &self.broadcaster,
        )
        .await;

        let mut buckets = self.buckets.write().await;
        buckets.insert(key.clone(), events.clone());
        log::debug!("Cached {key} with {} plays", events.len());
        self.broadcaster.broadcast_event(ChartEvent::BucketCached {
            timestamp: Utc::now(),
            user: user.to_string(),
            iso_year,
            iso_week,
            events: events.len(),
        });

        if let Err(e) = self.persistence.save_all(&buckets) {
            log::warn!("Failed to persist bucket cache: {e}");
            self.broadcaster.persistence_failed(e.to_string());
        }

        Ok(events)
    }

    /// Drop every cached week, in memory and in durable storage.
    ///
    /// Clearing an empty cache is fine. If the durable copy cannot be removed
    /// the in-memory cache is still empty afterwards and the error is returned.
    pub async fn clear(&self) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        let dropped = buckets.len();
        buckets.clear();
        log::info!("Cleared {dropped} cached weeks");

        if let Err(e) = self.persistence.delete_all() {
            log::warn!("Failed to delete persisted bucket cache: {e}");
            self.broadcaster.persistence_failed(e.to_string());
            return Err(e);
        }

        self.broadcaster.broadcast_event(ChartEvent::CacheCleared {
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Cached `(iso_year, iso_week, plays)` for a user, oldest first.
    pub async fn cached_weeks(&self, user: &str) -> Vec<(i32, u32, usize)> {
        let buckets = self.buckets.read().await;
        let mut weeks: Vec<(i32, u32, usize)> = buckets
            .iter()
            .filter(|(key, _)| key.user == user)
            .map(|(key, events)| (key.iso_year, key.iso_week, events.len()))
            .collect();
        weeks.sort_unstable();
        weeks
    }

    pub async fn len(&self) -> usize {
        self.buckets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buckets.read().await.is_empty()
    }

    pub fn source(&self) -> &dyn ScrobbleSource {
        self.source.as_ref()
    }

    pub fn broadcaster(&self) -> &Arc<SharedEventBroadcaster> {
        &self.broadcaster
    }

    pub fn subscribe(&self) -> ChartEventReceiver {
        self.broadcaster.subscribe()
    }
}
