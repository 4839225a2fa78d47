//! # Chart Events
//!
//! A broadcast channel for the things the chart engine does on its own:
//! fetching weeks from Last.fm, writing the cache, and recovering from
//! failures that never surface as an `Err` to the chart caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

/// Events emitted while buckets are fetched, cached and persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChartEvent {
    /// A week was missing from the cache and is being fetched.
    FetchStarted {
        timestamp: DateTime<Utc>,
        user: String,
        iso_year: i32,
        iso_week: u32,
    },
    /// One page of scrobbles arrived.
    PageFetched {
        timestamp: DateTime<Utc>,
        user: String,
        page: u32,
        total_pages: u32,
        /// Settled plays kept from this page
        events: usize,
    },
    /// The source failed mid-fetch; the pages fetched so far are kept.
    SourceUnavailable {
        timestamp: DateTime<Utc>,
        user: String,
        page: u32,
        error: String,
    },
    /// A bucket was stored in the cache.
    BucketCached {
        timestamp: DateTime<Utc>,
        user: String,
        iso_year: i32,
        iso_week: u32,
        events: usize,
    },
    /// Loading, saving or deleting the durable cache failed.
    PersistenceFailed {
        timestamp: DateTime<Utc>,
        error: String,
    },
    /// The cache was cleared.
    CacheCleared { timestamp: DateTime<Utc> },
}

/// Type alias for the broadcast receiver
pub type ChartEventReceiver = broadcast::Receiver<ChartEvent>;

/// Shared event broadcasting state.
///
/// Sending never fails from the emitter's point of view: events without
/// subscribers are dropped, and the most recent one is always kept for
/// [`latest_event`](Self::latest_event).
#[derive(Clone)]
pub struct SharedEventBroadcaster {
    event_tx: broadcast::Sender<ChartEvent>,
    last_event_tx: watch::Sender<Option<ChartEvent>>,
}

impl SharedEventBroadcaster {
    /// Create a new shared event broadcaster
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let (last_event_tx, _) = watch::channel(None);

        Self {
            event_tx,
            last_event_tx,
        }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast_event(&self, event: ChartEvent) {
        let _ = self.event_tx.send(event.clone());
        self.last_event_tx.send_replace(Some(event));
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> ChartEventReceiver {
        self.event_tx.subscribe()
    }

    /// Get the latest event
    pub fn latest_event(&self) -> Option<ChartEvent> {
        self.last_event_tx.borrow().clone()
    }

    pub fn source_unavailable(&self, user: &str, page: u32, error: String) {
        self.broadcast_event(ChartEvent::SourceUnavailable {
            timestamp: Utc::now(),
            user: user.to_string(),
            page,
            error,
        });
    }

    pub fn persistence_failed(&self, error: String) {
        self.broadcast_event(ChartEvent::PersistenceFailed {
            timestamp: Utc::now(),
            error,
        });
    }
}

impl Default for SharedEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedEventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEventBroadcaster")
            .field("subscribers", &self.event_tx.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_latest_event_is_kept_without_subscribers() {
        let broadcaster = SharedEventBroadcaster::new();
        assert!(broadcaster.latest_event().is_none());

        broadcaster.persistence_failed("disk full".to_string());

        match broadcaster.latest_event() {
            Some(ChartEvent::PersistenceFailed { error, .. }) => assert_eq!(error, "disk full"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let broadcaster = SharedEventBroadcaster::new();
        let mut receiver = broadcaster.subscribe();

        broadcaster.source_unavailable("rj", 2, "timeout".to_string());

        match receiver.recv().await.unwrap() {
            ChartEvent::SourceUnavailable { user, page, .. } => {
                assert_eq!(user, "rj");
                assert_eq!(page, 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
