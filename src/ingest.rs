//! Paging a time interval of scrobbles out of a [`ScrobbleSource`].

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::api::{ScrobbleSource, MAX_PAGE_SIZE};
use crate::events::{ChartEvent, SharedEventBroadcaster};
use crate::types::{PlayEvent, RawScrobble};

/// Paging behaviour of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Scrobbles requested per page
    pub page_size: u32,
    /// Pause between consecutive page requests
    pub page_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            page_delay: Duration::from_millis(200),
        }
    }
}

impl FetchOptions {
    /// No pause between pages, for tests and local sources.
    pub fn immediate() -> Self {
        Self {
            page_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }
}

/// Fetch every settled play of `user` between `from` and `to` (inclusive).
///
/// Pages are requested in increasing order and concatenated in the order the
/// source returns them. Now-playing and undated entries are dropped.
///
/// This never fails: if the source errors out, paging stops and the plays
/// collected so far are returned. The failure is logged and broadcast as
/// [`ChartEvent::SourceUnavailable`]. Callers that cache the result cache the
/// partial data too.
pub async fn fetch_events(
    source: &dyn ScrobbleSource,
    user: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    options: &FetchOptions,
    broadcaster: &SharedEventBroadcaster,
) -> Vec<PlayEvent> {
    let mut events = Vec::new();
    let mut page = 1;

    loop {
        let result = source
            .list_events(
                user,
                from.timestamp(),
                to.timestamp(),
                page,
                options.page_size,
            )
            .await;

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(e) => {
                log::warn!(
                    "Fetching page {page} of scrobbles for '{user}' failed, keeping {} plays: {e}",
                    events.len()
                );
                broadcaster.source_unavailable(user, page, e.to_string());
                break;
            }
        };

        let total_pages = fetched.total_pages;
        let has_next_page = fetched.has_next_page();
        let raw_count = fetched.events.len();
        let before = events.len();
        events.extend(
            fetched
                .events
                .into_iter()
                .filter_map(RawScrobble::into_play_event),
        );

        log::debug!(
            "Fetched page {page} of {total_pages} for '{user}' ({} plays kept of {raw_count})",
            events.len() - before
        );
        broadcaster.broadcast_event(ChartEvent::PageFetched {
            timestamp: Utc::now(),
            user: user.to_string(),
            page,
            total_pages,
            events: events.len() - before,
        });

        if raw_count == 0 || !has_next_page {
            break;
        }

        page += 1;
        if !options.page_delay.is_zero() {
            tokio::time::sleep(options.page_delay).await;
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventPage;
    use crate::{ChartError, Result};
    use async_trait::async_trait;
    use std::cell::RefCell;

    /// Serves canned pages and records which pages were asked for.
    struct PagedSource {
        pages: Vec<Result<EventPage>>,
        requested: RefCell<Vec<u32>>,
    }

    impl PagedSource {
        fn new(pages: Vec<Result<EventPage>>) -> Self {
            Self {
                pages,
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    #[async_trait(?Send)]
    impl ScrobbleSource for PagedSource {
        async fn list_events(
            &self,
            _user: &str,
            _from: i64,
            _to: i64,
            page: u32,
            _page_size: u32,
        ) -> Result<EventPage> {
            self.requested.borrow_mut().push(page);
            match self.pages.get(page as usize - 1) {
                Some(Ok(page)) => Ok(page.clone()),
                Some(Err(e)) => Err(ChartError::SourceUnavailable(e.to_string())),
                None => Ok(EventPage::default()),
            }
        }

        async fn latest_event(&self, _user: &str) -> Result<Option<RawScrobble>> {
            Ok(None)
        }
    }

    fn scrobble(title: &str, timestamp: Option<i64>, now_playing: bool) -> RawScrobble {
        RawScrobble {
            track_title: title.to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            timestamp,
            now_playing,
        }
    }

    fn page(page: u32, total_pages: u32, events: Vec<RawScrobble>) -> Result<EventPage> {
        Ok(EventPage {
            events,
            page,
            total_pages,
        })
    }

    fn interval() -> (DateTime<Utc>, DateTime<Utc>) {
        crate::period::week_interval(2024, 3).unwrap()
    }

    #[tokio::test]
    async fn test_pages_are_concatenated_in_order() {
        let source = PagedSource::new(vec![
            page(
                1,
                3,
                vec![
                    scrobble("live", None, true),
                    scrobble("a", Some(1_705_400_000), false),
                ],
            ),
            page(2, 3, vec![scrobble("b", Some(1_705_300_000), false)]),
            page(
                3,
                3,
                vec![
                    scrobble("undated", None, false),
                    scrobble("c", Some(1_705_290_000), false),
                ],
            ),
        ]);
        let (from, to) = interval();

        let events = fetch_events(
            &source,
            "rj",
            from,
            to,
            &FetchOptions::immediate(),
            &SharedEventBroadcaster::new(),
        )
        .await;

        let titles: Vec<&str> = events.iter().map(|e| e.track_title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        assert_eq!(*source.requested.borrow(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_pages() {
        let source = PagedSource::new(vec![
            page(1, 3, vec![scrobble("a", Some(1_705_400_000), false)]),
            Err(ChartError::SourceUnavailable("connection reset".to_string())),
            page(3, 3, vec![scrobble("c", Some(1_705_290_000), false)]),
        ]);
        let broadcaster = SharedEventBroadcaster::new();
        let (from, to) = interval();

        let events = fetch_events(
            &source,
            "rj",
            from,
            to,
            &FetchOptions::immediate(),
            &broadcaster,
        )
        .await;

        assert_eq!(events.len(), 1);
        assert_eq!(*source.requested.borrow(), vec![1, 2]);
        assert!(matches!(
            broadcaster.latest_event(),
            Some(ChartEvent::SourceUnavailable { page: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_interval_stops_after_first_page() {
        let source = PagedSource::new(vec![page(1, 0, vec![])]);
        let (from, to) = interval();

        let events = fetch_events(
            &source,
            "rj",
            from,
            to,
            &FetchOptions::immediate(),
            &SharedEventBroadcaster::new(),
        )
        .await;

        assert!(events.is_empty());
        assert_eq!(*source.requested.borrow(), vec![1]);
    }

    #[tokio::test]
    async fn test_last_reported_page_ends_paging() {
        // A third page exists in the fake but the source says there are two
        let source = PagedSource::new(vec![
            page(1, 2, vec![scrobble("a", Some(1_705_400_000), false)]),
            page(2, 2, vec![scrobble("b", Some(1_705_300_000), false)]),
            page(3, 2, vec![scrobble("c", Some(1_705_290_000), false)]),
        ]);
        let (from, to) = interval();

        let events = fetch_events(
            &source,
            "rj",
            from,
            to,
            &FetchOptions::immediate(),
            &SharedEventBroadcaster::new(),
        )
        .await;

        assert_eq!(events.len(), 2);
        assert_eq!(*source.requested.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_page_size_is_clamped() {
        assert_eq!(FetchOptions::default().with_page_size(500).page_size, 200);
        assert_eq!(FetchOptions::default().with_page_size(0).page_size, 1);
    }
}
