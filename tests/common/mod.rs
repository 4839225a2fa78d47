#![allow(dead_code)]
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use lastfm_charts::{
    BucketPersistence, BucketStore, ChartEngine, ChartError, EventPage, FetchOptions,
    MemoryPersistence, RawScrobble, Result, ScrobbleSource,
};
use std::sync::{Arc, Mutex};

/// One `list_events` call seen by a [`FakeSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub user: String,
    pub from: i64,
    pub to: i64,
    pub page: u32,
}

/// In-memory scrobble log that pages like Last.fm and records every request.
#[derive(Clone, Default)]
pub struct FakeSource {
    scrobbles: Vec<(String, RawScrobble)>,
    fail_on_page: Option<u32>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` plays of a track for `user`, one minute apart starting at `at`.
    pub fn with_plays(
        self,
        user: &str,
        title: &str,
        artist: &str,
        count: u32,
        at: DateTime<Utc>,
    ) -> Self {
        self.with_album_plays(user, title, artist, "Album", count, at)
    }

    pub fn with_album_plays(
        mut self,
        user: &str,
        title: &str,
        artist: &str,
        album: &str,
        count: u32,
        at: DateTime<Utc>,
    ) -> Self {
        for i in 0..count {
            self.scrobbles.push((
                user.to_string(),
                RawScrobble {
                    track_title: title.to_string(),
                    artist: artist.to_string(),
                    album: album.to_string(),
                    timestamp: Some(at.timestamp() + 60 * i64::from(i)),
                    now_playing: false,
                },
            ));
        }
        self
    }

    /// Add the track currently playing, which has no timestamp.
    pub fn with_now_playing(mut self, user: &str, title: &str, artist: &str) -> Self {
        self.scrobbles.push((
            user.to_string(),
            RawScrobble {
                track_title: title.to_string(),
                artist: artist.to_string(),
                album: String::new(),
                timestamp: None,
                now_playing: true,
            },
        ));
        self
    }

    /// Fail every request for this page number.
    pub fn failing_on_page(mut self, page: u32) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    /// Shared handle on the request log, valid after the source is boxed.
    pub fn requests(&self) -> Arc<Mutex<Vec<Request>>> {
        Arc::clone(&self.requests)
    }
}

/// How many times the first page of an interval starting at `from` was requested.
pub fn fetches_of(requests: &Arc<Mutex<Vec<Request>>>, user: &str, from: DateTime<Utc>) -> usize {
    requests
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.user == user && r.from == from.timestamp() && r.page == 1)
        .count()
}

/// Total first-page requests, i.e. the number of weeks fetched.
pub fn total_fetches(requests: &Arc<Mutex<Vec<Request>>>) -> usize {
    requests.lock().unwrap().iter().filter(|r| r.page == 1).count()
}

#[async_trait(?Send)]
impl ScrobbleSource for FakeSource {
    async fn list_events(
        &self,
        user: &str,
        from: i64,
        to: i64,
        page: u32,
        page_size: u32,
    ) -> Result<EventPage> {
        self.requests.lock().unwrap().push(Request {
            user: user.to_string(),
            from,
            to,
            page,
        });

        if self.fail_on_page == Some(page) {
            return Err(ChartError::SourceUnavailable(format!(
                "page {page} timed out"
            )));
        }

        let matching: Vec<RawScrobble> = self
            .scrobbles
            .iter()
            .filter(|(owner, _)| owner == user)
            .filter(|(_, raw)| {
                raw.now_playing || raw.timestamp.is_some_and(|ts| ts >= from && ts <= to)
            })
            .map(|(_, raw)| raw.clone())
            .collect();

        let page_size = page_size as usize;
        let total_pages = matching.len().div_ceil(page_size).max(1) as u32;
        let events = matching
            .into_iter()
            .skip((page as usize - 1) * page_size)
            .take(page_size)
            .collect();

        Ok(EventPage {
            events,
            page,
            total_pages,
        })
    }

    async fn latest_event(&self, user: &str) -> Result<Option<RawScrobble>> {
        Ok(self
            .scrobbles
            .iter()
            .filter(|(owner, raw)| owner == user && !raw.now_playing)
            .filter_map(|(_, raw)| raw.timestamp.map(|ts| (ts, raw)))
            .max_by_key(|(ts, _)| *ts)
            .map(|(_, raw)| raw.clone()))
    }
}

/// Persistence whose writes always fail.
pub struct FailingPersistence;

impl BucketPersistence for FailingPersistence {
    fn load_all(&self) -> Result<lastfm_charts::BucketMap> {
        Ok(Default::default())
    }

    fn save_all(&self, _buckets: &lastfm_charts::BucketMap) -> Result<()> {
        Err(ChartError::Persistence("disk full".to_string()))
    }

    fn delete_all(&self) -> Result<()> {
        Err(ChartError::Persistence("read-only filesystem".to_string()))
    }
}

/// Chart engine over `source` with in-memory persistence and no page delay.
pub fn engine_for(source: FakeSource) -> (ChartEngine, MemoryPersistence) {
    let persistence = MemoryPersistence::new();
    let store = BucketStore::open(
        Box::new(source),
        Box::new(persistence.clone()),
        FetchOptions::immediate(),
    );
    (ChartEngine::new(store), persistence)
}

/// Midnight UTC plus `hour` hours on the given day.
pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}
