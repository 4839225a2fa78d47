//! Data types for play events, cache keys and computed charts.
//!
//! This module contains the records that flow through the crate: raw
//! scrobbles as delivered by a [`ScrobbleSource`](crate::ScrobbleSource), the
//! settled [`PlayEvent`]s the cache stores, and the ranked [`ChartEntry`]s the
//! aggregator produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::period::Period;

// ================================================================================================
// PLAY EVENTS
// ================================================================================================

/// A single settled play of a track.
///
/// Two events belong to the same chart entry when their `track_title` and
/// `artist` are equal; `album` is carried along for display only.
///
/// # Examples
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use lastfm_charts::PlayEvent;
///
/// let event = PlayEvent::new(
///     "Paranoid Android",
///     "Radiohead",
///     "OK Computer",
///     Utc.with_ymd_and_hms(2024, 1, 17, 20, 15, 0).unwrap(),
/// );
///
/// assert_eq!(event.iso_week(), (2024, 3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayEvent {
    /// The track name/title
    pub track_title: String,
    /// The artist name
    pub artist: String,
    /// The album name, empty when Last.fm has none
    pub album: String,
    /// When the play was scrobbled, at second resolution
    #[serde(with = "chrono::serde::ts_seconds")]
    pub played_at: DateTime<Utc>,
}

impl PlayEvent {
    pub fn new(
        track_title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
        played_at: DateTime<Utc>,
    ) -> Self {
        Self {
            track_title: track_title.into(),
            artist: artist.into(),
            album: album.into(),
            played_at,
        }
    }

    /// The `(iso_year, iso_week)` bucket this play falls into.
    pub fn iso_week(&self) -> (i32, u32) {
        crate::period::week_key_of(self.played_at)
    }
}

/// A scrobble as reported by the source, before it is settled into a [`PlayEvent`].
///
/// Last.fm lists the currently playing track at the top of
/// `user.getrecenttracks` with a `nowplaying` marker and no date; such
/// entries describe an in-progress play and are never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawScrobble {
    pub track_title: String,
    pub artist: String,
    pub album: String,
    /// Unix timestamp of the scrobble, `None` when the source gave none
    pub timestamp: Option<i64>,
    /// Set for the track the user is listening to right now
    pub now_playing: bool,
}

impl RawScrobble {
    /// Convert into a settled play, trimming text fields.
    ///
    /// Returns `None` for now-playing entries and entries without a usable
    /// timestamp.
    pub fn into_play_event(self) -> Option<PlayEvent> {
        if self.now_playing {
            return None;
        }
        let played_at = DateTime::from_timestamp(self.timestamp?, 0)?;
        Some(PlayEvent {
            track_title: self.track_title.trim().to_string(),
            artist: self.artist.trim().to_string(),
            album: self.album.trim().to_string(),
            played_at,
        })
    }
}

/// One page of raw scrobbles from the source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventPage {
    /// The scrobbles on this page, in source order
    pub events: Vec<RawScrobble>,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Total number of pages for the requested interval
    pub total_pages: u32,
}

impl EventPage {
    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages
    }
}

// ================================================================================================
// CACHE KEYS
// ================================================================================================

/// Key of one cached week of plays.
///
/// Only the week granularity is ever materialized from the source, so the
/// granularity is implied by the type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    pub user: String,
    pub iso_year: i32,
    pub iso_week: u32,
}

impl BucketKey {
    pub fn new(user: impl Into<String>, iso_year: i32, iso_week: u32) -> Self {
        Self {
            user: user.into(),
            iso_year,
            iso_week,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_week_{}_{}", self.user, self.iso_year, self.iso_week)
    }
}

// ================================================================================================
// CHARTS
// ================================================================================================

/// One ranked track within a chart.
///
/// `rank` is 1-based and unique within a chart. For weekly charts `points` is
/// `21 - rank`; for monthly and yearly charts it is the sum of the points the
/// track collected in the lower-level charts it appeared in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartEntry {
    pub track_title: String,
    pub artist: String,
    pub album: String,
    pub play_count: u32,
    pub points: u32,
    pub rank: u32,
}

impl ChartEntry {
    pub fn same_track(&self, track_title: &str, artist: &str) -> bool {
        self.track_title == track_title && self.artist == artist
    }
}

/// A computed chart for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chart {
    pub period: Period,
    pub entries: Vec<ChartEntry>,
}

impl Chart {
    pub fn new(period: Period, entries: Vec<ChartEntry>) -> Self {
        Self { period, entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the entry for a track, if it made the chart.
    pub fn entry(&self, track_title: &str, artist: &str) -> Option<&ChartEntry> {
        self.entries
            .iter()
            .find(|entry| entry.same_track(track_title, artist))
    }
}

// ================================================================================================
// TRACK INFO
// ================================================================================================

/// Global Last.fm statistics and metadata for a track (`track.getInfo`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackInfo {
    pub name: String,
    pub artist: String,
    pub album: Option<String>,
    pub listeners: Option<u64>,
    pub playcount: Option<u64>,
    /// Track length in milliseconds, `None` when Last.fm reports 0
    pub duration_ms: Option<u64>,
    pub tags: Vec<String>,
}

// ================================================================================================
// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(timestamp: Option<i64>, now_playing: bool) -> RawScrobble {
        RawScrobble {
            track_title: "  Motion Picture Soundtrack ".to_string(),
            artist: "Radiohead\t".to_string(),
            album: " Kid A".to_string(),
            timestamp,
            now_playing,
        }
    }

    #[test]
    fn test_into_play_event_trims_fields() {
        let event = raw(Some(1_705_500_000), false).into_play_event().unwrap();
        assert_eq!(event.track_title, "Motion Picture Soundtrack");
        assert_eq!(event.artist, "Radiohead");
        assert_eq!(event.album, "Kid A");
        assert_eq!(event.played_at.timestamp(), 1_705_500_000);
    }

    #[test]
    fn test_now_playing_and_undated_are_dropped() {
        assert!(raw(Some(1_705_500_000), true).into_play_event().is_none());
        assert!(raw(None, false).into_play_event().is_none());
    }

    #[test]
    fn test_bucket_key_display() {
        let key = BucketKey::new("rj", 2024, 3);
        assert_eq!(key.to_string(), "rj_week_2024_3");
    }

    #[test]
    fn test_play_event_serializes_timestamp_as_seconds() {
        let event = raw(Some(1_705_500_000), false).into_play_event().unwrap();
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"played_at\":1705500000"));
        let restored: PlayEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, event);
    }
}
