//! Weekly, monthly and yearly charts.
//!
//! Only weekly charts are computed from plays. A monthly chart sums the
//! points and play counts of the weekly charts inside the month, and a yearly
//! chart sums the monthly charts. Only plays inside a month count towards it,
//! so a week straddling two months is split between them. Because every
//! lower-level chart is already truncated, a track that missed a week's top 20
//! contributes nothing for that week to the month, even if it was played.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::BucketStore;
use crate::events::{ChartEventReceiver, SharedEventBroadcaster};
use crate::period::{
    month_interval, week_interval, weeks_overlapping_month, Granularity, Period,
};
use crate::types::{Chart, ChartEntry, PlayEvent};
use crate::Result;

/// Entries in a weekly chart.
pub const WEEKLY_CHART_SIZE: usize = 20;
/// Entries in a monthly chart.
pub const MONTHLY_CHART_SIZE: usize = 30;
/// Entries in a yearly chart.
pub const YEARLY_CHART_SIZE: usize = 50;

/// Computes charts for any user, backed by a [`BucketStore`].
///
/// # Examples
///
/// ```rust,no_run
/// use lastfm_charts::{BucketStore, ChartEngine, FetchOptions, LastFmApiClient, MemoryPersistence};
///
/// # tokio_test::block_on(async {
/// let http_client = http_client::native::NativeClient::new();
/// let source = LastFmApiClient::new(Box::new(http_client), "api-key".to_string());
/// let store = BucketStore::open(
///     Box::new(source),
///     Box::new(MemoryPersistence::new()),
///     FetchOptions::default(),
/// );
/// let engine = ChartEngine::new(store);
///
/// let chart = engine.monthly_chart("rj", 2024, 1).await?;
/// for entry in &chart.entries {
///     println!("{:>2}. {} - {} ({} pts)", entry.rank, entry.artist, entry.track_title, entry.points);
/// }
/// # Ok::<(), lastfm_charts::ChartError>(())
/// # });
/// ```
pub struct ChartEngine {
    store: BucketStore,
}

impl ChartEngine {
    pub fn new(store: BucketStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &BucketStore {
        &self.store
    }

    pub fn broadcaster(&self) -> &Arc<SharedEventBroadcaster> {
        self.store.broadcaster()
    }

    pub fn subscribe(&self) -> ChartEventReceiver {
        self.store.subscribe()
    }

    /// Top 20 tracks of an ISO week by play count.
    ///
    /// Ties keep the order in which the tracks were first seen in the source.
    /// Rank 1 scores 20 points, rank 20 scores 1.
    pub async fn weekly_chart(&self, user: &str, iso_year: i32, iso_week: u32) -> Result<Chart> {
        let period = Period::week(iso_year, iso_week)?;
        let events = self.store.get(user, iso_year, iso_week).await?;
        Ok(Chart::new(period, rank_plays(&events, WEEKLY_CHART_SIZE)))
    }

    /// Top 30 tracks of a calendar month, rolled up from weekly charts.
    ///
    /// Every ISO week that overlaps the month is looked up, except weeks that
    /// have not started yet. A week straddling the month boundary is ranked
    /// over its in-month plays only; weeks without any are skipped.
    pub async fn monthly_chart(&self, user: &str, year: i32, month: u32) -> Result<Chart> {
        let period = Period::month(year, month)?;
        let (from, to) = month_interval(year, month)?;
        let now = Utc::now();

        let mut weekly_charts = Vec::new();
        for (iso_year, iso_week) in weeks_overlapping_month(year, month)? {
            let (week_start, _) = week_interval(iso_year, iso_week)?;
            if week_start > now {
                log::debug!("Skipping {iso_year}-W{iso_week:02}, it has not started yet");
                break;
            }

            let events = self.store.get(user, iso_year, iso_week).await?;
            let in_month: Vec<PlayEvent> = events
                .into_iter()
                .filter(|event| event.played_at >= from && event.played_at < to)
                .collect();
            if in_month.is_empty() {
                log::debug!("No plays of {user} in {period} during {iso_year}-W{iso_week:02}");
                continue;
            }
            weekly_charts.push(rank_plays(&in_month, WEEKLY_CHART_SIZE));
        }

        Ok(Chart::new(
            period,
            roll_up(weekly_charts.iter().map(Vec::as_slice), MONTHLY_CHART_SIZE),
        ))
    }

    /// Top 50 tracks of a calendar year, rolled up from monthly charts.
    ///
    /// Months that have not started yet are skipped.
    pub async fn yearly_chart(&self, user: &str, year: i32) -> Result<Chart> {
        let now = Utc::now();

        let mut monthly_charts = Vec::new();
        for month in 1..=12 {
            let (month_start, _) = month_interval(year, month)?;
            if month_start > now {
                break;
            }
            let chart = self.monthly_chart(user, year, month).await?;
            if !chart.is_empty() {
                monthly_charts.push(chart.entries);
            }
        }

        Ok(Chart::new(
            Period::year(year),
            roll_up(monthly_charts.iter().map(Vec::as_slice), YEARLY_CHART_SIZE),
        ))
    }

    /// Chart for any period.
    pub async fn chart(&self, user: &str, period: Period) -> Result<Chart> {
        match period {
            Period::Week { iso_year, iso_week } => self.weekly_chart(user, iso_year, iso_week).await,
            Period::Month { year, month } => self.monthly_chart(user, year, month).await,
            Period::Year { year } => self.yearly_chart(user, year).await,
        }
    }

    /// The period of `granularity` containing the user's most recent play.
    ///
    /// `None` when the user has never scrobbled anything. Unlike chart
    /// requests this asks the source directly and propagates its errors.
    pub async fn latest_period(
        &self,
        user: &str,
        granularity: Granularity,
    ) -> Result<Option<Period>> {
        let latest = self
            .store
            .source()
            .latest_event(user)
            .await?
            .and_then(|raw| raw.into_play_event());

        Ok(latest.map(|event| Period::containing(granularity, event.played_at)))
    }

    /// Drop all cached weeks so the next chart request refetches them.
    pub async fn clear_cache(&self) -> Result<()> {
        self.store.clear().await
    }
}

struct Tally<'a> {
    track_title: &'a str,
    artist: &'a str,
    album: &'a str,
    play_count: u32,
    points: u32,
}

impl Tally<'_> {
    fn into_entry(self, rank: usize, points: u32) -> ChartEntry {
        ChartEntry {
            track_title: self.track_title.to_string(),
            artist: self.artist.to_string(),
            album: self.album.to_string(),
            play_count: self.play_count,
            points,
            rank: rank as u32,
        }
    }
}

/// Rank plays by play count and score the top `limit` tracks.
///
/// Tracks are grouped by `(track_title, artist)`; the album comes from the
/// first play of each track. The sort is stable, so equal counts keep
/// first-seen order. Rank `r` scores `limit + 1 - r` points.
pub fn rank_plays(events: &[PlayEvent], limit: usize) -> Vec<ChartEntry> {
    let mut tallies: Vec<Tally<'_>> = Vec::new();
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();

    for event in events {
        let key = (event.track_title.as_str(), event.artist.as_str());
        match index.get(&key).copied() {
            Some(i) => tallies[i].play_count += 1,
            None => {
                index.insert(key, tallies.len());
                tallies.push(Tally {
                    track_title: &event.track_title,
                    artist: &event.artist,
                    album: &event.album,
                    play_count: 1,
                    points: 0,
                });
            }
        }
    }

    tallies.sort_by(|a, b| b.play_count.cmp(&a.play_count));
    tallies.truncate(limit);

    tallies
        .into_iter()
        .enumerate()
        .map(|(i, tally)| tally.into_entry(i + 1, (limit - i) as u32))
        .collect()
}

/// Merge already-ranked charts into one chart of at most `limit` entries.
///
/// Points and play counts are summed per `(track_title, artist)` over the
/// charts the track appears in. The result is ordered by points, then play
/// count, then first appearance; points are kept as summed, not reassigned.
pub fn roll_up<'a>(
    charts: impl IntoIterator<Item = &'a [ChartEntry]>,
    limit: usize,
) -> Vec<ChartEntry> {
    let mut tallies: Vec<Tally<'a>> = Vec::new();
    let mut index: HashMap<(&'a str, &'a str), usize> = HashMap::new();

    for chart in charts {
        for entry in chart {
            let key = (entry.track_title.as_str(), entry.artist.as_str());
            match index.get(&key).copied() {
                Some(i) => {
                    tallies[i].play_count += entry.play_count;
                    tallies[i].points += entry.points;
                }
                None => {
                    index.insert(key, tallies.len());
                    tallies.push(Tally {
                        track_title: &entry.track_title,
                        artist: &entry.artist,
                        album: &entry.album,
                        play_count: entry.play_count,
                        points: entry.points,
                    });
                }
            }
        }
    }

    tallies.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| b.play_count.cmp(&a.play_count))
    });
    tallies.truncate(limit);

    tallies
        .into_iter()
        .enumerate()
        .map(|(i, tally)| {
            let points = tally.points;
            tally.into_entry(i + 1, points)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    /// Plays in the given order, one minute apart, starting Monday of 2024-W03.
    fn plays(titles: &[(&str, &str)]) -> Vec<PlayEvent> {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        titles
            .iter()
            .enumerate()
            .map(|(i, (title, album))| {
                PlayEvent::new(*title, "Artist", *album, start + Duration::minutes(i as i64))
            })
            .collect()
    }

    fn entry(title: &str, play_count: u32, points: u32, rank: u32) -> ChartEntry {
        ChartEntry {
            track_title: title.to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            play_count,
            points,
            rank,
        }
    }

    #[test]
    fn test_rank_plays_counts_and_scores() {
        let events = plays(&[
            ("b", "Album"),
            ("a", "Album"),
            ("a", "Album"),
            ("c", "Album"),
            ("a", "Album"),
            ("c", "Album"),
        ]);

        let chart = rank_plays(&events, WEEKLY_CHART_SIZE);

        assert_eq!(
            chart,
            vec![
                entry("a", 3, 20, 1),
                entry("c", 2, 19, 2),
                entry("b", 1, 18, 3)
            ]
        );
    }

    #[test]
    fn test_rank_plays_ties_keep_first_seen_order() {
        let events = plays(&[("x", "Album"), ("y", "Album"), ("y", "Album"), ("x", "Album")]);
        let chart = rank_plays(&events, WEEKLY_CHART_SIZE);
        assert_eq!(chart[0].track_title, "x");
        assert_eq!(chart[1].track_title, "y");
    }

    #[test]
    fn test_rank_plays_uses_first_album_and_artist_identity() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        let events = vec![
            PlayEvent::new("Intro", "The xx", "xx", start),
            PlayEvent::new("Intro", "The xx", "xx (Deluxe)", start + Duration::minutes(5)),
            PlayEvent::new("Intro", "M83", "Hurry Up, We're Dreaming", start + Duration::minutes(9)),
        ];

        let chart = rank_plays(&events, WEEKLY_CHART_SIZE);

        assert_eq!(chart.len(), 2);
        assert_eq!(chart[0].artist, "The xx");
        assert_eq!(chart[0].album, "xx");
        assert_eq!(chart[0].play_count, 2);
        assert_eq!(chart[1].artist, "M83");
    }

    #[test]
    fn test_rank_plays_truncates_to_limit() {
        let titles: Vec<String> = (0..25).map(|i| format!("track {i}")).collect();
        let pairs: Vec<(&str, &str)> = titles.iter().map(|t| (t.as_str(), "Album")).collect();

        let chart = rank_plays(&plays(&pairs), WEEKLY_CHART_SIZE);

        assert_eq!(chart.len(), 20);
        for (i, entry) in chart.iter().enumerate() {
            assert_eq!(entry.rank, i as u32 + 1);
            assert_eq!(entry.points, 21 - entry.rank);
        }
        assert_eq!(chart[19].track_title, "track 19");
    }

    #[test]
    fn test_rank_plays_empty() {
        assert!(rank_plays(&[], WEEKLY_CHART_SIZE).is_empty());
    }

    #[test]
    fn test_roll_up_sums_and_orders_by_points_then_plays() {
        let week1 = vec![entry("a", 5, 20, 1), entry("b", 4, 19, 2)];
        let week2 = vec![entry("b", 2, 20, 1), entry("c", 9, 19, 2)];
        let week3 = vec![entry("c", 1, 20, 1)];

        let month = roll_up(
            [week1.as_slice(), week2.as_slice(), week3.as_slice()],
            MONTHLY_CHART_SIZE,
        );

        // b: 39 pts / 6 plays, c: 39 pts / 10 plays, a: 20 pts
        assert_eq!(
            month,
            vec![
                entry("c", 10, 39, 1),
                entry("b", 6, 39, 2),
                entry("a", 5, 20, 3)
            ]
        );
    }

    #[test]
    fn test_roll_up_full_ties_keep_first_appearance() {
        let week1 = vec![entry("late", 3, 20, 1)];
        let week2 = vec![entry("later", 3, 20, 1)];

        let month = roll_up([week1.as_slice(), week2.as_slice()], MONTHLY_CHART_SIZE);

        assert_eq!(month[0].track_title, "late");
        assert_eq!(month[1].track_title, "later");
    }

    #[test]
    fn test_roll_up_truncates_and_keeps_album_of_first_chart() {
        let mut week1: Vec<ChartEntry> = (0..20)
            .map(|i| entry(&format!("t{i}"), 1, 20 - i, i + 1))
            .collect();
        week1[0].album = "Original".to_string();
        let mut week2: Vec<ChartEntry> = (10..30)
            .map(|i| entry(&format!("t{i}"), 1, 30 - i, i - 9))
            .collect();
        week2[0].album = "Reissue".to_string();

        let month = roll_up([week1.as_slice(), week2.as_slice()], MONTHLY_CHART_SIZE);

        assert_eq!(month.len(), 30);
        let t10 = month.iter().find(|e| e.track_title == "t10").unwrap();
        assert_eq!(t10.points, 10 + 20);
        assert_eq!(t10.play_count, 2);
        assert_eq!(t10.album, "Album");
        let t0 = month.iter().find(|e| e.track_title == "t0").unwrap();
        assert_eq!(t0.album, "Original");
    }
}
