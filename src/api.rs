use crate::types::{EventPage, RawScrobble, TrackInfo};
use crate::{ChartError, Result};
use async_trait::async_trait;
use http_client::{HttpClient, Request};
use http_types::{Method, Url};
use serde::Deserialize;
use std::sync::Arc;

/// Default Last.fm web service endpoint.
pub const DEFAULT_API_URL: &str = "https://ws.audioscrobbler.com/2.0/";

/// Largest page size `user.getrecenttracks` accepts.
pub const MAX_PAGE_SIZE: u32 = 200;

// =============================================================================
// ScrobbleSource trait
// =============================================================================

/// A paginated log of a user's scrobbles.
///
/// This is the only thing the chart engine needs from Last.fm, which keeps the
/// engine testable with in-memory fakes or, with the `mock` feature enabled,
/// `MockScrobbleSource`.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait(?Send)]
pub trait ScrobbleSource {
    /// Fetch one page of scrobbles played between `from` and `to` (Unix
    /// seconds, inclusive), in the order the source reports them.
    async fn list_events(
        &self,
        user: &str,
        from: i64,
        to: i64,
        page: u32,
        page_size: u32,
    ) -> Result<EventPage>;

    /// The most recent scrobble with a settled timestamp, if the user has any.
    async fn latest_event(&self, user: &str) -> Result<Option<RawScrobble>>;
}

// =============================================================================
// LastFmApiClient
// =============================================================================

/// [`ScrobbleSource`] backed by the public Last.fm web API.
///
/// # Examples
///
/// ```rust,no_run
/// use lastfm_charts::{LastFmApiClient, ScrobbleSource};
///
/// # tokio_test::block_on(async {
/// let http_client = http_client::native::NativeClient::new();
/// let client = LastFmApiClient::new(Box::new(http_client), "my-api-key".to_string());
///
/// let page = client.list_events("rj", 1705276800, 1705881599, 1, 200).await?;
/// println!("{} scrobbles on page 1 of {}", page.events.len(), page.total_pages);
/// # Ok::<(), lastfm_charts::ChartError>(())
/// # });
/// ```
#[derive(Clone)]
pub struct LastFmApiClient {
    client: Arc<dyn HttpClient + Send + Sync>,
    api_key: String,
    base_url: String,
}

impl LastFmApiClient {
    pub fn new(client: Box<dyn HttpClient + Send + Sync>, api_key: String) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_API_URL.to_string())
    }

    /// Create a client against a different endpoint, e.g. a local test server.
    pub fn with_base_url(
        client: Box<dyn HttpClient + Send + Sync>,
        api_key: String,
        base_url: String,
    ) -> Self {
        Self {
            client: Arc::from(client),
            api_key,
            base_url,
        }
    }

    /// Global statistics for a track (`track.getInfo`).
    pub async fn track_info(&self, artist: &str, track: &str) -> Result<TrackInfo> {
        let url = format!(
            "{}?method=track.getInfo&artist={}&track={}&api_key={}&format=json",
            self.base_url,
            urlencoding::encode(artist),
            urlencoding::encode(track),
            urlencoding::encode(&self.api_key),
        );
        let body = self.get(&url).await?;
        parse_track_info_response(&body)
    }

    async fn get(&self, url: &str) -> Result<String> {
        let url = url
            .parse::<Url>()
            .map_err(|e| ChartError::SourceUnavailable(format!("Invalid request URL: {e}")))?;

        log::debug!("GET {}", redact_api_key(url.as_str()));
        let request_start = std::time::Instant::now();

        let request = Request::new(Method::Get, url);
        let mut response = self
            .client
            .send(request)
            .await
            .map_err(|e| ChartError::SourceUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .body_string()
            .await
            .map_err(|e| ChartError::SourceUnavailable(e.to_string()))?;

        log::debug!(
            "Response {} after {}ms ({} bytes)",
            status,
            request_start.elapsed().as_millis(),
            body.len()
        );

        // Last.fm reports failures as a JSON body, usually with a 4xx status
        if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
            return Err(ChartError::Api {
                code: error.error,
                message: error.message,
            });
        }
        if !status.is_success() {
            return Err(ChartError::SourceUnavailable(format!("HTTP {status}")));
        }

        Ok(body)
    }
}

#[async_trait(?Send)]
impl ScrobbleSource for LastFmApiClient {
    async fn list_events(
        &self,
        user: &str,
        from: i64,
        to: i64,
        page: u32,
        page_size: u32,
    ) -> Result<EventPage> {
        let url = format!(
            "{}?method=user.getrecenttracks&user={}&api_key={}&format=json&from={}&to={}&limit={}&page={}",
            self.base_url,
            urlencoding::encode(user),
            urlencoding::encode(&self.api_key),
            from,
            to,
            page_size.min(MAX_PAGE_SIZE),
            page
        );
        let body = self.get(&url).await?;
        parse_recent_tracks_response(&body)
    }

    async fn latest_event(&self, user: &str) -> Result<Option<RawScrobble>> {
        let url = format!(
            "{}?method=user.getrecenttracks&user={}&api_key={}&format=json&limit=1&page=1",
            self.base_url,
            urlencoding::encode(user),
            urlencoding::encode(&self.api_key),
        );
        let body = self.get(&url).await?;
        let page = parse_recent_tracks_response(&body)?;

        // With limit=1 Last.fm still prepends the now-playing track
        Ok(page
            .events
            .into_iter()
            .find(|event| !event.now_playing && event.timestamp.is_some()))
    }
}

fn redact_api_key(url: &str) -> String {
    match url.find("api_key=") {
        Some(start) => {
            let value_start = start + "api_key=".len();
            let value_end = url[value_start..]
                .find('&')
                .map(|offset| value_start + offset)
                .unwrap_or(url.len());
            format!("{}***{}", &url[..value_start], &url[value_end..])
        }
        None => url.to_string(),
    }
}

// =============================================================================
// Response parsing
// =============================================================================

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: u32,
    #[serde(default)]
    message: String,
}

/// Last.fm collapses single-element lists into a bare object.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Counts arrive as strings in most responses and as numbers in a few.
#[derive(Deserialize)]
#[serde(untagged)]
enum ApiNumber {
    Number(u64),
    Text(String),
}

impl ApiNumber {
    fn as_u64(&self) -> Option<u64> {
        match self {
            ApiNumber::Number(n) => Some(*n),
            ApiNumber::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize)]
struct ApiRecentTracksResponse {
    recenttracks: ApiRecentTracks,
}

#[derive(Deserialize)]
struct ApiRecentTracks {
    #[serde(default)]
    track: OneOrMany<ApiTrack>,
    #[serde(rename = "@attr")]
    attr: ApiPaginationAttr,
}

#[derive(Deserialize)]
struct ApiTrack {
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist: ApiTextField,
    #[serde(default)]
    album: ApiTextField,
    date: Option<ApiDate>,
    #[serde(rename = "@attr")]
    attr: Option<ApiTrackAttr>,
}

#[derive(Deserialize, Default)]
struct ApiTextField {
    #[serde(rename = "#text", default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiDate {
    uts: ApiNumber,
}

#[derive(Deserialize)]
struct ApiTrackAttr {
    nowplaying: Option<String>,
}

#[derive(Deserialize)]
struct ApiPaginationAttr {
    page: ApiNumber,
    #[serde(rename = "totalPages")]
    total_pages: ApiNumber,
}

/// Parse a `user.getrecenttracks` JSON body into an [`EventPage`].
///
/// Entries are kept in source order and are not filtered; settling happens
/// in [`RawScrobble::into_play_event`].
pub fn parse_recent_tracks_response(json: &str) -> Result<EventPage> {
    let response: ApiRecentTracksResponse =
        serde_json::from_str(json).map_err(|e| ChartError::Parse(e.to_string()))?;

    let page = response.recenttracks.attr.page.as_u64().unwrap_or(1) as u32;
    let total_pages = response.recenttracks.attr.total_pages.as_u64().unwrap_or(1) as u32;

    let events = response
        .recenttracks
        .track
        .into_vec()
        .into_iter()
        .map(|t| RawScrobble {
            now_playing: t
                .attr
                .as_ref()
                .and_then(|attr| attr.nowplaying.as_deref())
                == Some("true"),
            timestamp: t
                .date
                .as_ref()
                .and_then(|date| date.uts.as_u64())
                .map(|uts| uts as i64),
            track_title: t.name,
            artist: t.artist.text,
            album: t.album.text,
        })
        .collect();

    Ok(EventPage {
        events,
        page,
        total_pages,
    })
}

#[derive(Deserialize)]
struct ApiTrackInfoResponse {
    track: ApiTrackInfo,
}

#[derive(Deserialize)]
struct ApiTrackInfo {
    name: String,
    artist: ApiTrackInfoArtist,
    album: Option<ApiTrackInfoAlbum>,
    listeners: Option<ApiNumber>,
    playcount: Option<ApiNumber>,
    duration: Option<ApiNumber>,
    toptags: Option<ApiTopTags>,
}

#[derive(Deserialize)]
struct ApiTrackInfoArtist {
    name: String,
}

#[derive(Deserialize)]
struct ApiTrackInfoAlbum {
    title: String,
}

#[derive(Deserialize)]
struct ApiTopTags {
    #[serde(default)]
    tag: OneOrMany<ApiTag>,
}

#[derive(Deserialize)]
struct ApiTag {
    name: String,
}

/// Parse a `track.getInfo` JSON body.
pub fn parse_track_info_response(json: &str) -> Result<TrackInfo> {
    let response: ApiTrackInfoResponse =
        serde_json::from_str(json).map_err(|e| ChartError::Parse(e.to_string()))?;
    let track = response.track;

    Ok(TrackInfo {
        name: track.name,
        artist: track.artist.name,
        album: track.album.map(|album| album.title),
        listeners: track.listeners.and_then(|n| n.as_u64()),
        playcount: track.playcount.and_then(|n| n.as_u64()),
        duration_ms: track
            .duration
            .and_then(|n| n.as_u64())
            .filter(|&ms| ms > 0),
        tags: track
            .toptags
            .map(|tags| tags.tag.into_vec().into_iter().map(|t| t.name).collect())
            .unwrap_or_default(),
    })
}
