use thiserror::Error;

/// Error types for chart computation and scrobble ingestion.
///
/// Only some of these ever reach a chart caller. Source failures
/// ([`SourceUnavailable`](ChartError::SourceUnavailable), [`Api`](ChartError::Api),
/// [`Parse`](ChartError::Parse)) are absorbed by the ingestion layer, which keeps
/// whatever pages it already has. Persistence failures are absorbed by the
/// bucket store, which keeps serving from memory. Both are logged and
/// broadcast as [`ChartEvent`](crate::ChartEvent)s instead.
///
/// # Error Handling Examples
///
/// ```rust,no_run
/// use lastfm_charts::{ChartEngine, ChartError};
///
/// # async fn demo(engine: &ChartEngine) {
/// match engine.monthly_chart("rj", 2024, 13).await {
///     Ok(chart) => println!("{} entries", chart.entries.len()),
///     Err(ChartError::InvalidPeriod(msg)) => eprintln!("Bad period: {msg}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// # }
/// ```
#[derive(Error, Debug)]
pub enum ChartError {
    /// A period parameter is out of range.
    ///
    /// Returned for a month outside 1..=12, a week outside 1..=53, or week 53
    /// in an ISO year that only has 52 weeks. Values are never clamped.
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// Transport-level failure while talking to the scrobble source.
    ///
    /// Connection failures, timeouts and non-JSON error statuses end up here.
    #[error("Scrobble source unavailable: {0}")]
    SourceUnavailable(String),

    /// The scrobble source answered with an error payload.
    ///
    /// Last.fm reports errors as `{"error": <code>, "message": "..."}`, e.g.
    /// code 6 for an unknown user or code 10 for an invalid API key.
    #[error("Last.fm API error {code}: {message}")]
    Api {
        /// Last.fm error code
        code: u32,
        /// Human readable message from Last.fm
        message: String,
    },

    /// Failed to parse a response from the scrobble source.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Reading, writing or deleting the durable bucket cache failed.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Invalid or missing configuration (users, API keys, paths).
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
