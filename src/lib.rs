pub mod api;
pub mod cache;
pub mod chart;
pub mod config;
pub mod error;
pub mod events;
pub mod ingest;
pub mod period;
pub mod persistence;
pub mod types;

pub use api::{LastFmApiClient, ScrobbleSource};
pub use cache::BucketStore;
pub use chart::{
    rank_plays, roll_up, ChartEngine, MONTHLY_CHART_SIZE, WEEKLY_CHART_SIZE, YEARLY_CHART_SIZE,
};
pub use config::{ChartsConfig, UserCredentials};
pub use error::ChartError;
pub use events::{ChartEvent, ChartEventReceiver, SharedEventBroadcaster};
pub use ingest::{fetch_events, FetchOptions};
pub use period::{Granularity, Period};
pub use persistence::{BucketMap, BucketPersistence, JsonFilePersistence, MemoryPersistence};
pub use types::{BucketKey, Chart, ChartEntry, EventPage, PlayEvent, RawScrobble, TrackInfo};

#[cfg(feature = "mock")]
pub use api::MockScrobbleSource;

pub type Result<T> = std::result::Result<T, ChartError>;
