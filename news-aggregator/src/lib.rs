pub mod types;
pub mod config;
pub mod traits;
pub mod feed_utils;
pub mod sources;
pub mod strategy;
pub mod fetcher;
pub mod normalizers;
pub mod merge;
pub mod state;
pub mod store;
pub mod aggregator;
pub mod query;
pub mod verify;

pub use types::*;
pub use config::{AggregatorConfig, FetchConfig};
pub use traits::{KeyValueStore, Transport, TransportResponse};
pub use fetcher::{FetchedPayload, Fetcher, HttpTransport};
pub use strategy::Strategy;
pub use aggregator::{NewsAggregator, WatchSummary};
pub use store::{MemoryStore, SqliteStore};
pub use query::{ArticleQuery, SortOrder, SourceFilter};
