//! # verdemap
//!
//! Viewport-driven data loading for map clients that sit in front of a
//! paginated feature API without tiling or spatial-index support.
//!
//! The crate decides which remote query to issue for a map view, how much of
//! it to page through, how to decode and simplify the WKT geometries that come
//! back, and how to cache and coalesce that work while the view keeps moving.

pub mod core;
pub mod data;
pub mod prelude;
pub mod query;
pub mod runtime;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    builder::LoaderBuilder,
    config::{FetchOptions, LoaderConfig, LoaderProfile},
    geo::{LatLng, LatLngBounds, TileCoord},
    viewport::Viewport,
};

pub use data::{
    category::Category,
    decoder::GeometryDecoder,
    feature::{Feature, Geometry},
};

pub use query::{
    policy::{categories_for_zoom, ZoomPolicy},
    strategy::{choose_strategy, QueryStrategy},
};

pub use tiles::{
    cache::{CacheStats, TileCache},
    fetcher::{CategoryFetch, FetchStatus, PaginatedFetcher},
    key::TileKey,
    loader::ViewportLoader,
    store::{FileStore, KvStore, MemoryStore},
    transport::{HttpTransport, Transport, TransportResponse},
};

pub use runtime::{Clock, ManualClock, SystemClock};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Invalid tile key: {0}")]
    InvalidTileKey(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for MapError {
    fn from(err: reqwest::Error) -> Self {
        MapError::Network(err.to_string())
    }
}

/// Error type alias for convenience
pub type Error = MapError;
