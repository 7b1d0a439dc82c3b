//! Prelude module for common verdemap types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use verdemap::prelude::*;`

pub use crate::core::{
    builder::LoaderBuilder,
    config::{ApiConfig, CacheConfig, FetchConfig, FetchOptions, LoaderConfig, LoaderProfile},
    geo::{LatLng, LatLngBounds, TileCoord},
    viewport::Viewport,
};

pub use crate::data::{
    category::Category,
    decoder::GeometryDecoder,
    feature::{Feature, Geometry},
};

pub use crate::query::{
    policy::{categories_for_zoom, PropertyTier, ZoomPolicy},
    strategy::{choose_strategy, QueryStrategy},
};

pub use crate::tiles::{
    cache::{CacheStats, TileCache, TileMetadata},
    fetcher::{CategoryFetch, FetchStatus, PaginatedFetcher},
    key::TileKey,
    loader::ViewportLoader,
    store::{FileStore, KvStore, MemoryStore},
    transport::{HttpTransport, Transport, TransportResponse},
};

pub use crate::runtime::{Clock, ManualClock, SystemClock};

pub use crate::{Error as MapError, Result};

pub use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

pub use fxhash::FxHashMap as HashMap;

pub use tokio_util::sync::CancellationToken;
