//! Engine-wide constants for the viewport loader.
//! Keeping them in a single place makes it easier to tweak the magic numbers
//! the remote API and the cache depend on.

use std::time::Duration;

/// Mean Earth radius used for viewport radius queries, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Latitude limit of the Web Mercator tile grid.
pub const MAX_LATITUDE: f64 = 85.0511287798;

/// Highest integer zoom a tile key is computed at.
pub const MAX_TILE_ZOOM: u8 = 22;

/// Version prefix of every tile key. Bumping it orphans all cached tiles.
pub const TILE_KEY_SCHEME: &str = "v1";

/// Schema version of persisted cache records.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Store keys under this prefix hold bookkeeping, not tiles.
pub const RESERVED_KEY_PREFIX: &str = "__";

/// Store key holding the cache schema version marker.
pub const CACHE_SCHEMA_KEY: &str = "__schema_version";

/// How long a cached tile stays valid.
pub const CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Decimal digits kept on every produced coordinate (~0.11 m).
pub const COORDINATE_PRECISION: u32 = 6;

/// Radius cap applied to low-zoom radius queries.
pub const MAX_QUERY_RADIUS_M: u32 = 20_000;

/// Zoom at or below which every query is a radius query.
pub const RADIUS_QUERY_MAX_ZOOM: f64 = 10.0;

/// Radius for point-like categories at zoom >= 13 and below it.
pub const POINT_CATEGORY_RADIUS_NEAR_M: u32 = 1_500;
pub const POINT_CATEGORY_RADIUS_FAR_M: u32 = 3_000;

/// Viewport shrink factors for polygon queries below and from zoom 13.
pub const POLYGON_SHRINK_FAR: f64 = 0.6;
pub const POLYGON_SHRINK_NEAR: f64 = 0.8;

/// Number of retries after the first attempt of a page request.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// First retry delay; each further retry doubles it.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Pause between successful pages.
pub const DEFAULT_INTER_PAGE_DELAY_MS: u64 = 50;

/// Fields requested from the remote API for every record.
pub const DEFAULT_FIELDS: &str = "Id,Type,Code,Active,Shortname,Detail,Geo";
