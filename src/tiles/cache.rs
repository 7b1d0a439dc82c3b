use crate::core::constants::{CACHE_SCHEMA_KEY, CACHE_SCHEMA_VERSION, CACHE_TTL};
use crate::core::geo::LatLngBounds;
use crate::data::category::Category;
use crate::data::feature::Feature;
use crate::prelude::{Arc, Duration};
use crate::runtime::{Clock, SystemClock};
use crate::tiles::key::TileKey;
use crate::tiles::store::KvStore;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Where and at which zoom a cached tile was fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMetadata {
    pub bounds: LatLngBounds,
    pub zoom: f64,
    pub category: Category,
}

/// Stored form of one tile's features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub tile_key: String,
    pub z: u8,
    pub x: u32,
    pub y: u32,
    pub category: Category,
    pub features: Vec<Feature>,
    pub metadata: TileMetadata,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_records: usize,
}

/// Time-boxed tile cache over an injected [`KvStore`].
///
/// The cache never fails its callers. Without a store it is a permanent miss,
/// and store errors are logged and treated as misses or no-ops.
#[derive(Clone)]
pub struct TileCache {
    store: Option<Arc<dyn KvStore>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("enabled", &self.is_enabled())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TileCache {
    /// Open a cache over `store`, wiping it first if it was written by a
    /// different schema version.
    pub async fn open(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        if let Err(err) = ensure_schema(store.as_ref()).await {
            log::warn!("tile cache unavailable, continuing without it: {}", err);
            return Self::disabled();
        }

        Self {
            store: Some(store),
            clock,
            ttl,
        }
    }

    /// Cache with the default TTL and the system clock
    pub async fn with_store(store: Arc<dyn KvStore>) -> Self {
        Self::open(store, Arc::new(SystemClock), CACHE_TTL).await
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self {
            store: None,
            clock: Arc::new(SystemClock),
            ttl: CACHE_TTL,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached features for `key`, or `None` on a miss.
    ///
    /// Expired and undecodable records are deleted on the way out.
    pub async fn get(&self, key: &TileKey) -> Option<Vec<Feature>> {
        let store = self.store.as_ref()?;
        let key_text = key.to_string();

        let bytes = match store.get(&key_text).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("cache read for {} failed: {}", key_text, err);
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(err) => {
                log::warn!("dropping corrupt cache record {}: {}", key_text, err);
                self.delete(key).await;
                return None;
            }
        };

        let age = self.clock.now_millis().saturating_sub(record.timestamp);
        if u128::from(age) > self.ttl.as_millis() {
            log::debug!("cache record {} expired ({} ms old)", key_text, age);
            self.delete(key).await;
            return None;
        }

        Some(record.features)
    }

    /// Store `features` under `key`, replacing any existing record
    pub async fn put(&self, key: &TileKey, features: &[Feature], metadata: TileMetadata) {
        let Some(store) = self.store.as_ref() else {
            return;
        };

        let record = CacheRecord {
            tile_key: key.to_string(),
            z: key.z,
            x: key.x,
            y: key.y,
            category: key.category,
            features: features.to_vec(),
            metadata,
            timestamp: self.clock.now_millis(),
        };

        let result = match serde_json::to_vec(&record) {
            Ok(bytes) => store.put(&record.tile_key, bytes).await,
            Err(err) => Err(err.into()),
        };

        match result {
            Ok(()) => log::debug!(
                "cached {} features under {}",
                record.features.len(),
                record.tile_key
            ),
            Err(err) => log::warn!("cache write for {} failed: {}", record.tile_key, err),
        }
    }

    pub async fn delete(&self, key: &TileKey) {
        if let Some(store) = self.store.as_ref() {
            if let Err(err) = store.delete(&key.to_string()).await {
                log::warn!("cache delete for {} failed: {}", key, err);
            }
        }
    }

    /// Remove every record; the schema marker is rewritten
    pub async fn clear(&self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };

        let result = async {
            store.clear().await?;
            write_schema(store.as_ref()).await
        }
        .await;

        match result {
            Ok(()) => log::info!("tile cache cleared"),
            Err(err) => log::warn!("tile cache clear failed: {}", err),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let Some(store) = self.store.as_ref() else {
            return CacheStats::default();
        };

        match store.keys().await {
            Ok(keys) => CacheStats {
                total_records: keys.iter().filter(|key| *key != CACHE_SCHEMA_KEY).count(),
            },
            Err(err) => {
                log::warn!("tile cache stats failed: {}", err);
                CacheStats::default()
            }
        }
    }
}

async fn ensure_schema(store: &dyn KvStore) -> Result<()> {
    let stored = store
        .get(CACHE_SCHEMA_KEY)
        .await?
        .and_then(|bytes| serde_json::from_slice::<u32>(&bytes).ok());

    if stored != Some(CACHE_SCHEMA_VERSION) {
        log::info!(
            "tile cache schema {:?} does not match {}, clearing",
            stored,
            CACHE_SCHEMA_VERSION
        );
        store.clear().await?;
        write_schema(store).await?;
    }
    Ok(())
}

async fn write_schema(store: &dyn KvStore) -> Result<()> {
    store
        .put(CACHE_SCHEMA_KEY, serde_json::to_vec(&CACHE_SCHEMA_VERSION)?)
        .await
}
