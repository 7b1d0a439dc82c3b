//! Loader builder for fluent configuration
//!
//! Assembles a [`ViewportLoader`] from a configuration profile, the transport
//! used to reach the API, an optional persistent store and a clock.

use crate::{
    core::config::{LoaderConfig, LoaderProfile},
    runtime::{Clock, SystemClock},
    tiles::{
        cache::TileCache,
        fetcher::PaginatedFetcher,
        loader::ViewportLoader,
        store::{KvStore, MemoryStore},
        transport::{build_url, HttpTransport, Transport},
    },
    prelude::Arc,
    Result,
};

/// What the cache should persist into
enum StoreChoice {
    /// In-memory LRU sized from the cache config
    Memory,
    Custom(Arc<dyn KvStore>),
    Disabled,
}

/// Builder for creating and configuring [`ViewportLoader`] instances
pub struct LoaderBuilder {
    profile: LoaderProfile,
    /// Overrides applied on top of the resolved profile
    base_url: Option<String>,
    language: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    store: StoreChoice,
    clock: Option<Arc<dyn Clock>>,
}

impl LoaderBuilder {
    /// Create a new LoaderBuilder with default settings
    pub fn new() -> Self {
        Self {
            profile: LoaderProfile::default(),
            base_url: None,
            language: None,
            transport: None,
            store: StoreChoice::Memory,
            clock: None,
        }
    }

    /// Set the configuration profile
    pub fn with_profile(mut self, profile: LoaderProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Use an explicit configuration
    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.profile = LoaderProfile::Custom(config);
        self
    }

    /// Point the loader at another API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Language requested for titles unless a call overrides it
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Replace the HTTP transport, e.g. with a recording fake
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Persist the cache into `store`
    pub fn with_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = StoreChoice::Custom(store);
        self
    }

    /// Run without a cache; every load goes to the network
    pub fn without_cache(mut self) -> Self {
        self.store = StoreChoice::Disabled;
        self
    }

    /// Clock used for cache expiry
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Resolved configuration with the builder's overrides applied
    pub fn config(&self) -> LoaderConfig {
        let mut config = self.profile.resolve();
        if let Some(base_url) = &self.base_url {
            config.api.base_url = base_url.clone();
        }
        if let Some(language) = &self.language {
            config.api.language = language.clone();
        }
        config
    }

    /// Build the loader with the configured options
    pub async fn build(self) -> Result<ViewportLoader> {
        let config = self.config();

        // Reject an unusable endpoint up front rather than on every page
        build_url(&config.api.base_url, &config.api.resource, &[])?;

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new(&config.fetch)));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let cache = match self.store {
            StoreChoice::Memory => {
                let store = Arc::new(MemoryStore::new(config.cache.memory_capacity));
                TileCache::open(store, clock, config.cache.ttl()).await
            }
            StoreChoice::Custom(store) => TileCache::open(store, clock, config.cache.ttl()).await,
            StoreChoice::Disabled => TileCache::disabled(),
        };

        log::info!(
            "viewport loader ready for {}/{} (cache {})",
            config.api.base_url,
            config.api.resource,
            if cache.is_enabled() { "on" } else { "off" }
        );

        let fetcher = PaginatedFetcher::new(transport, config);
        Ok(ViewportLoader::new(fetcher, cache))
    }
}

impl Default for LoaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience methods for common loader setups
impl LoaderBuilder {
    /// Balanced defaults against `base_url`
    pub fn for_endpoint(base_url: impl Into<String>) -> Self {
        Self::new().with_base_url(base_url)
    }

    /// Fewer retries and slower paging for metered connections
    pub fn low_bandwidth(base_url: impl Into<String>) -> Self {
        Self::new()
            .with_profile(LoaderProfile::LowBandwidth)
            .with_base_url(base_url)
    }
}
