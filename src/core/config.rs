//! Configuration for the viewport loader
//!
//! A [`LoaderConfig`] groups the remote API description, the fetch/retry
//! tuning and the cache settings. Hosts either pick a [`LoaderProfile`] preset
//! or deserialize a config from JSON; every section falls back to its defaults
//! for missing fields.

use crate::core::constants::{
    CACHE_TTL, COORDINATE_PRECISION, DEFAULT_FIELDS, DEFAULT_INTER_PAGE_DELAY_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY_MS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum LoaderProfile {
    Balanced,
    LowBandwidth,
    Custom(LoaderConfig),
}

impl LoaderProfile {
    pub fn resolve(&self) -> LoaderConfig {
        match self {
            Self::Balanced => LoaderConfig::default(),
            Self::LowBandwidth => LoaderConfig {
                fetch: FetchConfig {
                    max_retries: 1,
                    retry_base_delay_ms: 2_000,
                    inter_page_delay_ms: 200,
                    ..FetchConfig::default()
                },
                cache: CacheConfig {
                    precision: 5,
                    ..CacheConfig::default()
                },
                ..LoaderConfig::default()
            },
            Self::Custom(config) => config.clone(),
        }
    }
}

impl Default for LoaderProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub api: ApiConfig,
    pub fetch: FetchConfig,
    pub cache: CacheConfig,
}

impl LoaderConfig {
    /// Parse a config from JSON, filling omitted fields with defaults
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// No pauses between pages and no waiting between retries
    pub fn for_testing() -> Self {
        Self {
            fetch: FetchConfig {
                retry_base_delay_ms: 0,
                inter_page_delay_ms: 0,
                ..FetchConfig::default()
            },
            ..Self::default()
        }
    }
}

/// Where and how to query the remote feature API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub resource: String,
    /// Locale requested when the caller does not ask for one
    pub language: String,
    /// Locale tried when a record has no title in the requested one
    pub default_language: String,
    /// Spatial reference appended to polygon queries as `;SRID=n`
    pub srid: Option<u32>,
    pub fields: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/v1".to_string(),
            resource: "UrbanGreen".to_string(),
            language: "en".to_string(),
            default_language: "en".to_string(),
            srid: Some(4326),
            fields: DEFAULT_FIELDS.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub inter_page_delay_ms: u64,
    /// Per-request client timeout; unset means a request runs until it
    /// answers or its load is cancelled
    pub request_timeout_ms: Option<u64>,
    pub user_agent: String,
}

impl FetchConfig {
    /// Backoff before retry number `retry` (0-based): base, 2 * base, 4 * base, ...
    pub fn retry_delay(&self, retry: u32) -> Duration {
        Duration::from_millis(
            self.retry_base_delay_ms
                .saturating_mul(2_u64.saturating_pow(retry)),
        )
    }

    pub fn inter_page_delay(&self) -> Duration {
        Duration::from_millis(self.inter_page_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            inter_page_delay_ms: DEFAULT_INTER_PAGE_DELAY_MS,
            request_timeout_ms: None,
            user_agent: concat!("verdemap/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// Decimal digits kept on decoded coordinates
    pub precision: u32,
    /// Entry limit of the in-memory store
    pub memory_capacity: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: CACHE_TTL.as_secs(),
            precision: COORDINATE_PRECISION,
            memory_capacity: 2048,
        }
    }
}

/// Per-call overrides for a viewport load
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    pub language: Option<String>,
    pub page_size: Option<u32>,
    pub max_pages: Option<u32>,
}

impl FetchOptions {
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }
}
