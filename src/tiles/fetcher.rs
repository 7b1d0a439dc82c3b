//! Paginated category fetching
//!
//! One call walks the pages of a single category for a view: build the
//! spatial query, request pages until the budget runs out or a short page
//! shows the end of the data, retry transient failures with backoff, and stop
//! at once when the cancellation token fires. Whatever was decoded before a
//! failure is still returned.

use crate::core::config::{FetchOptions, LoaderConfig};
use crate::core::geo::LatLngBounds;
use crate::data::category::Category;
use crate::data::decoder::GeometryDecoder;
use crate::data::feature::Feature;
use crate::data::record::{decode_record, page_records, TitleLocales};
use crate::prelude::{Arc, CancellationToken};
use crate::query::policy::ZoomPolicy;
use crate::query::strategy::{choose_strategy, QueryStrategy};
use crate::runtime::async_utils::delay_or_cancel;
use crate::tiles::transport::{build_url, Transport};
use crate::{MapError, Result};
use reqwest::Url;
use serde_json::Value;

const NOT_FOUND: u16 = 404;

/// How a category fetch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Budget exhausted or the data ran out
    Complete,
    /// A page failed for good; earlier pages are kept
    Truncated,
    /// The token fired before the fetch finished
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryFetch {
    pub features: Vec<Feature>,
    /// Pages that came back successfully
    pub pages: u32,
    pub status: FetchStatus,
}

impl CategoryFetch {
    /// Only complete fetches are worth caching
    pub fn is_complete(&self) -> bool {
        self.status == FetchStatus::Complete
    }
}

enum PageOutcome {
    Records(Vec<Value>),
    Failed,
    Cancelled,
}

/// Walks the remote API's pages for one category at a time
#[derive(Clone)]
pub struct PaginatedFetcher {
    transport: Arc<dyn Transport>,
    config: LoaderConfig,
    decoder: GeometryDecoder,
}

impl std::fmt::Debug for PaginatedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedFetcher")
            .field("config", &self.config)
            .field("decoder", &self.decoder)
            .finish()
    }
}

impl PaginatedFetcher {
    pub fn new(transport: Arc<dyn Transport>, config: LoaderConfig) -> Self {
        let decoder = GeometryDecoder::new(config.cache.precision);
        Self {
            transport,
            config,
            decoder,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// URL of one page of a category query
    pub fn page_url(
        &self,
        strategy: &QueryStrategy,
        category: Category,
        page_size: u32,
        page: u32,
        language: &str,
    ) -> Result<Url> {
        let api = &self.config.api;
        let mut params = strategy.query_pairs();
        params.extend([
            ("pagesize", page_size.to_string()),
            ("pagenumber", page.to_string()),
            ("type", category.code().to_string()),
            ("active", "true".to_string()),
            ("fields", api.fields.clone()),
            ("language", language.to_string()),
        ]);
        build_url(&api.base_url, &api.resource, &params)
    }

    /// Fetch every page of `category` the zoom's budget allows.
    pub async fn fetch_category(
        &self,
        bounds: &LatLngBounds,
        zoom: f64,
        category: Category,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> CategoryFetch {
        let policy = ZoomPolicy::for_zoom(zoom);
        let page_size = options.page_size.unwrap_or(policy.page_size).max(1);
        let max_pages = options.max_pages.unwrap_or(policy.max_pages);
        let language = options
            .language
            .as_deref()
            .unwrap_or(&self.config.api.language);
        let locales = TitleLocales {
            requested: language,
            fallback: &self.config.api.default_language,
        };
        let strategy = choose_strategy(category, zoom, bounds, self.config.api.srid);

        log::debug!(
            "fetching {} at zoom {:.2} via {:?} ({} per page, up to {} pages)",
            category,
            zoom,
            strategy,
            page_size,
            max_pages
        );

        let mut features = Vec::new();
        let mut pages = 0;

        let status = loop {
            if pages >= max_pages {
                break FetchStatus::Complete;
            }
            if cancel.is_cancelled() {
                break FetchStatus::Cancelled;
            }

            let page = pages + 1;
            let url = match self.page_url(&strategy, category, page_size, page, language) {
                Ok(url) => url,
                Err(err) => {
                    log::warn!("cannot build {} page {} url: {}", category, page, err);
                    break FetchStatus::Truncated;
                }
            };

            let records = match self.fetch_page(&url, cancel).await {
                PageOutcome::Records(records) => records,
                PageOutcome::Failed => break FetchStatus::Truncated,
                PageOutcome::Cancelled => break FetchStatus::Cancelled,
            };
            pages = page;

            let received = records.len();
            features.extend(records.iter().filter_map(|record| {
                decode_record(record, category, &policy, &self.decoder, &locales)
            }));

            if received < page_size as usize || pages >= max_pages {
                break FetchStatus::Complete;
            }
            if !delay_or_cancel(self.config.fetch.inter_page_delay(), cancel).await {
                break FetchStatus::Cancelled;
            }
        };

        match status {
            FetchStatus::Cancelled => log::debug!(
                "{} fetch cancelled after {} pages",
                category,
                pages
            ),
            _ => log::debug!(
                "{} fetch finished {:?}: {} features from {} pages",
                category,
                status,
                features.len(),
                pages
            ),
        }

        CategoryFetch {
            features,
            pages,
            status,
        }
    }

    /// One page with retries. 404 reads as an empty page.
    async fn fetch_page(&self, url: &Url, cancel: &CancellationToken) -> PageOutcome {
        let max_retries = self.config.fetch.max_retries;
        let mut retry = 0;

        loop {
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return PageOutcome::Cancelled,
                response = self.transport.get(url) => response,
            };

            let failure = match response {
                Ok(response) if response.status == NOT_FOUND => {
                    log::debug!("{} not found, treating as empty page", url);
                    return PageOutcome::Records(Vec::new());
                }
                Ok(response) if response.is_success() => {
                    return match parse_page(&response.body) {
                        Some(records) => PageOutcome::Records(records),
                        None => {
                            log::warn!("unreadable page body from {}", url);
                            PageOutcome::Failed
                        }
                    };
                }
                Ok(response) if response.status >= 500 => MapError::Http(response.status),
                Ok(response) => {
                    log::warn!("{} rejected with HTTP {}", url, response.status);
                    return PageOutcome::Failed;
                }
                Err(err) => err,
            };

            if retry >= max_retries {
                log::warn!(
                    "giving up on {} after {} retries: {}",
                    url,
                    retry,
                    failure
                );
                return PageOutcome::Failed;
            }

            let delay = self.config.fetch.retry_delay(retry);
            log::debug!(
                "retrying {} in {:?} after {} (retry {} of {})",
                url,
                delay,
                failure,
                retry + 1,
                max_retries
            );
            if !delay_or_cancel(delay, cancel).await {
                return PageOutcome::Cancelled;
            }
            retry += 1;
        }
    }
}

fn parse_page(body: &str) -> Option<Vec<Value>> {
    serde_json::from_str(body).ok().and_then(page_records)
}
