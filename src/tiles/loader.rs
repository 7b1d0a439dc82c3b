//! Viewport loading orchestration
//!
//! Every call to [`ViewportLoader::load_viewport_data`] supersedes the one
//! before it: the previous call's token is cancelled and a generation counter
//! is bumped so a late finisher can tell that nobody wants its result anymore.
//! Work is split per category. Each category is served from the tile cache
//! when possible, otherwise from a fetch that runs in its own task and is
//! shared by every caller asking for the same tile key while it runs. A new
//! load joins the fetches it needs before it cancels its predecessor.

use crate::core::config::FetchOptions;
use crate::core::viewport::Viewport;
use crate::data::category::Category;
use crate::data::feature::Feature;
use crate::prelude::{Arc, CancellationToken, HashMap, Mutex};
use crate::query::policy::categories_for_zoom;
use crate::tiles::cache::{CacheStats, TileCache, TileMetadata};
use crate::tiles::fetcher::PaginatedFetcher;
use crate::tiles::key::TileKey;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{MutexGuard, PoisonError};

type SharedFetch = Shared<BoxFuture<'static, Arc<Vec<Feature>>>>;

/// A running fetch and the callers waiting on it
struct InFlight {
    id: u64,
    result: SharedFetch,
    cancel: CancellationToken,
    waiters: usize,
}

struct LoaderInner {
    fetcher: PaginatedFetcher,
    cache: TileCache,
    in_flight: Mutex<HashMap<TileKey, InFlight>>,
    next_fetch_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes the in-flight entry when the fetch task ends, however it ends
struct InFlightGuard {
    inner: Arc<LoaderInner>,
    key: TileKey,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut in_flight = lock(&self.inner.in_flight);
        if in_flight.get(&self.key).is_some_and(|entry| entry.id == self.id) {
            in_flight.remove(&self.key);
        }
    }
}

/// One caller's interest in a shared fetch, released on drop
struct Interest<'a> {
    inner: &'a LoaderInner,
    key: TileKey,
    id: u64,
}

impl Drop for Interest<'_> {
    fn drop(&mut self) {
        let mut in_flight = lock(&self.inner.in_flight);
        let Some(entry) = in_flight.get_mut(&self.key) else {
            return;
        };
        if entry.id != self.id {
            return;
        }

        entry.waiters = entry.waiters.saturating_sub(1);
        if entry.waiters == 0 && !entry.cancel.is_cancelled() {
            log::debug!("no callers left for {}, cancelling its fetch", self.key);
            entry.cancel.cancel();
        }
    }
}

/// A counted place among the callers of a running fetch
struct Joined<'a> {
    result: SharedFetch,
    interest: Interest<'a>,
}

enum Claim<'a> {
    Wait(Joined<'a>),
    /// A fetch nobody wants anymore is still winding down
    Retired(SharedFetch),
}

/// Loads the features of a view, category by category
pub struct ViewportLoader {
    inner: Arc<LoaderInner>,
    generation: AtomicU64,
    current: Mutex<CancellationToken>,
}

impl std::fmt::Debug for ViewportLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportLoader")
            .field("generation", &self.generation())
            .field("in_flight", &self.in_flight_count())
            .field("cache", &self.inner.cache)
            .finish()
    }
}

impl ViewportLoader {
    pub fn new(fetcher: PaginatedFetcher, cache: TileCache) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                fetcher,
                cache,
                in_flight: Mutex::new(HashMap::default()),
                next_fetch_id: AtomicU64::new(0),
            }),
            generation: AtomicU64::new(0),
            current: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn cache(&self) -> &TileCache {
        &self.inner.cache
    }

    pub fn fetcher(&self) -> &PaginatedFetcher {
        &self.inner.fetcher
    }

    /// Generation of the most recent load
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Fetches currently running, for diagnostics
    pub fn in_flight_count(&self) -> usize {
        lock(&self.inner.in_flight).len()
    }

    /// Features for `viewport`, or `None` if a newer load started meanwhile.
    ///
    /// With no `category` the zoom decides which categories are loaded.
    /// Failures never surface: a category that cannot be loaded contributes
    /// no features.
    pub async fn load_viewport_data(
        &self,
        viewport: &Viewport,
        category: Option<Category>,
        options: &FetchOptions,
    ) -> Option<Vec<Feature>> {
        let categories = match category {
            Some(category) => vec![category],
            None => categories_for_zoom(viewport.zoom),
        };
        let keys: Vec<TileKey> = categories
            .iter()
            .map(|&category| TileKey::new(viewport, category))
            .collect();

        // Running fetches are joined before the previous load is cancelled,
        // so a fetch both loads need never drops to zero waiters.
        let joined: Vec<Option<Joined<'_>>> =
            keys.iter().map(|&key| self.join_running(key)).collect();
        let (generation, token) = self.begin_load();

        log::debug!(
            "load #{} at zoom {:.2}: {:?}",
            generation,
            viewport.zoom,
            categories
        );

        let results = futures::future::join_all(
            keys.into_iter()
                .zip(joined)
                .map(|(key, joined)| self.load_category(key, joined, viewport, options, &token)),
        )
        .await;

        if self.generation() != generation {
            log::debug!("load #{} superseded, discarding its result", generation);
            return None;
        }

        let total = results.iter().map(|features| features.len()).sum();
        let mut features = Vec::with_capacity(total);
        for batch in &results {
            features.extend(batch.iter().cloned());
        }
        log::debug!("load #{} returned {} features", generation, features.len());
        Some(features)
    }

    /// Cancel the current load; it will resolve to `None`
    pub fn cancel(&self) {
        let mut current = lock(&self.current);
        self.generation.fetch_add(1, Ordering::SeqCst);
        current.cancel();
    }

    pub async fn clear_cache(&self) {
        self.inner.cache.clear().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats().await
    }

    fn begin_load(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let mut current = lock(&self.current);
        let previous = std::mem::replace(&mut *current, token.clone());
        previous.cancel();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        (generation, token)
    }

    async fn load_category(
        &self,
        key: TileKey,
        joined: Option<Joined<'_>>,
        viewport: &Viewport,
        options: &FetchOptions,
        token: &CancellationToken,
    ) -> Arc<Vec<Feature>> {
        if let Some(joined) = joined {
            return wait_for(joined, key, token).await;
        }

        loop {
            if let Some(features) = self.inner.cache.get(&key).await {
                log::debug!("cache hit for {} ({} features)", key, features.len());
                return Arc::new(features);
            }
            if token.is_cancelled() {
                return Arc::default();
            }

            match self.claim(key, viewport, options) {
                Claim::Wait(joined) => return wait_for(joined, key, token).await,
                Claim::Retired(result) => {
                    log::debug!("fetch for {} is winding down, restarting after it", key);
                    tokio::select! {
                        biased;
                        _ = result => {}
                        _ = token.cancelled() => return Arc::default(),
                    }
                }
            }
        }
    }

    /// Count in as a waiter on the live fetch for `key`, if there is one
    fn join_running(&self, key: TileKey) -> Option<Joined<'_>> {
        let mut in_flight = lock(&self.inner.in_flight);
        let entry = in_flight.get_mut(&key)?;
        if entry.cancel.is_cancelled() {
            return None;
        }
        Some(self.join(key, entry))
    }

    fn join(&self, key: TileKey, entry: &mut InFlight) -> Joined<'_> {
        entry.waiters += 1;
        log::debug!("joining fetch for {} ({} waiting)", key, entry.waiters);
        Joined {
            result: entry.result.clone(),
            interest: Interest {
                inner: &self.inner,
                key,
                id: entry.id,
            },
        }
    }

    /// Join the running fetch for `key` or start one
    fn claim(&self, key: TileKey, viewport: &Viewport, options: &FetchOptions) -> Claim<'_> {
        let mut in_flight = lock(&self.inner.in_flight);

        if let Some(entry) = in_flight.get_mut(&key) {
            if entry.cancel.is_cancelled() {
                return Claim::Retired(entry.result.clone());
            }
            return Claim::Wait(self.join(key, entry));
        }

        let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let result = spawn_fetch(
            Arc::clone(&self.inner),
            key,
            id,
            viewport.clone(),
            options.clone(),
            cancel.clone(),
        );

        in_flight.insert(
            key,
            InFlight {
                id,
                result: result.clone(),
                cancel,
                waiters: 1,
            },
        );
        Claim::Wait(Joined {
            result,
            interest: Interest {
                inner: &self.inner,
                key,
                id,
            },
        })
    }
}

/// Wait on a joined fetch until it resolves or `token` fires; the interest is
/// released either way.
async fn wait_for(
    joined: Joined<'_>,
    key: TileKey,
    token: &CancellationToken,
) -> Arc<Vec<Feature>> {
    let Joined {
        result,
        interest: _interest,
    } = joined;

    tokio::select! {
        biased;
        features = result => features,
        _ = token.cancelled() => {
            log::debug!("stopped waiting for {}", key);
            Arc::default()
        }
    }
}

/// Run one category fetch in its own task. Complete results are cached before
/// the in-flight entry goes away, so later callers find them in the cache.
fn spawn_fetch(
    inner: Arc<LoaderInner>,
    key: TileKey,
    id: u64,
    viewport: Viewport,
    options: FetchOptions,
    cancel: CancellationToken,
) -> SharedFetch {
    let task = tokio::spawn(async move {
        let _guard = InFlightGuard {
            inner: Arc::clone(&inner),
            key,
            id,
        };

        let fetch = inner
            .fetcher
            .fetch_category(&viewport.bounds, viewport.zoom, key.category, &options, &cancel)
            .await;

        if fetch.is_complete() {
            let metadata = TileMetadata {
                bounds: viewport.bounds.clone(),
                zoom: viewport.zoom,
                category: key.category,
            };
            inner.cache.put(&key, &fetch.features, metadata).await;
        } else {
            log::debug!("not caching {} ({:?})", key, fetch.status);
        }

        Arc::new(fetch.features)
    });

    async move {
        task.await.unwrap_or_else(|err| {
            log::warn!("fetch task for {} failed: {}", key, err);
            Arc::default()
        })
    }
    .boxed()
    .shared()
}
