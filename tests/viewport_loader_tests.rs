mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use support::*;
use tokio::sync::{Notify, Semaphore};
use verdemap::constants::{CACHE_SCHEMA_KEY, CACHE_TTL};
use verdemap::prelude::*;

const START_MILLIS: u64 = 1_700_000_000_000;

struct Fixture {
    loader: Arc<ViewportLoader>,
    transport: Arc<MockTransport>,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
}

async fn fixture(transport: MockTransport) -> Fixture {
    init_logging();
    let transport = Arc::new(transport);
    let store = Arc::new(MemoryStore::new(64));
    let clock = Arc::new(ManualClock::new(START_MILLIS));

    let loader = LoaderBuilder::new()
        .with_config(quick_config())
        .with_transport(transport.clone())
        .with_store(store.clone())
        .with_clock(clock.clone())
        .build()
        .await
        .unwrap();

    Fixture {
        loader: Arc::new(loader),
        transport,
        store,
        clock,
    }
}

fn spawn_load(
    loader: &Arc<ViewportLoader>,
    viewport: Viewport,
    category: Option<Category>,
) -> tokio::task::JoinHandle<Option<Vec<Feature>>> {
    let loader = Arc::clone(loader);
    tokio::spawn(async move {
        loader
            .load_viewport_data(&viewport, category, &FetchOptions::default())
            .await
    })
}

/// A second load of the same view is served from the cache
#[tokio::test]
async fn test_cache_hit_skips_network() {
    let f = fixture(MockTransport::pages_of(7)).await;
    let view = city_view(16.0);

    let first = f
        .loader
        .load_viewport_data(&view, Some(Category::Vegetation), &FetchOptions::default())
        .await
        .unwrap();
    let second = f
        .loader
        .load_viewport_data(&view, Some(Category::Vegetation), &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(f.transport.calls(), 1);
    assert_eq!(first.len(), 7);
    assert_eq!(first, second);
    assert_eq!(f.loader.cache_stats().await.total_records, 1);
}

/// Categories come from the zoom table when none is given
#[tokio::test]
async fn test_default_categories_by_zoom() {
    let f = fixture(MockTransport::pages_of(2)).await;

    let low = f
        .loader
        .load_viewport_data(&city_view(9.0), None, &FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(f.transport.requested_types(), vec!["zones"]);
    assert_eq!(low.len(), 2);

    let high = f
        .loader
        .load_viewport_data(&city_view(16.0), None, &FetchOptions::default())
        .await
        .unwrap();
    let mut types = f.transport.requested_types()[1..].to_vec();
    types.sort();
    assert_eq!(types, vec!["furniture", "vegetation", "zones"]);
    assert_eq!(high.len(), 6);
}

/// Two loads for one tile key while the first is in flight share one fetch
#[tokio::test(start_paused = true)]
async fn test_concurrent_loads_share_fetch() {
    let f = fixture(MockTransport::pages_of(4).with_latency(Duration::from_millis(200))).await;
    let view = city_view(14.0);
    let nearby = Viewport::from_wsen(11.34, 46.49, 11.36, 46.51, 14.3);
    let options = FetchOptions::default();

    let (first, second) = tokio::join!(
        f.loader
            .load_viewport_data(&view, Some(Category::Zones), &options),
        f.loader
            .load_viewport_data(&nearby, Some(Category::Zones), &options),
    );

    assert_eq!(f.transport.calls(), 1);
    // The first call was superseded by the second
    assert!(first.is_none());
    assert_eq!(second.map(|features| features.len()), Some(4));
    // The shared fetch completed and was cached for its remaining waiter
    assert_eq!(f.loader.cache_stats().await.total_records, 1);
    assert_eq!(f.loader.in_flight_count(), 0);
}

/// Loads issued from separate tasks for one tile key share a single fetch,
/// even when the cache lookup in front of the join yields on disk I/O
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_spawned_loads_share_fetch_over_file_store() {
    init_logging();
    let nearby = Viewport::from_wsen(11.34, 46.49, 11.36, 46.51, 14.3);

    for _ in 0..10 {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let transport = Arc::new(MockTransport::pages_of(4).with_gate(gate.clone()));
        let loader = Arc::new(
            LoaderBuilder::new()
                .with_config(quick_config())
                .with_transport(transport.clone())
                .with_store(Arc::new(FileStore::open(dir.path()).await.unwrap()))
                .build()
                .await
                .unwrap(),
        );

        let first = spawn_load(&loader, city_view(14.0), Some(Category::Zones));
        transport.wait_for_calls(1).await;
        let second = spawn_load(&loader, nearby.clone(), Some(Category::Zones));

        assert!(first.await.unwrap().is_none());
        gate.add_permits(1);

        assert_eq!(second.await.unwrap().map(|features| features.len()), Some(4));
        assert_eq!(transport.calls(), 1);
        assert_eq!(loader.cache_stats().await.total_records, 1);
    }
}

/// A load overtaken by a newer one resolves to `None`, and its abandoned
/// fetch writes nothing to the cache
#[tokio::test]
async fn test_superseded_load_is_discarded() {
    let gate = Arc::new(Semaphore::new(0));
    let f = fixture(MockTransport::pages_of(3).with_gate(gate.clone())).await;

    let first = spawn_load(&f.loader, city_view(16.0), Some(Category::Vegetation));
    f.transport.wait_for_calls(1).await;

    let second = spawn_load(&f.loader, other_view(16.0), Some(Category::Vegetation));
    f.transport.wait_for_calls(2).await;
    gate.add_permits(1);

    assert!(first.await.unwrap().is_none());
    assert_eq!(second.await.unwrap().map(|features| features.len()), Some(3));

    let cached = f.store.keys().await.unwrap();
    assert_eq!(cached.len(), 2, "schema marker plus one tile: {:?}", cached);
    let other_key = TileKey::new(&other_view(16.0), Category::Vegetation).to_string();
    assert!(cached.contains(&other_key));
    settle(&f.loader).await;
    assert_eq!(f.loader.in_flight_count(), 0);
}

/// An explicit cancel abandons the load and caches nothing
#[tokio::test]
async fn test_cancel_discards_load() {
    let gate = Arc::new(Semaphore::new(0));
    let f = fixture(MockTransport::pages_of(3).with_gate(gate.clone())).await;

    let load = spawn_load(&f.loader, city_view(16.0), Some(Category::Zones));
    f.transport.wait_for_calls(1).await;
    assert_eq!(f.loader.in_flight_count(), 1);

    f.loader.cancel();
    gate.add_permits(1);

    assert!(load.await.unwrap().is_none());
    assert_eq!(f.loader.cache_stats().await.total_records, 0);

    // The next load starts a fresh fetch
    let features = load_zones(&f.loader, &city_view(16.0)).await.unwrap();
    assert_eq!(features.len(), 3);
    assert_eq!(f.transport.calls(), 2);
}

async fn load_zones(loader: &ViewportLoader, view: &Viewport) -> Option<Vec<Feature>> {
    loader
        .load_viewport_data(view, Some(Category::Zones), &FetchOptions::default())
        .await
}

/// Wait for finished fetch tasks to clear their in-flight entries
async fn settle(loader: &ViewportLoader) {
    for _ in 0..100 {
        if loader.in_flight_count() == 0 {
            return;
        }
        tokio::task::yield_now().await;
    }
}

/// Records older than the TTL are refetched
#[tokio::test]
async fn test_ttl_expiry_refetches() {
    let f = fixture(MockTransport::pages_of(2)).await;
    let view = city_view(15.0);

    load_zones(&f.loader, &view).await.unwrap();
    f.clock.advance(CACHE_TTL);
    load_zones(&f.loader, &view).await.unwrap();
    assert_eq!(f.transport.calls(), 1);

    f.clock.advance(Duration::from_millis(1));
    load_zones(&f.loader, &view).await.unwrap();
    assert_eq!(f.transport.calls(), 2);
}

/// A failing category contributes nothing but does not sink its siblings
#[tokio::test]
async fn test_failing_category_is_isolated() {
    let transport = MockTransport::new(|url| match query(url, "type").as_deref() {
        Some("furniture") => status(500),
        _ => Ok(TransportResponse::ok(point_page("ok", 5))),
    });
    let f = fixture(transport).await;

    let features = f
        .loader
        .load_viewport_data(&city_view(16.0), None, &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(features.len(), 10);
    assert!(features
        .iter()
        .all(|feature| feature.property_str("category") != Some("furniture")));
    // Furniture was tried three times and never cached
    assert_eq!(f.loader.cache_stats().await.total_records, 2);
    assert_eq!(
        f.transport
            .requested_types()
            .iter()
            .filter(|kind| *kind == "furniture")
            .count(),
        3
    );
}

/// Opening over a store from another schema version wipes it
#[tokio::test]
async fn test_schema_reset_on_open() {
    let store = Arc::new(MemoryStore::new(16));
    let key = TileKey::new(&city_view(16.0), Category::Zones).to_string();
    store.put(CACHE_SCHEMA_KEY, b"0".to_vec()).await.unwrap();
    store.put(&key, b"{\"stale\":true}".to_vec()).await.unwrap();

    let transport = Arc::new(MockTransport::pages_of(2));
    let loader = LoaderBuilder::new()
        .with_config(quick_config())
        .with_transport(transport.clone())
        .with_store(store.clone())
        .build()
        .await
        .unwrap();

    assert_eq!(store.keys().await.unwrap(), vec![CACHE_SCHEMA_KEY.to_string()]);

    let features = loader
        .load_viewport_data(&city_view(16.0), Some(Category::Zones), &FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(transport.calls(), 1);
}

/// Without a store every load goes to the network
#[tokio::test]
async fn test_disabled_cache() {
    let transport = Arc::new(MockTransport::pages_of(2));
    let loader = LoaderBuilder::new()
        .with_config(quick_config())
        .with_transport(transport.clone())
        .without_cache()
        .build()
        .await
        .unwrap();

    for _ in 0..2 {
        let features = loader
            .load_viewport_data(&city_view(16.0), Some(Category::Zones), &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(features.len(), 2);
    }

    assert_eq!(transport.calls(), 2);
    assert_eq!(loader.cache_stats().await, CacheStats::default());
}

/// Clearing the cache forces the next load back to the network
#[tokio::test]
async fn test_clear_cache() {
    let f = fixture(MockTransport::pages_of(2)).await;
    let view = city_view(16.0);

    f.loader
        .load_viewport_data(&view, Some(Category::Zones), &FetchOptions::default())
        .await
        .unwrap();
    f.loader.clear_cache().await;
    assert_eq!(f.loader.cache_stats().await.total_records, 0);

    f.loader
        .load_viewport_data(&view, Some(Category::Zones), &FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(f.transport.calls(), 2);
}

/// Tiles cached on disk survive into a new loader
#[tokio::test]
async fn test_file_store_persists_across_loaders() {
    let dir = tempfile::tempdir().unwrap();
    let view = city_view(16.0);

    let first_transport = Arc::new(MockTransport::pages_of(3));
    let first = LoaderBuilder::new()
        .with_config(quick_config())
        .with_transport(first_transport.clone())
        .with_store(Arc::new(FileStore::open(dir.path()).await.unwrap()))
        .build()
        .await
        .unwrap();
    let written = first
        .load_viewport_data(&view, Some(Category::Vegetation), &FetchOptions::default())
        .await
        .unwrap();

    let second_transport = Arc::new(MockTransport::pages_of(3));
    let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let second = LoaderBuilder::new()
        .with_config(quick_config())
        .with_transport(second_transport.clone())
        .with_store(store.clone())
        .build()
        .await
        .unwrap();
    let read = second
        .load_viewport_data(&view, Some(Category::Vegetation), &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(first_transport.calls(), 1);
    assert_eq!(second_transport.calls(), 0);
    assert_eq!(written, read);

    let key = TileKey::new(&view, Category::Vegetation).to_string();
    assert!(store.keys().await.unwrap().contains(&key));
    assert_eq!(second.cache_stats().await.total_records, 1);
}

/// Memory store whose tile writes wait for a permit
struct HeldWrites {
    inner: MemoryStore,
    gate: Arc<Semaphore>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    changed: Notify,
}

impl HeldWrites {
    fn new(gate: Arc<Semaphore>) -> Self {
        Self {
            inner: MemoryStore::new(16),
            gate,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            changed: Notify::new(),
        }
    }

    async fn wait_until(&self, reached: impl Fn(&Self) -> bool) {
        loop {
            let notified = self.changed.notified();
            if reached(self) {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl KvStore for HeldWrites {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.inner.get(key).await;
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_waiters();
        value
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        if !key.starts_with("__") {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.changed.notify_waiters();
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| MapError::Storage("gate closed".to_string()))?;
        }
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys().await
    }
}

/// A caller that waited out an abandoned fetch reads what that fetch cached
/// instead of downloading the tile again
#[tokio::test]
async fn test_retired_fetch_result_read_from_cache() {
    init_logging();
    let gate = Arc::new(Semaphore::new(0));
    let store = Arc::new(HeldWrites::new(gate.clone()));
    let transport = Arc::new(MockTransport::pages_of(3));
    let loader = Arc::new(
        LoaderBuilder::new()
            .with_config(quick_config())
            .with_transport(transport.clone())
            .with_store(store.clone())
            .build()
            .await
            .unwrap(),
    );
    let view = city_view(16.0);

    // The fetch completes and blocks while writing its tile
    let first = spawn_load(&loader, view.clone(), Some(Category::Zones));
    store
        .wait_until(|store| store.writes.load(Ordering::SeqCst) >= 1)
        .await;

    // Its only caller leaves, which retires the fetch mid-write
    loader.cancel();
    assert!(first.await.unwrap().is_none());

    let reads = store.reads.load(Ordering::SeqCst);
    let second = spawn_load(&loader, view, Some(Category::Zones));
    store
        .wait_until(|store| store.reads.load(Ordering::SeqCst) > reads)
        .await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    gate.add_permits(1);

    assert_eq!(second.await.unwrap().map(|features| features.len()), Some(3));
    assert_eq!(transport.calls(), 1);
    assert_eq!(loader.cache_stats().await.total_records, 1);
}
