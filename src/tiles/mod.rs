pub mod cache;
pub mod fetcher;
pub mod key;
pub mod loader;
pub mod store;
pub mod transport;

// Re-exports for convenience
pub use cache::{CacheRecord, CacheStats, TileCache, TileMetadata};
pub use fetcher::{CategoryFetch, FetchStatus, PaginatedFetcher};
pub use key::TileKey;
pub use loader::ViewportLoader;
pub use store::{FileStore, KvStore, MemoryStore};
pub use transport::{HttpTransport, Transport, TransportResponse};
