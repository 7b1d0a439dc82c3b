//! Key/value persistence behind the tile cache
//!
//! The cache only needs byte blobs under string keys. Hosts inject whichever
//! store fits: [`MemoryStore`] keeps an LRU-bounded map in process,
//! [`FileStore`] keeps one JSON file per key in a directory.

use crate::core::constants::RESERVED_KEY_PREFIX;
use crate::prelude::{Arc, HashMap, Mutex};
use crate::{MapError, Result};
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    async fn keys(&self) -> Result<Vec<String>>;
}

/// In-process store with least-recently-used eviction.
///
/// Keys under [`RESERVED_KEY_PREFIX`] are held outside the LRU; they neither
/// count against the capacity nor get evicted.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Arc<Mutex<MemoryEntries>>,
}

#[derive(Debug)]
struct MemoryEntries {
    tiles: LruCache<String, Vec<u8>>,
    reserved: HashMap<String, Vec<u8>>,
}

fn is_reserved(key: &str) -> bool {
    key.starts_with(RESERVED_KEY_PREFIX)
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(Mutex::new(MemoryEntries {
                tiles: LruCache::new(capacity),
                reserved: HashMap::default(),
            })),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.tiles.len() + entries.reserved.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut MemoryEntries) -> T) -> Result<T> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| MapError::Storage("memory store lock poisoned".to_string()))?;
        Ok(f(&mut entries))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(crate::core::config::CacheConfig::default().memory_capacity)
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.with_entries(|entries| {
            if is_reserved(key) {
                entries.reserved.get(key).cloned()
            } else {
                entries.tiles.get(key).cloned()
            }
        })
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.with_entries(|entries| {
            if is_reserved(key) {
                entries.reserved.insert(key.to_string(), value);
            } else {
                entries.tiles.put(key.to_string(), value);
            }
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.with_entries(|entries| {
            if is_reserved(key) {
                entries.reserved.remove(key);
            } else {
                entries.tiles.pop(key);
            }
        })
    }

    async fn clear(&self) -> Result<()> {
        self.with_entries(|entries| {
            entries.tiles.clear();
            entries.reserved.clear();
        })
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.with_entries(|entries| {
            entries
                .reserved
                .keys()
                .chain(entries.tiles.iter().map(|(key, _)| key))
                .cloned()
                .collect()
        })
    }
}

const FILE_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Directory-backed store, one file per key.
///
/// Keys are percent-escaped into file names. Writes go to a temporary file
/// that is renamed over the target, so readers never observe half a record.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        log::debug!("file store opened at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", escape_key(key), FILE_EXTENSION))
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let target = self.path_for(key);
        let temp = target.with_extension(TEMP_EXTENSION);
        tokio::fs::write(&temp, value).await?;
        tokio::fs::rename(&temp, &target).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let ours = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == FILE_EXTENSION || ext == TEMP_EXTENSION);
            if ours {
                tokio::fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(stem) = name
                .to_str()
                .and_then(|name| name.strip_suffix(&format!(".{}", FILE_EXTENSION)))
            else {
                continue;
            };
            if let Some(key) = unescape_key(stem) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn is_plain(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_'
}

/// Percent-escape everything outside `[A-Za-z0-9_-]`
fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        if is_plain(byte) {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    escaped
}

fn unescape_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
