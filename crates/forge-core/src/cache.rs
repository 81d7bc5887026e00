//! Memoizing caches: in-memory with time-based expiry and on-disk forever.
//!
//! Both caches share the `get(key, compute)` contract: a live entry is
//! returned without running `compute`; otherwise `compute` runs, its result
//! is stored and returned. Neither cache holds a lock while `compute` runs,
//! so a slow computation for one key never blocks lookups of other keys.
//! Two concurrent misses on the same key may both compute (at-least-once);
//! readers never observe a partially written value.

use crate::error::{ForgeError, Result};
use bytes::Bytes;
use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default TTL for proxied upstream queries.
pub const DEFAULT_QUERY_TTL: Duration = Duration::from_secs(10);

/// A cached value with its creation time.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// In-memory cache whose entries expire a fixed duration after creation.
///
/// Expired entries are dropped lazily on the next read. Values are cloned
/// out of the cache, so wrap large values in `Arc`.
///
/// # Examples
///
/// ```
/// use forge_core::cache::TtlCache;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let cache: TtlCache<String, Vec<String>> = TtlCache::new(Duration::from_secs(10));
///
/// let first = cache.get("tags".to_string(), || async { vec!["v1.0.0".to_string()] }).await;
/// // Served from the cache: the closure is not called again.
/// let second = cache.get("tags".to_string(), || async { unreachable!() }).await;
/// assert_eq!(first, second);
/// # });
/// ```
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty cache with the given time-to-live.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the live value for `key`, computing and storing it on a miss.
    pub async fn get<F, Fut>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.lookup(&key) {
            return value;
        }

        let value = compute().await;
        self.entries.insert(key, CacheEntry::new(value.clone()));
        value
    }

    /// Like [`TtlCache::get`] for fallible computations.
    ///
    /// Errors are returned to the caller and never cached.
    pub async fn try_get<F, Fut, E>(&self, key: K, compute: F) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        let value = compute().await?;
        self.entries.insert(key, CacheEntry::new(value.clone()));
        Ok(value)
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(self.ttl) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            // Only remove if still expired: a concurrent writer may have refreshed it.
            self.entries
                .remove_if(key, |_, entry| entry.is_expired(self.ttl));
        }
        None
    }

    /// Drops a single entry.
    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Evicts every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache contains no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Disk-backed cache whose entries never expire.
///
/// Each key maps to one file directly under the root directory and file
/// existence is the cache hit. Values are written to a uniquely named
/// temporary sibling and renamed into place, so a crash mid-write never
/// leaves a truncated file under the published name.
///
/// # Examples
///
/// ```no_run
/// use forge_core::cache::PersistentCache;
/// use bytes::Bytes;
///
/// # async fn example() -> forge_core::Result<()> {
/// let cache = PersistentCache::new("/var/cache/forge")?;
/// let bytes = cache
///     .get("puppetlabs-apache-1.0.0.tar.gz", || async {
///         Ok(Bytes::from_static(b"downloaded"))
///     })
///     .await?;
/// assert_eq!(&bytes[..], b"downloaded");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PersistentCache {
    root: PathBuf,
}

impl PersistentCache {
    /// Opens a cache rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            ForgeError::Configuration(format!(
                "cannot create cache directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    /// Root directory of the cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path that stores `key`.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::Configuration` if the key is empty or could
    /// escape the root directory.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    /// Whether an entry for `key` has been published.
    pub async fn contains(&self, key: &str) -> bool {
        match self.path_for(key) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Returns the stored bytes for `key`, computing and persisting them on a miss.
    ///
    /// A failed `compute` is returned as-is and nothing is written. A failed
    /// write is logged and the computed bytes are still returned.
    pub async fn get<F, Fut>(&self, key: &str, compute: F) -> Result<Bytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes>>,
    {
        let path = self.path_for(key)?;

        match tokio::fs::read(&path).await {
            Ok(data) => {
                tracing::debug!(key, "persistent cache hit");
                return Ok(Bytes::from(data));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(key, "persistent cache miss");
        let data = compute().await?;

        if let Err(e) = self.publish(&path, &data).await {
            tracing::warn!(key, error = %e, "failed to write persistent cache entry");
        }

        Ok(data)
    }

    async fn publish(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = self.root.join(format!(
            ".{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = tokio::fs::write(&temp, data).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&temp, path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }
        Ok(())
    }

    /// Removes every published entry and leftover temporary file.
    pub async fn clear(&self) -> Result<()> {
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.starts_with('.')
        || key.contains("..")
        || key.contains('/')
        || key.contains('\\')
    {
        return Err(ForgeError::Configuration(format!(
            "invalid cache key: {:?}",
            key
        )));
    }
    Ok(())
}
