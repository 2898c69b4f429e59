//! In-memory LRU cache of parsed resources.
//!
//! Entries are keyed by [`CacheKey`]: the module context the value was resolved
//! under plus the resource name. A table resolved while module A is active is never
//! served while module B is active, and base-only lookups live in their own
//! namespace so they never see override content.
//!
//! # Memory accounting
//!
//! Every entry carries a byte size. Values whose footprint exceeds the compression
//! threshold are stored as zstd-compressed MessagePack and count at their
//! compressed size; they are decoded again on every hit. When the total exceeds
//! the ceiling, the least recently used share of entries (20% by default) is
//! dropped in one batch, and more are dropped if that was not enough.
//!
//! # Concurrent fills
//!
//! [`get_or_load`](ResourceCache::get_or_load) holds a per-key fill lock while
//! loading, so concurrent callers asking for the same key parse it once. Callers
//! asking for different keys do not wait on each other.

use crate::config::ResmanConfig;
use crate::error::{Error, Result};
use crate::module::ContextId;
use camino::{Utf8Path, Utf8PathBuf};
use dashmap::DashMap;
use lru::LruCache;
use nwn2_formats::TwoDaTable;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const COMPRESSION_LEVEL: i32 = 3;

/// A value that can live in a [`ResourceCache`].
pub trait CacheValue: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Approximate in-memory size in bytes.
    fn footprint(&self) -> usize;
}

impl CacheValue for TwoDaTable {
    fn footprint(&self) -> usize {
        self.approx_size()
    }
}

/// The namespace a cached value was resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheScope {
    /// Base installation only, no overrides.
    BaseOnly,
    /// All global layers, no module active.
    Global,
    /// Global layers plus the given module context.
    Module(ContextId),
}

impl std::fmt::Display for CacheScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheScope::BaseOnly => f.write_str("base"),
            CacheScope::Global => f.write_str("global"),
            CacheScope::Module(id) => write!(f, "module:{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey {
    pub scope: CacheScope,
    pub name: String,
}

impl CacheKey {
    pub fn new(scope: CacheScope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.scope, self.name)
    }
}

/// Cache limits.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub memory_ceiling: usize,
    pub compression_threshold: usize,
    pub eviction_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from(&ResmanConfig::default())
    }
}

impl From<&ResmanConfig> for CacheConfig {
    fn from(config: &ResmanConfig) -> Self {
        Self {
            memory_ceiling: config.memory_ceiling_bytes,
            compression_threshold: config.compression_threshold_bytes,
            eviction_fraction: config.eviction_fraction.clamp(0.0, 1.0),
        }
    }
}

/// A freshly loaded value and the files it was read from.
#[derive(Debug)]
pub struct Loaded<V> {
    pub value: V,
    pub sources: Vec<Utf8PathBuf>,
}

/// Counters and occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub memory_bytes: usize,
    pub compressed_entries: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

enum Payload<V> {
    Parsed(Arc<V>),
    Compressed(Arc<Vec<u8>>),
}

struct Entry<V> {
    payload: Payload<V>,
    size: usize,
    sources: Vec<Utf8PathBuf>,
}

struct Inner<V> {
    entries: LruCache<CacheKey, Entry<V>>,
    memory_bytes: usize,
}

impl<V> Inner<V> {
    fn remove(&mut self, key: &CacheKey) -> bool {
        match self.entries.pop(key) {
            Some(entry) => {
                self.memory_bytes -= entry.size;
                true
            }
            None => false,
        }
    }

    fn remove_where(&mut self, mut pred: impl FnMut(&CacheKey, &Entry<V>) -> bool) -> usize {
        let doomed: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(k, e)| pred(k, e))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }

    fn pop_lru(&mut self) -> bool {
        match self.entries.pop_lru() {
            Some((_, entry)) => {
                self.memory_bytes -= entry.size;
                true
            }
            None => false,
        }
    }
}

/// LRU cache of parsed values with a memory ceiling.
pub struct ResourceCache<V: CacheValue> {
    config: CacheConfig,
    inner: Mutex<Inner<V>>,
    fill_locks: DashMap<CacheKey, Arc<Mutex<()>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: CacheValue> ResourceCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                memory_bytes: 0,
            }),
            fill_locks: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up `key`, counting a hit or a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        let value = self.lookup(key);
        let counter = if value.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Return the cached value for `key`, or run `load` and cache its result.
    ///
    /// `load` runs at most once per key at a time. `None` results are not cached.
    pub fn get_or_load<F>(&self, key: &CacheKey, load: F) -> Option<Arc<V>>
    where
        F: FnOnce() -> Option<Loaded<V>>,
    {
        if let Some(value) = self.lookup(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(value);
        }

        let fill_lock = self.fill_locks.entry(key.clone()).or_default().clone();
        let guard = fill_lock.lock();

        // Another caller may have filled the key while we waited.
        if let Some(value) = self.lookup(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let result = load().map(|loaded| self.insert(key.clone(), loaded.value, loaded.sources));

        drop(guard);
        self.fill_locks.remove(key);
        result
    }

    /// Insert a value, replacing any previous entry for `key`.
    pub fn insert(&self, key: CacheKey, value: V, sources: Vec<Utf8PathBuf>) -> Arc<V> {
        let footprint = value.footprint();
        let value = Arc::new(value);

        let (payload, size) = if footprint > self.config.compression_threshold {
            match compress(value.as_ref()) {
                Ok(bytes) => {
                    tracing::trace!(
                        "Cache: compressed {} from {} to {} bytes",
                        key,
                        footprint,
                        bytes.len()
                    );
                    let size = bytes.len();
                    (Payload::Compressed(Arc::new(bytes)), size)
                }
                Err(e) => {
                    tracing::warn!("Cache: compression of {} failed, storing parsed: {}", key, e);
                    (Payload::Parsed(value.clone()), footprint)
                }
            }
        } else {
            (Payload::Parsed(value.clone()), footprint)
        };

        let mut inner = self.inner.lock();
        inner.remove(&key);
        inner.memory_bytes += size;
        inner.entries.push(
            key,
            Entry {
                payload,
                size,
                sources,
            },
        );
        self.enforce_ceiling(&mut inner);
        value
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains(key)
    }

    /// Files the entry for `key` was read from.
    pub fn sources(&self, key: &CacheKey) -> Vec<Utf8PathBuf> {
        self.inner
            .lock()
            .entries
            .peek(key)
            .map(|e| e.sources.clone())
            .unwrap_or_default()
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.inner.lock().remove(key)
    }

    /// Drop every entry for `name`, in every scope.
    pub fn invalidate_name(&self, name: &str) -> usize {
        self.inner.lock().remove_where(|k, _| k.name == name)
    }

    /// Drop every entry that was read from `path`.
    pub fn invalidate_source(&self, path: &Utf8Path) -> usize {
        let removed = self
            .inner
            .lock()
            .remove_where(|_, e| e.sources.iter().any(|s| s == path));
        if removed > 0 {
            tracing::debug!("Cache: invalidated {} entries backed by {}", removed, path);
        }
        removed
    }

    /// Drop every entry whose scope matches `pred`.
    pub fn invalidate_scope(&self, pred: impl Fn(&CacheScope) -> bool) -> usize {
        self.inner.lock().remove_where(|k, _| pred(&k.scope))
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.memory_bytes = 0;
    }

    /// Evict least recently used entries until the footprint is at most
    /// `target_bytes`. Returns the number evicted.
    pub fn evict_lru(&self, target_bytes: usize) -> usize {
        let mut inner = self.inner.lock();
        let mut evicted = 0;
        while inner.memory_bytes > target_bytes && inner.pop_lru() {
            evicted += 1;
        }
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    /// Cached keys, most recently used first.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn memory_bytes(&self) -> usize {
        self.inner.lock().memory_bytes
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: inner.entries.len(),
            memory_bytes: inner.memory_bytes,
            compressed_entries: inner
                .entries
                .iter()
                .filter(|(_, e)| matches!(e.payload, Payload::Compressed(_)))
                .count(),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<V>> {
        let compressed = {
            let mut inner = self.inner.lock();
            match &inner.entries.get(key)?.payload {
                Payload::Parsed(value) => return Some(value.clone()),
                Payload::Compressed(bytes) => bytes.clone(),
            }
        };

        match decompress::<V>(&compressed) {
            Ok(value) => Some(Arc::new(value)),
            Err(e) => {
                tracing::warn!("Cache: dropping undecodable entry {}: {}", key, e);
                self.inner.lock().remove(key);
                None
            }
        }
    }

    fn enforce_ceiling(&self, inner: &mut Inner<V>) {
        if inner.memory_bytes <= self.config.memory_ceiling {
            return;
        }

        let before = inner.memory_bytes;
        let batch = ((inner.entries.len() as f64 * self.config.eviction_fraction).ceil() as usize).max(1);
        let mut evicted = 0;
        while evicted < batch && inner.pop_lru() {
            evicted += 1;
        }
        while inner.memory_bytes > self.config.memory_ceiling && inner.pop_lru() {
            evicted += 1;
        }

        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        tracing::debug!(
            "Cache: evicted {} entries, {} -> {} bytes (ceiling {})",
            evicted,
            before,
            inner.memory_bytes,
            self.config.memory_ceiling
        );
    }
}

fn compress<V: Serialize>(value: &V) -> Result<Vec<u8>> {
    let encoded = rmp_serde::to_vec(value)?;
    zstd::encode_all(encoded.as_slice(), COMPRESSION_LEVEL).map_err(|e| Error::Compression(e.to_string()))
}

fn decompress<V: DeserializeOwned>(bytes: &[u8]) -> Result<V> {
    let decoded = zstd::decode_all(bytes).map_err(|e| Error::Compression(e.to_string()))?;
    Ok(rmp_serde::from_slice(&decoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn table(rows: usize) -> TwoDaTable {
        let mut table = TwoDaTable::new(["Label", "Value"]);
        for i in 0..rows {
            table.push_row([Some(format!("row_{}", i)), Some(i.to_string())]);
        }
        table
    }

    fn cache(ceiling: usize, threshold: usize) -> ResourceCache<TwoDaTable> {
        ResourceCache::new(CacheConfig {
            memory_ceiling: ceiling,
            compression_threshold: threshold,
            eviction_fraction: 0.2,
        })
    }

    fn global(name: &str) -> CacheKey {
        CacheKey::new(CacheScope::Global, name)
    }

    fn loaded(rows: usize) -> Option<Loaded<TwoDaTable>> {
        Some(Loaded {
            value: table(rows),
            sources: Vec::new(),
        })
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let cache = cache(usize::MAX, usize::MAX);
        let key = global("classes.2da");

        cache.get_or_load(&key, || loaded(2)).unwrap();
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (0, 1));

        cache.get_or_load(&key, || panic!("must not reload")).unwrap();
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn test_none_is_not_cached() {
        let cache = cache(usize::MAX, usize::MAX);
        let key = global("missing.2da");
        assert!(cache.get_or_load(&key, || None).is_none());
        assert!(!cache.contains(&key));
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_scopes_are_isolated() {
        let cache = cache(usize::MAX, usize::MAX);
        let a = CacheKey::new(CacheScope::Module(ContextId(1)), "feat.2da");
        let b = CacheKey::new(CacheScope::Module(ContextId(2)), "feat.2da");

        cache.insert(a.clone(), table(1), Vec::new());
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&a).is_some());

        assert_eq!(cache.invalidate_name("feat.2da"), 1);
        assert!(!cache.contains(&a));
    }

    #[test]
    fn test_large_values_are_compressed() {
        let cache = cache(usize::MAX, 1024);
        let key = global("big.2da");
        let original = table(500);
        let footprint = original.footprint();

        cache.insert(key.clone(), original.clone(), Vec::new());
        let stats = cache.stats();
        assert_eq!(stats.compressed_entries, 1);
        assert!(stats.memory_bytes < footprint);

        let restored = cache.get(&key).unwrap();
        assert_eq!(*restored, original);
    }

    #[test]
    fn test_ceiling_triggers_batch_eviction() {
        let one = table(10).footprint();
        let ceiling = one * 5;
        let cache = cache(ceiling, usize::MAX);

        for i in 0..20 {
            cache.insert(global(&format!("t{}.2da", i)), table(10), Vec::new());
            assert!(cache.memory_bytes() <= ceiling);
        }

        let stats = cache.stats();
        assert!(stats.evictions > 0);
        assert!(stats.memory_bytes <= ceiling);
        // The most recent insert survives.
        assert!(cache.contains(&global("t19.2da")));
        assert!(!cache.contains(&global("t0.2da")));
    }

    #[test]
    fn test_lru_order_respects_access() {
        let one = table(10).footprint();
        let cache = cache(one * 3, usize::MAX);
        cache.insert(global("a.2da"), table(10), Vec::new());
        cache.insert(global("b.2da"), table(10), Vec::new());
        cache.insert(global("c.2da"), table(10), Vec::new());

        // Touch "a" so "b" becomes least recently used.
        cache.get(&global("a.2da")).unwrap();
        cache.insert(global("d.2da"), table(10), Vec::new());

        assert!(cache.contains(&global("a.2da")));
        assert!(!cache.contains(&global("b.2da")));
    }

    #[test]
    fn test_evict_lru_to_target() {
        let cache = cache(usize::MAX, usize::MAX);
        for i in 0..4 {
            cache.insert(global(&format!("t{}.2da", i)), table(10), Vec::new());
        }
        let evicted = cache.evict_lru(0);
        assert_eq!(evicted, 4);
        assert_eq!(cache.memory_bytes(), 0);
        assert_eq!(cache.stats().evictions, 4);
    }

    #[test]
    fn test_invalidate_source() {
        let cache = cache(usize::MAX, usize::MAX);
        let path = Utf8PathBuf::from("/override/classes.2da");
        cache.insert(global("classes.2da"), table(1), vec![path.clone()]);
        cache.insert(
            CacheKey::new(CacheScope::Module(ContextId(7)), "classes.2da"),
            table(1),
            vec![path.clone()],
        );
        cache.insert(global("feat.2da"), table(1), Vec::new());

        assert_eq!(cache.invalidate_source(&path), 2);
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_concurrent_fill_parses_once() {
        let cache = Arc::new(cache(usize::MAX, usize::MAX));
        let loads = Arc::new(AtomicUsize::new(0));
        let key = global("classes.2da");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let loads = loads.clone();
                let key = key.clone();
                thread::spawn(move || {
                    cache
                        .get_or_load(&key, || {
                            loads.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(20));
                            loaded(3)
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().row_count(), 3);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
