use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::trace;

struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
    access_count: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// Running counters for cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

struct Inner<V> {
    entries: LruCache<String, CacheEntry<V>>,
    stats: CacheStats,
}

/// Thread-safe LRU cache with per-entry TTL.
///
/// Expired entries are evicted lazily at access time and are never returned.
/// Capacity overflow evicts in strict least-recently-used order.
pub struct TtlLruCache<V> {
    inner: Mutex<Inner<V>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlLruCache<V> {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
            default_ttl,
        }
    }

    /// Look up `key`, promoting it to most-recently-used on a hit.
    pub fn get(&self, key: &str) -> Option<V> {
        enum Lookup<V> {
            Miss,
            Expired,
            Hit(V),
        }

        let mut inner = self.inner.lock();
        let lookup = match inner.entries.get_mut(key) {
            None => Lookup::Miss,
            Some(entry) if entry.is_expired() => Lookup::Expired,
            Some(entry) => {
                entry.access_count += 1;
                trace!(key, accesses = entry.access_count, "cache hit");
                Lookup::Hit(entry.value.clone())
            }
        };

        match lookup {
            Lookup::Miss => {
                inner.stats.misses += 1;
                None
            }
            Lookup::Expired => {
                inner.entries.pop(key);
                inner.stats.expired += 1;
                inner.stats.misses += 1;
                trace!(key, "evicted expired cache entry on access");
                None
            }
            Lookup::Hit(value) => {
                inner.stats.hits += 1;
                Some(value)
            }
        }
    }

    /// Insert `value` under `key`, overwriting any previous entry.
    ///
    /// `ttl` falls back to the cache-wide default when `None`.
    pub fn put(&self, key: &str, value: V, ttl: Option<Duration>) {
        let mut inner = self.inner.lock();
        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
            ttl: ttl.unwrap_or(self.default_ttl),
            access_count: 0,
        };
        if let Some((evicted_key, _)) = inner.entries.push(key.to_string(), entry) {
            // `push` hands back either the value we replaced (same key) or
            // the LRU entry it evicted to make room; only the latter counts.
            if evicted_key != key {
                inner.stats.evictions += 1;
                trace!(key = %evicted_key, "evicted least-recently-used cache entry");
            }
        }
    }

    /// Drop every expired entry and return how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let expired_keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired_keys {
            inner.entries.pop(key);
        }
        inner.stats.expired += expired_keys.len() as u64;
        expired_keys.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}
