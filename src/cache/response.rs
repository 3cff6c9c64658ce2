use super::lru::{CacheStats, TtlLruCache};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

/// Lexical markers that make a response too time-sensitive to cache.
const TIME_SENSITIVE_MARKERS: &[&str] = &[
    "current time",
    "right now",
    "today",
    "yesterday",
    "tomorrow",
    "this morning",
    "this afternoon",
    "this evening",
    "tonight",
    "latest",
    "recent",
    "just now",
    "breaking news",
];

/// Responses shorter than this (trimmed) are not worth caching.
const MIN_CACHEABLE_LEN: usize = 10;

/// Responses longer than this keep their value longer and get the long TTL.
const LONG_RESPONSE_LEN: usize = 1000;

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_digest_of(hasher)
}

fn hex_digest_of(hasher: Sha256) -> String {
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Domain wrapper over [`TtlLruCache`] for upstream completions.
///
/// The value type is whatever reply shape the caller wants reproduced on a
/// hit; eligibility is judged from the response text alone. Lookups and
/// stores never fail the caller: this layer is an optimization, not a
/// dependency.
pub struct ResponseCache<V> {
    cache: TtlLruCache<V>,
    default_ttl: Duration,
    long_ttl: Duration,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(max_entries: usize, default_ttl: Duration, long_ttl: Duration) -> Self {
        Self {
            cache: TtlLruCache::new(max_entries, default_ttl),
            default_ttl,
            long_ttl,
        }
    }

    /// Derive the cache/dedup fingerprint for a message and its
    /// routing-relevant context.
    ///
    /// The message is trimmed and case-folded so trivially-different phrasings
    /// share a hit. Conversation history is deliberately excluded: the same
    /// question from different conversation states should reuse the answer.
    pub fn key(message: &str, model: &str, system_prompt: &str) -> String {
        let normalized = message.trim().to_lowercase();
        let system_fingerprint = hex_digest(system_prompt.as_bytes());

        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hasher.update(b"|");
        hasher.update(model.as_bytes());
        hasher.update(b"|");
        hasher.update(&system_fingerprint.as_bytes()[..8]);
        hex_digest_of(hasher)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let value = self.cache.get(key);
        if value.is_some() {
            debug!(key = key.get(..12).unwrap_or(key), "response cache hit");
        }
        value
    }

    /// Store `value` if the response text is eligible.
    ///
    /// Returns whether the response was actually cached. Short responses and
    /// responses carrying time-sensitive markers are skipped; failed calls
    /// never reach this point.
    pub fn store(&self, key: &str, response_text: &str, value: V, ttl: Option<Duration>) -> bool {
        if !Self::is_cacheable(response_text) {
            debug!("response not eligible for caching");
            return false;
        }

        let ttl = ttl.unwrap_or(if response_text.len() > LONG_RESPONSE_LEN {
            self.long_ttl
        } else {
            self.default_ttl
        });
        self.cache.put(key, value, Some(ttl));
        true
    }

    fn is_cacheable(response_text: &str) -> bool {
        if response_text.trim().len() < MIN_CACHEABLE_LEN {
            return false;
        }
        let lower = response_text.to_lowercase();
        !TIME_SENSITIVE_MARKERS
            .iter()
            .any(|marker| lower.contains(marker))
    }

    pub fn cleanup_expired(&self) -> usize {
        self.cache.cleanup_expired()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
