//! In-process embedding cache with absolute TTL and insertion-order eviction.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Embedding;
use crate::clock::{Clock, SystemClock};

/// Default time-to-live for cached embeddings (24 hours).
pub const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Configuration for [`EmbeddingCache`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds an entry stays valid after it was written.
    pub ttl_secs: u64,

    /// Maximum number of entries (None = unbounded).
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            max_entries: Some(10_000),
        }
    }
}

impl CacheConfig {
    /// Set the time-to-live.
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Set the maximum number of entries.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    /// Remove the size bound.
    pub fn unbounded(mut self) -> Self {
        self.max_entries = None;
        self
    }
}

/// Cache entry for an embedding.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The embedding vector.
    pub embedding: Embedding,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct CacheState {
    /// Entries in insertion order; the front is the oldest insert.
    entries: IndexMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Cache for embeddings to avoid redundant generator calls.
///
/// Keys are trimmed and lowercased, so `"Apple "` and `"apple"` share an
/// entry. Expiry is absolute from `created_at`; hits do not refresh it.
/// Expired entries are dropped when they are looked up.
pub struct EmbeddingCache {
    state: Mutex<CacheState>,
    ttl: Duration,
    max_entries: Option<usize>,
    clock: Arc<dyn Clock>,
}

impl EmbeddingCache {
    /// Create a new in-memory cache using the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache driven by the given clock.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let ttl = i64::try_from(config.ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);

        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
            max_entries: config.max_entries,
            clock,
        }
    }

    /// Normalize a lookup key.
    pub fn normalize_key(key: &str) -> String {
        key.trim().to_lowercase()
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.created_at > self.ttl
    }

    /// Get an embedding from the cache.
    ///
    /// Every call records exactly one hit or one miss.
    pub async fn get(&self, key: &str) -> Option<Embedding> {
        let key = Self::normalize_key(key);
        let mut guard = self.state.lock().await;
        let now = self.clock.now();
        let state = &mut *guard;

        match state.entries.get(&key) {
            Some(entry) if !self.is_expired(entry, now) => {
                state.hits += 1;
                return Some(entry.embedding.clone());
            }
            Some(_) => {
                state.entries.shift_remove(&key);
                debug!("Dropped expired cache entry: {key}");
            }
            None => {}
        }

        state.misses += 1;
        None
    }

    /// Put an embedding in the cache.
    ///
    /// At capacity, the least recently inserted entry is evicted first.
    /// Re-putting a key replaces it and makes it the newest insert.
    pub async fn put(&self, key: &str, embedding: Embedding) {
        let key = Self::normalize_key(key);
        let entry = CacheEntry {
            embedding,
            created_at: self.clock.now(),
        };

        let mut state = self.state.lock().await;
        state.entries.shift_remove(&key);

        if let Some(max) = self.max_entries {
            if max == 0 {
                return;
            }
            while state.entries.len() >= max {
                if let Some((evicted, _)) = state.entries.shift_remove_index(0) {
                    debug!("Evicted cache entry: {evicted}");
                }
            }
        }

        state.entries.insert(key, entry);
    }

    /// Check if a live entry exists, without touching the hit counters.
    pub async fn contains(&self, key: &str) -> bool {
        let key = Self::normalize_key(key);
        let now = self.clock.now();
        let state = self.state.lock().await;
        state
            .entries
            .get(&key)
            .is_some_and(|entry| !self.is_expired(entry, now))
    }

    /// Remove an embedding from the cache.
    pub async fn remove(&self, key: &str) -> Option<Embedding> {
        let key = Self::normalize_key(key);
        self.state
            .lock()
            .await
            .entries
            .shift_remove(&key)
            .map(|entry| entry.embedding)
    }

    /// Clear all entries and reset the hit counters.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        let dropped = state.entries.len();
        *state = CacheState::default();
        info!("Cleared embedding cache ({dropped} entries)");
    }

    /// Number of stored entries, including expired ones not yet looked up.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        let lookups = state.hits + state.misses;
        CacheStats {
            size: state.entries.len(),
            max_entries: self.max_entries,
            hits: state.hits,
            misses: state.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                state.hits as f64 / lookups as f64
            },
        }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub size: usize,

    /// Maximum cache size.
    pub max_entries: Option<usize>,

    /// Lookups that found a live entry.
    pub hits: u64,

    /// Lookups that found nothing or an expired entry.
    pub misses: u64,

    /// `hits / (hits + misses)`, or 0.0 before the first lookup.
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use pretty_assertions::assert_eq;

    fn manual_cache(config: CacheConfig) -> (EmbeddingCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (EmbeddingCache::with_clock(config, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_cache_put_get() {
        let cache = EmbeddingCache::default();
        let embedding = vec![1.0, 2.0, 3.0];

        cache.put("hello", embedding.clone()).await;

        assert_eq!(cache.get("hello").await, Some(embedding));
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let cache = EmbeddingCache::default();
        assert!(cache.get("not cached").await.is_none());
    }

    #[tokio::test]
    async fn test_keys_are_trimmed_and_lowercased() {
        let cache = EmbeddingCache::default();
        cache.put("Apple ", vec![1.0]).await;

        assert_eq!(cache.get("apple").await, Some(vec![1.0]));
        assert_eq!(cache.get("  APPLE").await, Some(vec![1.0]));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let (cache, clock) = manual_cache(CacheConfig::default().with_ttl_secs(60));
        cache.put("king", vec![0.5]).await;

        clock.advance(Duration::seconds(60));
        assert_eq!(cache.get("king").await, Some(vec![0.5]));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get("king").await, None);
        // dropped lazily on that lookup
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_hit_does_not_refresh_expiry() {
        let (cache, clock) = manual_cache(CacheConfig::default().with_ttl_secs(10));
        cache.put("queen", vec![1.0]).await;

        clock.advance(Duration::seconds(8));
        assert!(cache.get("queen").await.is_some());
        clock.advance(Duration::seconds(8));
        assert!(cache.get("queen").await.is_none());
    }

    #[tokio::test]
    async fn test_hit_rate_tracks_lookups() {
        let cache = EmbeddingCache::default();
        assert_eq!(cache.stats().await.hit_rate, 0.0);

        cache.put("a", vec![1.0]).await;
        for _ in 0..3 {
            cache.get("a").await;
        }
        cache.get("b").await;

        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses), (3, 1));
        assert!((stats.hit_rate - 0.75).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_expired_lookup_counts_as_miss() {
        let (cache, clock) = manual_cache(CacheConfig::default().with_ttl_secs(1));
        cache.put("a", vec![1.0]).await;
        clock.advance(Duration::seconds(2));

        cache.get("a").await;
        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses), (0, 1));
    }

    #[tokio::test]
    async fn test_eviction_is_insertion_ordered() {
        let cache = EmbeddingCache::new(CacheConfig::default().with_max_entries(2));

        cache.put("a", vec![1.0]).await;
        cache.put("b", vec![2.0]).await;
        // Reading "a" does not protect it: this is not an LRU.
        cache.get("a").await;
        cache.put("c", vec![3.0]).await;

        assert!(!cache.contains("a").await);
        assert!(cache.contains("b").await);
        assert!(cache.contains("c").await);
        assert_eq!(cache.stats().await.size, 2);
    }

    #[tokio::test]
    async fn test_reput_moves_key_to_newest() {
        let cache = EmbeddingCache::new(CacheConfig::default().with_max_entries(2));

        cache.put("a", vec![1.0]).await;
        cache.put("b", vec![2.0]).await;
        cache.put("a", vec![1.5]).await;
        cache.put("c", vec![3.0]).await;

        assert_eq!(cache.get("a").await, Some(vec![1.5]));
        assert!(!cache.contains("b").await);
    }

    #[tokio::test]
    async fn test_clear_resets_entries_and_counters() {
        let cache = EmbeddingCache::default();
        cache.put("a", vec![1.0]).await;
        cache.get("a").await;

        cache.clear().await;

        let stats = cache.stats().await;
        assert_eq!(stats.size, 0);
        assert_eq!((stats.hits, stats.misses), (0, 0));
    }

    #[tokio::test]
    async fn test_concurrent_lookups_are_all_counted() {
        let cache = Arc::new(EmbeddingCache::default());
        cache.put("shared", vec![1.0]).await;

        let mut handles = Vec::new();
        for i in 0..32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    cache.get("shared").await;
                } else {
                    cache.put(&format!("k{i}"), vec![i as f32]).await;
                    cache.get("missing").await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = cache.stats().await;
        assert_eq!(stats.hits + stats.misses, 32);
        assert_eq!(stats.hits, 16);
    }
}
