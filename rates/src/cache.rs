//! TTL caching with single-flight refresh.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use ratewatch_common::{Reference, Snapshot};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::error::RatesResult;

/// Cached value entry.
#[derive(Debug)]
struct CacheEntry<V> {
    value: Arc<V>,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn new(value: Arc<V>, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
        }
    }

    fn is_valid(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

/// One key's slot. The lock is held for the whole refresh, so concurrent
/// callers for the same key wait for a single fetch and then read its result.
type Slot<V> = Arc<Mutex<Option<CacheEntry<V>>>>;

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    failures: AtomicU64,
}

/// Thread-safe TTL cache where each key is fetched by at most one caller at a time.
///
/// A refresh runs on its own task and owns the slot lock until the new entry
/// is stored, so it completes even if the caller that started it is dropped.
/// A failed fetch stores `V::default()` for the full TTL, so a broken
/// upstream is not hit again until the entry expires.
pub struct TtlCache<K, V> {
    name: &'static str,
    ttl: Duration,
    slots: DashMap<K, Slot<V>>,
    counters: Arc<Counters>,
}

/// Cache of rate snapshots keyed by reference currency.
pub type SnapshotCache = TtlCache<Reference, Snapshot>;

/// Shared snapshot cache.
pub type SharedSnapshotCache = Arc<SnapshotCache>;

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Default + Send + Sync + 'static,
{
    /// Create a cache whose entries live for `ttl`.
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            slots: DashMap::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Return the cached value for `key`, running `fetch` if it is missing or stale.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Arc<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RatesResult<V>> + Send + 'static,
    {
        let mut entry = self.slot(&key).lock_owned().await;

        if let Some(cached) = entry.as_ref().filter(|e| e.is_valid()) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(cache = self.name, key = ?key, "Cache hit");
            return cached.value.clone();
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(cache = self.name, key = ?key, "Cache miss, fetching");

        let (name, ttl, counters) = (self.name, self.ttl, self.counters.clone());
        let pending = fetch();
        let refresh = tokio::spawn(async move {
            let value = Arc::new(settle(name, &key, &counters, pending.await));
            *entry = Some(CacheEntry::new(value.clone(), ttl));
            value
        });

        match refresh.await {
            Ok(value) => value,
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                error!(cache = self.name, error = %e, "Refresh task failed");
                Arc::new(V::default())
            }
        }
    }

    /// Number of keys that have been fetched at least once.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the cache has never been populated.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let slots: Vec<Slot<V>> = self.slots.iter().map(|s| s.value().clone()).collect();

        let mut entries = 0;
        let mut valid_entries = 0;
        for slot in slots {
            // A locked slot is mid-refresh; report it once the fetch settles.
            if let Ok(entry) = slot.try_lock() {
                if let Some(entry) = entry.as_ref() {
                    entries += 1;
                    if entry.is_valid() {
                        valid_entries += 1;
                    }
                }
            }
        }

        CacheStats {
            entries,
            valid_entries,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    fn slot(&self, key: &K) -> Slot<V> {
        if let Some(slot) = self.slots.get(key) {
            return slot.clone();
        }

        self.slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }
}

/// Count a fetch outcome and turn failures into the empty value.
fn settle<K: Debug, V: Default>(
    name: &'static str,
    key: &K,
    counters: &Counters,
    result: RatesResult<V>,
) -> V {
    match result {
        Ok(value) => {
            counters.fetches.fetch_add(1, Ordering::Relaxed);
            value
        }
        Err(e) => {
            counters.failures.fetch_add(1, Ordering::Relaxed);
            if e.is_degradable() {
                warn!(cache = name, key = ?key, error = %e, "Fetch degraded, caching empty value");
            } else {
                error!(
                    cache = name,
                    key = ?key,
                    code = e.error_code(),
                    error = %e,
                    "Fetch failed, caching empty value"
                );
            }
            V::default()
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub valid_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RatesError;
    use std::sync::atomic::AtomicUsize;

    fn delayed_fetch(
        counter: Arc<AtomicUsize>,
        value: u32,
        delay: Duration,
    ) -> impl Future<Output = RatesResult<u32>> + Send + 'static {
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(value)
        }
    }

    fn counting_fetch(
        counter: Arc<AtomicUsize>,
        value: u32,
    ) -> impl Future<Output = RatesResult<u32>> + Send + 'static {
        delayed_fetch(counter, value, Duration::from_millis(10))
    }

    fn counted<T: Send + 'static>(
        counter: Arc<AtomicUsize>,
        result: RatesResult<T>,
    ) -> impl Future<Output = RatesResult<T>> + Send + 'static {
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            result
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetch() {
        let cache: TtlCache<&str, u32> = TtlCache::new("test", Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.get_or_fetch("a", || counting_fetch(calls.clone(), 7)).await;
        let second = cache.get_or_fetch("a", || counting_fetch(calls.clone(), 8)).await;

        assert_eq!(*first, 7);
        assert_eq!(*second, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let cache: TtlCache<&str, u32> = TtlCache::new("test", Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_fetch("a", || counting_fetch(calls.clone(), 1)).await;
        let b = cache.get_or_fetch("b", || counting_fetch(calls.clone(), 2)).await;

        assert_eq!(*b, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expiry_refetches() {
        let cache: TtlCache<&str, u32> = TtlCache::new("test", Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_fetch("a", || counting_fetch(calls.clone(), 1)).await;

        tokio::time::advance(Duration::from_secs(30)).await;
        let cached = cache.get_or_fetch("a", || counting_fetch(calls.clone(), 2)).await;
        assert_eq!(*cached, 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        let refreshed = cache.get_or_fetch("a", || counting_fetch(calls.clone(), 2)).await;
        assert_eq!(*refreshed, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_flight() {
        let cache: Arc<TtlCache<&str, u32>> =
            Arc::new(TtlCache::new("test", Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_fetch("a", || {
                            delayed_fetch(calls, 42, Duration::from_millis(50))
                        })
                        .await
                })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(*result.unwrap(), 42);
        }

        let stats = cache.stats().await;
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_outlives_cancelled_caller() {
        let cache: Arc<TtlCache<&str, u32>> =
            Arc::new(TtlCache::new("test", Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let spawn_get = |value: u32| {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch("a", || {
                        delayed_fetch(calls, value, Duration::from_millis(200))
                    })
                    .await
            })
        };

        let first = spawn_get(1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = spawn_get(2);
        tokio::time::sleep(Duration::from_millis(20)).await;
        first.abort();

        assert_eq!(*second.await.unwrap(), 1);
        assert!(first.await.unwrap_err().is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats().await;
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.valid_entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_caches_default_for_ttl() {
        let cache: TtlCache<&str, Vec<u32>> = TtlCache::new("test", Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let failed = cache
            .get_or_fetch("a", || {
                counted(calls.clone(), Err(RatesError::malformed("test", "unexpected token")))
            })
            .await;
        assert!(failed.is_empty());

        let still_empty = cache
            .get_or_fetch("a", || counted(calls.clone(), Ok(vec![1])))
            .await;
        assert!(still_empty.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let recovered = cache
            .get_or_fetch("a", || counted(calls.clone(), Ok(vec![1])))
            .await;
        assert_eq!(*recovered, vec![1]);

        let stats = cache.stats().await;
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.valid_entries, 1);
    }
}
