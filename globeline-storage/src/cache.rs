//! Bounded, time-expiring snapshot cache.
//!
//! Entries stay physically present after their TTL so they can back a stale
//! fallback. They leave the cache only when overwritten or when the size
//! bound evicts the least-recently-written entry.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use globeline_core::{CacheSettings, Symbol, TickerOverview};
use tracing::debug;

use crate::freshness::CacheRead;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Fresh reads served.
    pub hits: u64,
    /// Fresh reads that found nothing usable.
    pub misses: u64,
    /// Stale lookups that returned a value.
    pub stale_reads: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    overview: TickerOverview,
    cached_at: DateTime<Utc>,
    /// Write sequence number, key into `write_order`.
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<Symbol, CacheEntry>,
    /// Oldest write first.
    write_order: BTreeMap<u64, Symbol>,
    next_seq: u64,
}

/// In-memory snapshot cache keyed by [`Symbol`].
#[derive(Debug)]
pub struct SnapshotCache {
    inner: RwLock<Inner>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    stale_reads: AtomicU64,
    evictions: AtomicU64,
}

impl SnapshotCache {
    /// Create a cache. A `max_entries` of zero is treated as one.
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            ttl: settings.ttl,
            max_entries: settings.max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale_reads: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Fresh value for `key`, or `None` if absent or expired.
    pub fn get(&self, key: &Symbol) -> Option<TickerOverview> {
        self.get_at(key, Utc::now())
    }

    /// [`SnapshotCache::get`] evaluated at an explicit instant.
    pub fn get_at(&self, key: &Symbol, now: DateTime<Utc>) -> Option<TickerOverview> {
        let found = {
            let inner = self.read();
            inner
                .entries
                .get(key)
                .filter(|entry| self.is_fresh(entry, now))
                .map(|entry| entry.overview.clone())
        };

        match found {
            Some(overview) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(overview)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Fresh value for `key` without touching the hit/miss counters.
    pub fn peek(&self, key: &Symbol) -> Option<TickerOverview> {
        let now = Utc::now();
        let inner = self.read();
        inner
            .entries
            .get(key)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| entry.overview.clone())
    }

    /// Last written value for `key` regardless of age.
    pub fn get_stale(&self, key: &Symbol) -> Option<CacheRead<TickerOverview>> {
        let read = {
            let inner = self.read();
            inner
                .entries
                .get(key)
                .map(|entry| CacheRead::new(entry.overview.clone(), entry.cached_at))
        };
        if read.is_some() {
            self.stale_reads.fetch_add(1, Ordering::Relaxed);
        }
        read
    }

    /// Store `overview` under `key`, written now.
    pub fn put(&self, key: Symbol, overview: TickerOverview) {
        self.put_at(key, overview, Utc::now());
    }

    /// Store `overview` under `key` with an explicit write time.
    ///
    /// Overwrites any existing entry and evicts the least-recently-written
    /// entries while the cache is over its bound.
    pub fn put_at(&self, key: Symbol, overview: TickerOverview, cached_at: DateTime<Utc>) {
        let mut inner = self.write();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let entry = CacheEntry {
            overview,
            cached_at,
            seq,
        };
        if let Some(previous) = inner.entries.insert(key.clone(), entry) {
            inner.write_order.remove(&previous.seq);
        }
        inner.write_order.insert(seq, key);

        while inner.entries.len() > self.max_entries {
            let Some((_, oldest)) = inner.write_order.pop_first() else {
                break;
            };
            inner.entries.remove(&oldest);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(symbol = %oldest, "Evicted least-recently-written snapshot");
        }
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale_reads: self.stale_reads.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        match (now - entry.cached_at).to_std() {
            Ok(age) => age < self.ttl,
            // Written after `now`: not expired.
            Err(_) => true,
        }
    }

    // A panic while holding the lock cannot leave `Inner` half-updated in a
    // way that breaks reads, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use globeline_test_utils::fixtures::sample_overview;
    use proptest::prelude::*;

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).unwrap()
    }

    fn cache(ttl_secs: u64, max_entries: usize) -> SnapshotCache {
        SnapshotCache::new(&CacheSettings {
            ttl: Duration::from_secs(ttl_secs),
            max_entries,
        })
    }

    #[test]
    fn test_get_within_ttl() {
        let cache = cache(30, 10);
        let now = Utc::now();
        let overview = sample_overview("AAPL", now);
        cache.put_at(symbol("AAPL"), overview.clone(), now - ChronoDuration::seconds(10));

        assert_eq!(cache.get_at(&symbol("aapl"), now), Some(overview));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_peek_does_not_count() {
        let cache = cache(30, 10);
        assert!(cache.peek(&symbol("AAPL")).is_none());
        cache.put(symbol("AAPL"), sample_overview("AAPL", Utc::now()));
        assert!(cache.peek(&symbol("AAPL")).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_expired_entry_is_absent_but_stale_readable() {
        let cache = cache(30, 10);
        let now = Utc::now();
        let overview = sample_overview("AAPL", now);
        let written = now - ChronoDuration::seconds(40);
        cache.put_at(symbol("AAPL"), overview.clone(), written);

        assert_eq!(cache.get_at(&symbol("AAPL"), now), None);
        let stale = cache.get_stale(&symbol("AAPL")).unwrap();
        assert_eq!(stale.value(), &overview);
        assert_eq!(stale.cached_at(), written);
        assert_eq!(cache.len(), 1);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.stale_reads, 1);
    }

    #[test]
    fn test_reads_do_not_mutate() {
        let cache = cache(30, 10);
        let now = Utc::now();
        let overview = sample_overview("AAPL", now);
        let written = now - ChronoDuration::seconds(40);
        cache.put_at(symbol("AAPL"), overview.clone(), written);

        for _ in 0..3 {
            let _ = cache.get_at(&symbol("AAPL"), now);
            let _ = cache.get_stale(&symbol("AAPL"));
        }
        let stale = cache.get_stale(&symbol("AAPL")).unwrap();
        assert_eq!(stale.cached_at(), written);
        assert_eq!(stale.into_value(), overview);
    }

    #[test]
    fn test_put_overwrites() {
        let cache = cache(30, 10);
        let now = Utc::now();
        cache.put_at(symbol("AAPL"), sample_overview("AAPL", now), now - ChronoDuration::seconds(40));
        let newer = TickerOverview {
            current_price: Some(151.0),
            ..sample_overview("AAPL", now)
        };
        cache.put_at(symbol("AAPL"), newer.clone(), now);

        assert_eq!(cache.get_at(&symbol("AAPL"), now), Some(newer));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_recently_written() {
        let cache = cache(30, 2);
        let now = Utc::now();
        cache.put_at(symbol("AAA"), sample_overview("AAA", now), now);
        cache.put_at(symbol("BBB"), sample_overview("BBB", now), now);
        // Rewriting AAA makes BBB the oldest write.
        cache.put_at(symbol("AAA"), sample_overview("AAA", now), now);
        cache.put_at(symbol("CCC"), sample_overview("CCC", now), now);

        assert_eq!(cache.len(), 2);
        assert!(cache.get_stale(&symbol("BBB")).is_none());
        assert!(cache.get_stale(&symbol("AAA")).is_some());
        assert!(cache.get_stale(&symbol("CCC")).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_reads_do_not_affect_eviction_order() {
        let cache = cache(30, 2);
        let now = Utc::now();
        cache.put_at(symbol("AAA"), sample_overview("AAA", now), now);
        cache.put_at(symbol("BBB"), sample_overview("BBB", now), now);
        let _ = cache.get_at(&symbol("AAA"), now);
        cache.put_at(symbol("CCC"), sample_overview("CCC", now), now);

        assert!(cache.get_stale(&symbol("AAA")).is_none());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);
        assert!((CacheStats::default().hit_rate() - 0.0).abs() < 0.001);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_put() {
        let cache = std::sync::Arc::new(cache(30, 8));
        let mut handles = Vec::new();
        for i in 0..32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let key = symbol(&format!("K{}", i % 16));
                for _ in 0..50 {
                    cache.put(key.clone(), sample_overview(key.as_str(), Utc::now()));
                    let _ = cache.get(&key);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.len(), 8);
    }

    proptest! {
        #[test]
        fn prop_bound_keeps_most_recently_written(
            writes in proptest::collection::vec(0usize..12, 0..60),
            max_entries in 1usize..6,
        ) {
            let cache = cache(30, max_entries);
            let now = Utc::now();
            let mut order: Vec<usize> = Vec::new();
            let mut evicted = 0u64;

            for k in &writes {
                let key = format!("K{}", k);
                cache.put_at(symbol(&key), sample_overview(&key, now), now);

                order.retain(|existing| existing != k);
                order.push(*k);
                if order.len() > max_entries {
                    order.remove(0);
                    evicted += 1;
                }
            }

            prop_assert_eq!(cache.len(), order.len());
            prop_assert!(cache.len() <= max_entries);
            for k in 0..12usize {
                let present = cache.peek(&symbol(&format!("K{}", k))).is_some();
                prop_assert_eq!(present, order.contains(&k));
            }
            prop_assert_eq!(cache.stats().evictions, evicted);
        }
    }
}
