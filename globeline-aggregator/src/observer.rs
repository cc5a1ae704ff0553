//! Aggregation event observer.
//!
//! The orchestrator reports what it did through this narrow interface and
//! stays free of any metrics backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use globeline_core::{OverviewError, Symbol, UpstreamError};

/// Callbacks fired by [`crate::OverviewAggregator`].
///
/// All methods default to no-ops. Implementations must be cheap and must not
/// block: they run inline on the request path.
pub trait AggregationObserver: Send + Sync {
    fn on_cache_hit(&self, _symbol: &Symbol) {}

    fn on_cache_miss(&self, _symbol: &Symbol) {}

    /// The caller attached to a fetch started by someone else.
    fn on_in_flight_joined(&self, _symbol: &Symbol) {}

    /// The caller registered a new fetch.
    fn on_fetch_started(&self, _symbol: &Symbol) {}

    fn on_fetch_succeeded(&self, _symbol: &Symbol, _elapsed: Duration) {}

    /// The optional candle source failed and was replaced by the sentinel.
    fn on_optional_degraded(&self, _symbol: &Symbol, _error: &UpstreamError) {}

    /// A required sub-source failed terminally.
    fn on_upstream_failed(&self, _symbol: &Symbol, _error: &UpstreamError) {}

    /// A cached snapshot of the given age was served instead of an error.
    fn on_stale_fallback(&self, _symbol: &Symbol, _age: Duration) {}

    /// The caller received an error.
    fn on_request_failed(&self, _symbol: &Symbol, _error: &OverviewError) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl AggregationObserver for NoopObserver {}

/// Counting observer.
#[derive(Debug, Default)]
pub struct AggregationStats {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub in_flight_joins: AtomicU64,
    pub fetches_started: AtomicU64,
    pub fetches_succeeded: AtomicU64,
    pub optional_degraded: AtomicU64,
    pub upstream_failures: AtomicU64,
    pub stale_served: AtomicU64,
    pub not_found: AtomicU64,
    pub service_unavailable: AtomicU64,
    pub internal_errors: AtomicU64,
    /// Sum of successful fetch durations in milliseconds.
    pub fetch_millis_total: AtomicU64,
}

impl AggregationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all counters.
    pub fn snapshot(&self) -> AggregationStatsSnapshot {
        AggregationStatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            in_flight_joins: self.in_flight_joins.load(Ordering::Relaxed),
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetches_succeeded: self.fetches_succeeded.load(Ordering::Relaxed),
            optional_degraded: self.optional_degraded.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            service_unavailable: self.service_unavailable.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
            fetch_millis_total: self.fetch_millis_total.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl AggregationObserver for AggregationStats {
    fn on_cache_hit(&self, _symbol: &Symbol) {
        bump(&self.cache_hits);
    }

    fn on_cache_miss(&self, _symbol: &Symbol) {
        bump(&self.cache_misses);
    }

    fn on_in_flight_joined(&self, _symbol: &Symbol) {
        bump(&self.in_flight_joins);
    }

    fn on_fetch_started(&self, _symbol: &Symbol) {
        bump(&self.fetches_started);
    }

    fn on_fetch_succeeded(&self, _symbol: &Symbol, elapsed: Duration) {
        bump(&self.fetches_succeeded);
        self.fetch_millis_total
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    fn on_optional_degraded(&self, _symbol: &Symbol, _error: &UpstreamError) {
        bump(&self.optional_degraded);
    }

    fn on_upstream_failed(&self, _symbol: &Symbol, _error: &UpstreamError) {
        bump(&self.upstream_failures);
    }

    fn on_stale_fallback(&self, _symbol: &Symbol, _age: Duration) {
        bump(&self.stale_served);
    }

    fn on_request_failed(&self, _symbol: &Symbol, error: &OverviewError) {
        match error {
            OverviewError::NotFound { .. } => bump(&self.not_found),
            OverviewError::ServiceUnavailable { .. } => bump(&self.service_unavailable),
            OverviewError::Internal { .. } => bump(&self.internal_errors),
        }
    }
}

/// Snapshot of aggregation counters at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationStatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub in_flight_joins: u64,
    pub fetches_started: u64,
    pub fetches_succeeded: u64,
    pub optional_degraded: u64,
    pub upstream_failures: u64,
    pub stale_served: u64,
    pub not_found: u64,
    pub service_unavailable: u64,
    pub internal_errors: u64,
    pub fetch_millis_total: u64,
}

impl AggregationStatsSnapshot {
    /// Mean successful fetch duration, if any fetch succeeded.
    pub fn mean_fetch_time(&self) -> Option<Duration> {
        (self.fetches_succeeded > 0)
            .then(|| Duration::from_millis(self.fetch_millis_total / self.fetches_succeeded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol() -> Symbol {
        Symbol::parse("AAPL").unwrap()
    }

    #[test]
    fn test_stats_count_events() {
        let stats = AggregationStats::new();
        stats.on_cache_hit(&symbol());
        stats.on_cache_miss(&symbol());
        stats.on_cache_miss(&symbol());
        stats.on_fetch_succeeded(&symbol(), Duration::from_millis(30));
        stats.on_fetch_succeeded(&symbol(), Duration::from_millis(10));
        stats.on_request_failed(
            &symbol(),
            &OverviewError::NotFound {
                symbol: "AAPL".to_string(),
            },
        );

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 2);
        assert_eq!(snapshot.fetches_succeeded, 2);
        assert_eq!(snapshot.not_found, 1);
        assert_eq!(snapshot.mean_fetch_time(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_mean_fetch_time_empty() {
        assert_eq!(AggregationStatsSnapshot::default().mean_fetch_time(), None);
    }

    #[test]
    fn test_noop_observer_accepts_everything() {
        let observer: &dyn AggregationObserver = &NoopObserver;
        observer.on_cache_hit(&symbol());
        observer.on_stale_fallback(&symbol(), Duration::from_secs(40));
    }
}
