//! Cache-aside, coalescing, fan-out aggregation with stale fallback.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::FutureExt;
use globeline_core::{
    combine, AggregatorConfig, CacheSettings, Candles, GlobeResult, OverviewError, OverviewSource,
    Symbol, TickerOverview, UpstreamError,
};
use globeline_finnhub::FinnhubClient;
use globeline_storage::{Attachment, InFlightRegistry, SnapshotCache};
use tracing::{debug, error, info, warn};

use crate::observer::{AggregationObserver, NoopObserver};

/// What to do when a required sub-source fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Return the error to every waiter. Cached data is not consulted.
    Propagate,
    /// Serve the last cached snapshot if one exists.
    ServeStale,
}

/// Fallback policy for each failure class.
///
/// Exhaustive on purpose: a new failure class must be placed explicitly.
pub fn fallback_for(error: &UpstreamError) -> Fallback {
    match error {
        UpstreamError::NotFound { .. } => Fallback::Propagate,
        UpstreamError::RateLimited { .. }
        | UpstreamError::Forbidden { .. }
        | UpstreamError::Timeout { .. }
        | UpstreamError::Unavailable { .. }
        | UpstreamError::Malformed { .. } => Fallback::ServeStale,
    }
}

/// Caller-facing error for a required sub-source failure.
fn overview_error(symbol: &Symbol, error: &UpstreamError) -> OverviewError {
    match error {
        UpstreamError::NotFound { .. } => OverviewError::NotFound {
            symbol: symbol.to_string(),
        },
        UpstreamError::RateLimited { .. }
        | UpstreamError::Forbidden { .. }
        | UpstreamError::Timeout { .. }
        | UpstreamError::Unavailable { .. }
        | UpstreamError::Malformed { .. } => OverviewError::ServiceUnavailable {
            symbol: symbol.to_string(),
            reason: error.to_string(),
        },
    }
}

struct Core {
    source: Arc<dyn OverviewSource>,
    cache: SnapshotCache,
    in_flight: InFlightRegistry,
    observer: Arc<dyn AggregationObserver>,
}

/// Ticker overview orchestrator.
///
/// Cheap to clone; clones share the cache and the in-flight registry.
#[derive(Clone)]
pub struct OverviewAggregator {
    core: Arc<Core>,
}

impl OverviewAggregator {
    pub fn new(source: Arc<dyn OverviewSource>, cache: &CacheSettings) -> Self {
        Self::with_observer(source, cache, Arc::new(NoopObserver))
    }

    pub fn with_observer(
        source: Arc<dyn OverviewSource>,
        cache: &CacheSettings,
        observer: Arc<dyn AggregationObserver>,
    ) -> Self {
        Self {
            core: Arc::new(Core {
                source,
                cache: SnapshotCache::new(cache),
                in_flight: InFlightRegistry::new(),
                observer,
            }),
        }
    }

    /// Build an aggregator backed by the Finnhub client.
    ///
    /// # Errors
    /// Returns a config error if `config` does not validate.
    pub fn from_config(
        config: &AggregatorConfig,
        observer: Arc<dyn AggregationObserver>,
    ) -> GlobeResult<Self> {
        config.validate()?;
        let client = FinnhubClient::new(&config.upstream)?;
        Ok(Self::with_observer(Arc::new(client), &config.cache, observer))
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.core.cache
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.core.in_flight
    }

    /// Overview for `symbol`.
    ///
    /// Fails with exactly one of `NotFound`, `ServiceUnavailable` or
    /// `Internal`. Must be called from within a Tokio runtime.
    pub async fn get_overview(&self, symbol: &Symbol) -> Result<TickerOverview, OverviewError> {
        let result = self.resolve(symbol).await;
        if let Err(err) = &result {
            self.core.observer.on_request_failed(symbol, err);
        }
        result
    }

    async fn resolve(&self, symbol: &Symbol) -> Result<TickerOverview, OverviewError> {
        if let Some(hit) = self.core.cache.get(symbol) {
            debug!(symbol = %symbol, "Cache hit");
            self.core.observer.on_cache_hit(symbol);
            return Ok(hit);
        }
        debug!(symbol = %symbol, "Cache miss");
        self.core.observer.on_cache_miss(symbol);

        let core = Arc::clone(&self.core);
        let key = symbol.clone();
        let (pending, attachment) = self
            .core
            .in_flight
            .get_or_create(symbol, move || core.fetch(key));

        match attachment {
            Attachment::Started => self.core.observer.on_fetch_started(symbol),
            Attachment::Joined => self.core.observer.on_in_flight_joined(symbol),
        }

        pending.await
    }
}

impl std::fmt::Debug for OverviewAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverviewAggregator")
            .field("cache", &self.core.cache)
            .field("in_flight", &self.core.in_flight)
            .finish()
    }
}

impl Core {
    /// One composite fetch. Runs on its own task via the in-flight registry,
    /// so every attached caller sees the single outcome settled here.
    async fn fetch(self: Arc<Self>, symbol: Symbol) -> Result<TickerOverview, OverviewError> {
        match AssertUnwindSafe(self.fetch_fresh(&symbol)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let reason = format!("aggregation panicked: {}", panic_message(panic.as_ref()));
                error!(symbol = %symbol, reason, "Fetch failed internally");
                self.serve_stale(&symbol, &reason)
                    .ok_or_else(|| OverviewError::Internal {
                        symbol: symbol.to_string(),
                        reason,
                    })
            }
        }
    }

    async fn fetch_fresh(&self, symbol: &Symbol) -> Result<TickerOverview, OverviewError> {
        // A fetch that finished between our cache miss and registration has
        // already written the cache.
        if let Some(hit) = self.cache.peek(symbol) {
            debug!(symbol = %symbol, "Cache filled before fetch started");
            return Ok(hit);
        }

        let started = Instant::now();
        let candles = async {
            match self.source.candles(symbol).await {
                Ok(candles) => Ok::<_, UpstreamError>(candles),
                Err(err) => {
                    warn!(
                        symbol = %symbol,
                        kind = err.kind(),
                        error = %err,
                        "Candles unavailable, continuing without OHLC data"
                    );
                    self.observer.on_optional_degraded(symbol, &err);
                    Ok(Candles::unavailable())
                }
            }
        };

        let fetched = tokio::try_join!(
            self.source.company_profile(symbol),
            self.source.quote(symbol),
            self.source.metrics(symbol),
            candles,
        );

        match fetched {
            Ok((profile, quote, metrics, candles)) => {
                let overview = combine(&profile, &quote, &metrics, &candles, Utc::now());
                self.cache.put(symbol.clone(), overview.clone());

                let elapsed = started.elapsed();
                self.observer.on_fetch_succeeded(symbol, elapsed);
                info!(
                    symbol = %symbol,
                    elapsed_ms = elapsed.as_millis() as u64,
                    ohlc_points = overview.ohlc_data.len(),
                    "Aggregated overview"
                );
                Ok(overview)
            }
            Err(err) => self.recover(symbol, err),
        }
    }

    fn recover(&self, symbol: &Symbol, err: UpstreamError) -> Result<TickerOverview, OverviewError> {
        self.observer.on_upstream_failed(symbol, &err);

        match fallback_for(&err) {
            Fallback::Propagate => {
                info!(
                    symbol = %symbol,
                    sub_source = %err.sub_source(),
                    kind = err.kind(),
                    "Symbol rejected upstream"
                );
                Err(overview_error(symbol, &err))
            }
            Fallback::ServeStale => {
                error!(
                    symbol = %symbol,
                    sub_source = %err.sub_source(),
                    kind = err.kind(),
                    error = %err,
                    "Required sub-source failed"
                );
                self.serve_stale(symbol, &err.to_string())
                    .ok_or_else(|| overview_error(symbol, &err))
            }
        }
    }

    /// Last cached snapshot re-stamped to now. The cache entry is not touched.
    fn serve_stale(&self, symbol: &Symbol, cause: &str) -> Option<TickerOverview> {
        let read = self.cache.get_stale(symbol)?;
        let age = read.staleness();
        let overview = read.into_value().restamped(Utc::now());

        self.observer.on_stale_fallback(symbol, age);
        warn!(
            symbol = %symbol,
            age_ms = age.as_millis() as u64,
            cause,
            "Serving stale overview"
        );
        Some(overview)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string payload"
    }
}
