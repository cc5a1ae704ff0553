//! Timing and logging decorator around [`OverviewAggregator`].

use std::sync::Arc;
use std::time::Instant;

use globeline_core::{
    AggregatorConfig, CacheSettings, GlobeResult, OverviewError, OverviewSource, Symbol,
    TickerOverview,
};
use tracing::{info_span, Instrument};

use crate::aggregator::OverviewAggregator;
use crate::observer::{AggregationStats, AggregationStatsSnapshot};

/// [`OverviewAggregator`] with outcome counters and one log line per call.
///
/// Errors are logged by class: not-found at info, unavailable at warn and
/// internal at error.
#[derive(Debug, Clone)]
pub struct InstrumentedAggregator {
    inner: OverviewAggregator,
    stats: Arc<AggregationStats>,
}

impl InstrumentedAggregator {
    pub fn new(source: Arc<dyn OverviewSource>, cache: &CacheSettings) -> Self {
        let stats = Arc::new(AggregationStats::new());
        let inner = OverviewAggregator::with_observer(source, cache, stats.clone());
        Self { inner, stats }
    }

    /// Build a Finnhub-backed instrumented aggregator.
    pub fn from_config(config: &AggregatorConfig) -> GlobeResult<Self> {
        let stats = Arc::new(AggregationStats::new());
        let inner = OverviewAggregator::from_config(config, stats.clone())?;
        Ok(Self { inner, stats })
    }

    pub fn core(&self) -> &OverviewAggregator {
        &self.inner
    }

    pub fn stats(&self) -> AggregationStatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn get_overview(&self, symbol: &Symbol) -> Result<TickerOverview, OverviewError> {
        let span = info_span!("get_overview", symbol = %symbol);
        async {
            let start = Instant::now();
            let result = self.inner.get_overview(symbol).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(overview) => tracing::debug!(
                    elapsed_ms,
                    last_updated = %overview.last_updated,
                    "Overview served"
                ),
                Err(err @ OverviewError::NotFound { .. }) => {
                    tracing::info!(elapsed_ms, error = %err, "Symbol not found")
                }
                Err(err @ OverviewError::ServiceUnavailable { .. }) => {
                    tracing::warn!(elapsed_ms, error = %err, "Overview unavailable")
                }
                Err(err @ OverviewError::Internal { .. }) => {
                    tracing::error!(elapsed_ms, error = %err, "Overview failed internally")
                }
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use globeline_core::SubSource;
    use globeline_test_utils::{sym, ScriptedSource};

    fn settings() -> CacheSettings {
        CacheSettings::default()
    }

    #[tokio::test]
    async fn test_stats_track_hits_and_misses() {
        let source = Arc::new(ScriptedSource::new());
        let aggregator = InstrumentedAggregator::new(source.clone(), &settings());
        let symbol = sym("AAPL");

        aggregator.get_overview(&symbol).await.unwrap();
        aggregator.get_overview(&symbol).await.unwrap();

        let stats = aggregator.stats();
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.fetches_started, 1);
        assert_eq!(stats.fetches_succeeded, 1);
        assert_eq!(source.fetch_sequences(), 1);
    }

    #[tokio::test]
    async fn test_stats_track_error_classes() {
        let source = Arc::new(ScriptedSource::new());
        source.not_found(&sym("GONE"));
        source.fail_unavailable(SubSource::Metrics);
        let aggregator = InstrumentedAggregator::new(source.clone(), &settings());

        let err = aggregator.get_overview(&sym("GONE")).await.unwrap_err();
        assert!(matches!(err, OverviewError::NotFound { .. }));

        let err = aggregator.get_overview(&sym("MSFT")).await.unwrap_err();
        assert!(matches!(err, OverviewError::ServiceUnavailable { .. }));

        let stats = aggregator.stats();
        assert_eq!(stats.not_found, 1);
        assert_eq!(stats.service_unavailable, 1);
        assert_eq!(stats.upstream_failures, 2);
        assert_eq!(stats.stale_served, 0);
    }

    #[tokio::test]
    async fn test_stats_track_degraded_candles() {
        let source = Arc::new(ScriptedSource::new());
        source.fail_unavailable(SubSource::Candles);
        let aggregator = InstrumentedAggregator::new(source, &settings());

        let overview = aggregator.get_overview(&sym("AAPL")).await.unwrap();
        assert!(overview.ohlc_data.is_empty());
        assert_eq!(aggregator.stats().optional_degraded, 1);
    }
}
