//! Scripted in-memory [`OverviewSource`].
//!
//! Serves the sample payloads, counts every call per sub-source and symbol,
//! and can be told to fail, report not-found, add latency, or hold every
//! response behind a gate until released.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use globeline_core::{
    Candles, CompanyProfile, Metrics, OverviewSource, Quote, SubSource, Symbol, UpstreamError,
    UpstreamResult,
};
use tokio::sync::watch;

use crate::fixtures::{apple_candles, apple_metrics, apple_quote, profile_for};

#[derive(Debug, Default)]
struct Script {
    failures: HashMap<SubSource, UpstreamError>,
    not_found: HashSet<Symbol>,
    latency: HashMap<Symbol, Duration>,
    default_latency: Duration,
    quote: Option<Quote>,
    metrics: Option<Metrics>,
    calls: HashMap<(Symbol, SubSource), usize>,
}

/// Mock sub-source fetcher for aggregator tests.
#[derive(Debug)]
pub struct ScriptedSource {
    script: Mutex<Script>,
    totals: [AtomicUsize; 4],
    gate: watch::Sender<bool>,
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSource {
    /// Source that answers every call successfully and immediately.
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            script: Mutex::new(Script::default()),
            totals: Default::default(),
            gate,
        }
    }

    /// Latency applied to symbols without their own setting.
    pub fn with_default_latency(self, latency: Duration) -> Self {
        self.lock().default_latency = latency;
        self
    }

    pub fn set_latency(&self, symbol: &Symbol, latency: Duration) {
        self.lock().latency.insert(symbol.clone(), latency);
    }

    /// Make every call to `sub_source` fail with `error` until cleared.
    pub fn fail(&self, sub_source: SubSource, error: UpstreamError) {
        self.lock().failures.insert(sub_source, error);
    }

    /// Make every call to `sub_source` fail as unavailable with a 500.
    pub fn fail_unavailable(&self, sub_source: SubSource) {
        self.fail(
            sub_source,
            UpstreamError::Unavailable {
                sub_source,
                reason: "status 500 Internal Server Error".to_string(),
            },
        );
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Answer every sub-source for `symbol` with not-found.
    pub fn not_found(&self, symbol: &Symbol) {
        self.lock().not_found.insert(symbol.clone());
    }

    pub fn set_quote(&self, quote: Quote) {
        self.lock().quote = Some(quote);
    }

    pub fn set_metrics(&self, metrics: Metrics) {
        self.lock().metrics = Some(metrics);
    }

    /// Hold every response until [`ScriptedSource::release`].
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Calls made to `sub_source` across all symbols.
    pub fn calls(&self, sub_source: SubSource) -> usize {
        self.totals[index(sub_source)].load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, symbol: &Symbol, sub_source: SubSource) -> usize {
        self.lock()
            .calls
            .get(&(symbol.clone(), sub_source))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        SubSource::ALL.iter().map(|s| self.calls(*s)).sum()
    }

    /// Composite fetches started. Every fetch asks for the profile once.
    pub fn fetch_sequences(&self) -> usize {
        self.calls(SubSource::Profile)
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn respond<T>(
        &self,
        symbol: &Symbol,
        sub_source: SubSource,
        payload: impl FnOnce(&Script) -> T,
    ) -> UpstreamResult<T> {
        self.totals[index(sub_source)].fetch_add(1, Ordering::SeqCst);
        let latency = {
            let mut script = self.lock();
            *script
                .calls
                .entry((symbol.clone(), sub_source))
                .or_insert(0) += 1;
            script
                .latency
                .get(symbol)
                .copied()
                .unwrap_or(script.default_latency)
        };

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let script = self.lock();
        if script.not_found.contains(symbol) {
            return Err(UpstreamError::NotFound {
                sub_source,
                symbol: symbol.to_string(),
            });
        }
        if let Some(error) = script.failures.get(&sub_source) {
            return Err(error.clone());
        }
        Ok(payload(&script))
    }
}

fn index(sub_source: SubSource) -> usize {
    match sub_source {
        SubSource::Profile => 0,
        SubSource::Quote => 1,
        SubSource::Metrics => 2,
        SubSource::Candles => 3,
    }
}

#[async_trait]
impl OverviewSource for ScriptedSource {
    async fn company_profile(&self, symbol: &Symbol) -> UpstreamResult<CompanyProfile> {
        self.respond(symbol, SubSource::Profile, |_| profile_for(symbol.as_str()))
            .await
    }

    async fn quote(&self, symbol: &Symbol) -> UpstreamResult<Quote> {
        self.respond(symbol, SubSource::Quote, |script| {
            script.quote.clone().unwrap_or_else(apple_quote)
        })
        .await
    }

    async fn metrics(&self, symbol: &Symbol) -> UpstreamResult<Metrics> {
        self.respond(symbol, SubSource::Metrics, |script| {
            script.metrics.clone().unwrap_or_else(apple_metrics)
        })
        .await
    }

    async fn candles(&self, symbol: &Symbol) -> UpstreamResult<Candles> {
        self.respond(symbol, SubSource::Candles, |_| apple_candles())
            .await
    }
}
