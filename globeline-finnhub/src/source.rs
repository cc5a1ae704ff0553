//! Finnhub endpoints behind the [`OverviewSource`] seam.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use globeline_core::{
    Candles, CompanyProfile, Metrics, OverviewSource, Quote, SubSource, Symbol, UpstreamResult,
};

use crate::client::FinnhubClient;

/// Endpoint paths relative to the API root.
pub mod endpoints {
    pub const PROFILE: &str = "/stock/profile2";
    pub const QUOTE: &str = "/quote";
    pub const METRICS: &str = "/stock/metric";
    pub const CANDLES: &str = "/stock/candle";
}

/// Query for the daily candle window ending at `now_secs`.
pub(crate) fn candle_query(symbol: &Symbol, now_secs: i64, window_days: u32) -> Vec<(&'static str, String)> {
    let from = now_secs - ChronoDuration::days(i64::from(window_days)).num_seconds();
    vec![
        ("symbol", symbol.to_string()),
        ("resolution", "D".to_string()),
        ("from", from.to_string()),
        ("to", now_secs.to_string()),
    ]
}

#[async_trait]
impl OverviewSource for FinnhubClient {
    async fn company_profile(&self, symbol: &Symbol) -> UpstreamResult<CompanyProfile> {
        self.get_json(
            SubSource::Profile,
            endpoints::PROFILE,
            &[("symbol", symbol.to_string())],
            symbol,
        )
        .await
    }

    async fn quote(&self, symbol: &Symbol) -> UpstreamResult<Quote> {
        self.get_json(
            SubSource::Quote,
            endpoints::QUOTE,
            &[("symbol", symbol.to_string())],
            symbol,
        )
        .await
    }

    async fn metrics(&self, symbol: &Symbol) -> UpstreamResult<Metrics> {
        self.get_json(
            SubSource::Metrics,
            endpoints::METRICS,
            &[("symbol", symbol.to_string()), ("metric", "all".to_string())],
            symbol,
        )
        .await
    }

    async fn candles(&self, symbol: &Symbol) -> UpstreamResult<Candles> {
        let query = candle_query(symbol, Utc::now().timestamp(), self.candle_window_days);
        self.get_json(SubSource::Candles, endpoints::CANDLES, &query, symbol)
            .await
    }
}
