//! Sample payloads modelled on a large-cap US listing.

use chrono::{DateTime, Utc};
use globeline_core::combine::metric_keys;
use globeline_core::{Candles, CompanyProfile, Metrics, Quote, TickerOverview};

/// Profile for "Apple Inc.", Technology, US.
pub fn apple_profile() -> CompanyProfile {
    CompanyProfile {
        ticker: Some("AAPL".to_string()),
        name: Some("Apple Inc.".to_string()),
        country: Some("US".to_string()),
        currency: Some("USD".to_string()),
        exchange: Some("NASDAQ NMS - GLOBAL MARKET".to_string()),
        ipo: Some("1980-12-12".to_string()),
        market_capitalization: Some(2_500_000.0),
        share_outstanding: Some(15_500.0),
        weburl: Some("https://www.apple.com/".to_string()),
        logo: Some("https://static.finnhub.io/logo/87cb30d8-80df-11ea-8951-00000000092a.png".to_string()),
        finnhub_industry: Some("Technology".to_string()),
        phone: Some("14089961010".to_string()),
    }
}

/// Same shape as [`apple_profile`] with the ticker and name set to `symbol`.
pub fn profile_for(symbol: &str) -> CompanyProfile {
    CompanyProfile {
        ticker: Some(symbol.to_string()),
        name: Some(format!("{} Corp.", symbol)),
        ..apple_profile()
    }
}

pub fn apple_quote() -> Quote {
    Quote {
        current_price: Some(150.25),
        change: Some(2.5),
        percent_change: Some(1.69),
        high: Some(152.0),
        low: Some(148.5),
        open: Some(149.0),
        previous_close: Some(147.75),
        timestamp: Some(1_717_425_000),
        volume: Some(50_000_000.0),
    }
}

/// Metrics whose derived net income is exactly 5.875.
pub fn apple_metrics() -> Metrics {
    Metrics {
        metric_type: Some("all".to_string()),
        ..Default::default()
    }
    .with_metric(metric_keys::REVENUE_PER_SHARE_TTM, 23.5)
    .with_metric(metric_keys::NET_PROFIT_MARGIN_TTM, 25.0)
    .with_metric(metric_keys::EPS_TTM, 2.5)
    .with_metric(metric_keys::PE_ANNUAL, 28.5)
    .with_metric(metric_keys::DIVIDEND_YIELD, 0.005)
    .with_metric(metric_keys::AVG_VOLUME_10_DAY, 61.2)
}

/// Three daily candles with status `ok`.
pub fn apple_candles() -> Candles {
    Candles {
        timestamps: Some(vec![1_717_200_000, 1_717_286_400, 1_717_372_800]),
        open: Some(vec![Some(148.0), Some(149.0), Some(149.5)]),
        high: Some(vec![Some(151.0), Some(152.0), Some(152.5)]),
        low: Some(vec![Some(147.0), Some(148.5), Some(148.0)]),
        close: Some(vec![Some(150.0), Some(150.25), Some(151.0)]),
        volume: Some(vec![Some(48_000_000.0), Some(50_000_000.0), Some(52_000_000.0)]),
        status: Some("ok".to_string()),
    }
}

/// Snapshot built from the sample payloads for `symbol`.
pub fn sample_overview(symbol: &str, now: DateTime<Utc>) -> TickerOverview {
    globeline_core::combine(
        &profile_for(symbol),
        &apple_quote(),
        &apple_metrics(),
        &apple_candles(),
        now,
    )
}
