//! Upstream payloads and the combined overview snapshot.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

// ============================================================================
// SUB-SOURCES
// ============================================================================

/// The independent upstream calls that make up one overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubSource {
    Profile,
    Quote,
    Metrics,
    Candles,
}

impl SubSource {
    pub const ALL: [SubSource; 4] = [
        SubSource::Profile,
        SubSource::Quote,
        SubSource::Metrics,
        SubSource::Candles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubSource::Profile => "profile",
            SubSource::Quote => "quote",
            SubSource::Metrics => "metrics",
            SubSource::Candles => "candles",
        }
    }
}

impl fmt::Display for SubSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// UPSTREAM PAYLOADS
// ============================================================================

/// Company profile (`/stock/profile2`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyProfile {
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub currency: Option<String>,
    pub exchange: Option<String>,
    pub ipo: Option<String>,
    pub market_capitalization: Option<f64>,
    pub share_outstanding: Option<f64>,
    pub weburl: Option<String>,
    pub logo: Option<String>,
    pub finnhub_industry: Option<String>,
    pub phone: Option<String>,
}

/// Real-time quote (`/quote`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quote {
    /// Current price
    #[serde(rename = "c")]
    pub current_price: Option<f64>,
    /// Absolute change
    #[serde(rename = "d")]
    pub change: Option<f64>,
    /// Percent change
    #[serde(rename = "dp")]
    pub percent_change: Option<f64>,
    #[serde(rename = "h")]
    pub high: Option<f64>,
    #[serde(rename = "l")]
    pub low: Option<f64>,
    #[serde(rename = "o")]
    pub open: Option<f64>,
    #[serde(rename = "pc")]
    pub previous_close: Option<f64>,
    /// Unix seconds
    #[serde(rename = "t")]
    pub timestamp: Option<i64>,
    #[serde(rename = "v")]
    pub volume: Option<f64>,
}

/// Basic financials (`/stock/metric?metric=all`).
///
/// The metric map is heterogeneous upstream (numbers mixed with dates), so
/// values are kept as raw JSON and read through [`Metrics::metric_value`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metrics {
    #[serde(rename = "metricType")]
    pub metric_type: Option<String>,
    #[serde(rename = "metric")]
    pub metric: HashMap<String, serde_json::Value>,
}

impl Metrics {
    /// Numeric value of a metric. A present `0` is `Some(0.0)`; a missing
    /// key, `null` or non-numeric entry is `None`.
    pub fn metric_value(&self, key: &str) -> Option<f64> {
        self.metric.get(key).and_then(serde_json::Value::as_f64)
    }

    /// Exact decimal value of a numeric metric, read from its JSON text.
    ///
    /// `None` where [`Metrics::metric_value`] is `None`, or when the number
    /// is outside the decimal range.
    pub fn metric_decimal(&self, key: &str) -> Option<Decimal> {
        let serde_json::Value::Number(number) = self.metric.get(key)? else {
            return None;
        };
        let text = number.to_string();
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .ok()
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metric.insert(key.into(), serde_json::Value::from(value));
        self
    }
}

/// Daily OHLC arrays (`/stock/candle`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Candles {
    #[serde(rename = "c")]
    pub close: Option<Vec<Option<f64>>>,
    #[serde(rename = "o")]
    pub open: Option<Vec<Option<f64>>>,
    #[serde(rename = "h")]
    pub high: Option<Vec<Option<f64>>>,
    #[serde(rename = "l")]
    pub low: Option<Vec<Option<f64>>>,
    #[serde(rename = "t")]
    pub timestamps: Option<Vec<i64>>,
    #[serde(rename = "v")]
    pub volume: Option<Vec<Option<f64>>>,
    #[serde(rename = "s")]
    pub status: Option<String>,
}

impl Candles {
    pub const STATUS_UNAVAILABLE: &'static str = "error";

    /// Sentinel used when the optional candle call fails.
    pub fn unavailable() -> Self {
        Self {
            status: Some(Self::STATUS_UNAVAILABLE.to_string()),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("ok"))
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// One daily candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcPoint {
    /// Unix seconds
    pub timestamp: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

/// Combined overview for one symbol.
///
/// Immutable once built. Produced by [`crate::combine`] or as a re-stamped
/// copy of a cached value via [`TickerOverview::restamped`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerOverview {
    // Company profile
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,

    // Live quote
    pub current_price: Option<f64>,
    pub change: Option<f64>,
    pub percent_change: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,

    // Financial snapshot
    #[serde(rename = "revenueTTM")]
    pub revenue_ttm: Option<f64>,
    #[serde(rename = "netIncomeTTM")]
    pub net_income_ttm: Option<f64>,
    pub eps: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,

    /// Empty when candles were unavailable.
    pub ohlc_data: Vec<OhlcPoint>,
    pub description: String,
    pub last_updated: Timestamp,
}

impl TickerOverview {
    /// Copy with `last_updated` advanced, used when serving stale data.
    pub fn restamped(&self, now: Timestamp) -> Self {
        Self {
            last_updated: now,
            ..self.clone()
        }
    }

    /// Equality ignoring `last_updated`.
    pub fn same_content(&self, other: &Self) -> bool {
        self.restamped(other.last_updated) == *other
    }
}
