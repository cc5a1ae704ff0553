//! Snapshot combiner.
//!
//! Pure merge of the four sub-source payloads into a [`TickerOverview`].
//! No I/O and no shared state; the only non-deterministic input is `now`,
//! which the caller supplies.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::entities::{Candles, CompanyProfile, Metrics, OhlcPoint, Quote, TickerOverview, Timestamp};

/// Metric keys read from the basic-financials payload.
pub mod metric_keys {
    pub const REVENUE_PER_SHARE_TTM: &str = "revenuePerShareTTM";
    pub const NET_PROFIT_MARGIN_TTM: &str = "netProfitMarginTTM";
    pub const EPS_TTM: &str = "epsTTM";
    pub const PE_ANNUAL: &str = "peAnnual";
    pub const DIVIDEND_YIELD: &str = "dividendYieldIndicatedAnnual";
    pub const AVG_VOLUME_10_DAY: &str = "10DayAverageTradingVolume";
    pub const AVG_VOLUME_3_MONTH: &str = "3MonthAverageTradingVolume";
}

/// Volume sources, highest priority first.
const VOLUME_FALLBACKS: [&str; 2] = [metric_keys::AVG_VOLUME_10_DAY, metric_keys::AVG_VOLUME_3_MONTH];

/// Combine sub-source payloads into one overview stamped with `now`.
///
/// `candles` may be the [`Candles::unavailable`] sentinel, which yields an
/// empty `ohlc_data`.
pub fn combine(
    profile: &CompanyProfile,
    quote: &Quote,
    metrics: &Metrics,
    candles: &Candles,
    now: Timestamp,
) -> TickerOverview {
    TickerOverview {
        company_name: profile.name.clone(),
        sector: profile.finnhub_industry.clone(),
        country: profile.country.clone(),
        website: profile.weburl.clone(),

        current_price: quote.current_price,
        change: quote.change,
        percent_change: quote.percent_change,
        day_high: quote.high,
        day_low: quote.low,
        volume: volume_with_fallback(quote, metrics),
        market_cap: profile.market_capitalization,

        revenue_ttm: metrics.metric_value(metric_keys::REVENUE_PER_SHARE_TTM),
        net_income_ttm: derive_net_income_ttm(metrics),
        eps: metrics.metric_value(metric_keys::EPS_TTM),
        pe_ratio: metrics.metric_value(metric_keys::PE_ANNUAL),
        dividend_yield: metrics.metric_value(metric_keys::DIVIDEND_YIELD),

        ohlc_data: ohlc_points(candles),
        description: build_description(profile),
        last_updated: now,
    }
}

/// Quote volume, then the 10-day average, then the 3-month average.
fn volume_with_fallback(quote: &Quote, metrics: &Metrics) -> Option<f64> {
    quote.volume.or_else(|| {
        VOLUME_FALLBACKS
            .iter()
            .find_map(|key| metrics.metric_value(key))
    })
}

/// `revenuePerShareTTM * netProfitMarginTTM / 100`, 4 decimal places, half-up.
///
/// Computed in exact decimal arithmetic from the metric text. `None` unless
/// both inputs are present and representable. Zero inputs count as present.
pub fn derive_net_income_ttm(metrics: &Metrics) -> Option<f64> {
    let revenue = metrics.metric_decimal(metric_keys::REVENUE_PER_SHARE_TTM)?;
    let margin = metrics.metric_decimal(metric_keys::NET_PROFIT_MARGIN_TTM)?;
    let income = revenue
        .checked_mul(margin)?
        .checked_div(Decimal::ONE_HUNDRED)?;
    round_half_up(income, 4).to_f64()
}

/// Round to `places` decimals, ties away from zero.
pub fn round_half_up(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// Zip the parallel candle arrays by timestamp.
///
/// Empty unless the status is `ok` and timestamps are present. A value array
/// shorter than the timestamps yields `None` for the missing positions.
fn ohlc_points(candles: &Candles) -> Vec<OhlcPoint> {
    if !candles.is_ok() {
        return Vec::new();
    }
    let Some(timestamps) = candles.timestamps.as_deref() else {
        return Vec::new();
    };

    let at = |series: &Option<Vec<Option<f64>>>, i: usize| -> Option<f64> {
        series.as_ref().and_then(|values| values.get(i).copied().flatten())
    };

    timestamps
        .iter()
        .enumerate()
        .map(|(i, &timestamp)| OhlcPoint {
            timestamp,
            open: at(&candles.open, i),
            high: at(&candles.high, i),
            low: at(&candles.low, i),
            close: at(&candles.close, i),
            volume: at(&candles.volume, i),
        })
        .collect()
}

/// Short company blurb from name, industry and country.
pub fn build_description(profile: &CompanyProfile) -> String {
    let mut desc = String::new();
    if let Some(name) = profile.name.as_deref() {
        desc.push_str(name);
    }
    if let Some(industry) = profile.finnhub_industry.as_deref() {
        if !desc.is_empty() {
            desc.push_str(" is a company in the ");
        }
        desc.push_str(industry);
        desc.push_str(" industry");
    }
    if let Some(country) = profile.country.as_deref() {
        desc.push_str(" based in ");
        desc.push_str(country);
    }
    if desc.is_empty() {
        desc.push_str("Company information");
    }
    desc.push('.');
    desc
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 3, 14, 30, 0).unwrap()
    }

    fn apple_profile() -> CompanyProfile {
        CompanyProfile {
            ticker: Some("AAPL".to_string()),
            name: Some("Apple Inc.".to_string()),
            country: Some("US".to_string()),
            weburl: Some("https://www.apple.com".to_string()),
            finnhub_industry: Some("Technology".to_string()),
            market_capitalization: Some(2_500_000.0),
            ..Default::default()
        }
    }

    fn apple_quote() -> Quote {
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

    fn apple_metrics() -> Metrics {
        Metrics::default()
            .with_metric(metric_keys::REVENUE_PER_SHARE_TTM, 23.5)
            .with_metric(metric_keys::NET_PROFIT_MARGIN_TTM, 25.0)
            .with_metric(metric_keys::EPS_TTM, 2.5)
            .with_metric(metric_keys::PE_ANNUAL, 28.5)
            .with_metric(metric_keys::DIVIDEND_YIELD, 0.005)
    }

    fn ok_candles() -> Candles {
        Candles {
            timestamps: Some(vec![1_717_000_000, 1_717_086_400]),
            open: Some(vec![Some(148.0), Some(149.0)]),
            high: Some(vec![Some(151.0), Some(152.0)]),
            low: Some(vec![Some(147.0), Some(148.5)]),
            close: Some(vec![Some(150.0), Some(150.25)]),
            volume: Some(vec![Some(1_000.0)]),
            status: Some("ok".to_string()),
        }
    }

    #[test]
    fn test_combine_maps_all_fields() {
        let overview = combine(
            &apple_profile(),
            &apple_quote(),
            &apple_metrics(),
            &ok_candles(),
            now(),
        );

        assert_eq!(overview.company_name.as_deref(), Some("Apple Inc."));
        assert_eq!(overview.sector.as_deref(), Some("Technology"));
        assert_eq!(overview.website.as_deref(), Some("https://www.apple.com"));
        assert_eq!(overview.current_price, Some(150.25));
        assert_eq!(overview.day_high, Some(152.0));
        assert_eq!(overview.day_low, Some(148.5));
        assert_eq!(overview.volume, Some(50_000_000.0));
        assert_eq!(overview.market_cap, Some(2_500_000.0));
        assert_eq!(overview.revenue_ttm, Some(23.5));
        assert_eq!(overview.net_income_ttm, Some(5.875));
        assert_eq!(overview.eps, Some(2.5));
        assert_eq!(overview.pe_ratio, Some(28.5));
        assert_eq!(overview.dividend_yield, Some(0.005));
        assert_eq!(overview.last_updated, now());
        assert_eq!(
            overview.description,
            "Apple Inc. is a company in the Technology industry based in US."
        );
    }

    #[test]
    fn test_ohlc_zip_pads_short_series() {
        let overview = combine(
            &apple_profile(),
            &apple_quote(),
            &apple_metrics(),
            &ok_candles(),
            now(),
        );
        assert_eq!(overview.ohlc_data.len(), 2);
        assert_eq!(overview.ohlc_data[0].volume, Some(1_000.0));
        assert_eq!(overview.ohlc_data[1].volume, None);
        assert_eq!(overview.ohlc_data[1].close, Some(150.25));
    }

    #[test]
    fn test_sentinel_candles_yield_empty_series() {
        let overview = combine(
            &apple_profile(),
            &apple_quote(),
            &apple_metrics(),
            &Candles::unavailable(),
            now(),
        );
        assert!(overview.ohlc_data.is_empty());
    }

    #[test]
    fn test_no_data_candles_yield_empty_series() {
        let candles = Candles {
            status: Some("no_data".to_string()),
            ..ok_candles()
        };
        let overview = combine(&apple_profile(), &apple_quote(), &apple_metrics(), &candles, now());
        assert!(overview.ohlc_data.is_empty());
    }

    #[test]
    fn test_volume_falls_back_to_averages() {
        let quote = Quote {
            volume: None,
            ..apple_quote()
        };
        let metrics = apple_metrics()
            .with_metric(metric_keys::AVG_VOLUME_10_DAY, 61.2)
            .with_metric(metric_keys::AVG_VOLUME_3_MONTH, 55.0);
        let overview = combine(&apple_profile(), &quote, &metrics, &ok_candles(), now());
        assert_eq!(overview.volume, Some(61.2));

        let metrics = apple_metrics().with_metric(metric_keys::AVG_VOLUME_3_MONTH, 55.0);
        let overview = combine(&apple_profile(), &quote, &metrics, &ok_candles(), now());
        assert_eq!(overview.volume, Some(55.0));

        let overview = combine(&apple_profile(), &quote, &apple_metrics(), &ok_candles(), now());
        assert_eq!(overview.volume, None);
    }

    #[test]
    fn test_present_zero_beats_fallback() {
        let quote = Quote {
            volume: Some(0.0),
            ..apple_quote()
        };
        let metrics = apple_metrics().with_metric(metric_keys::AVG_VOLUME_10_DAY, 61.2);
        let overview = combine(&apple_profile(), &quote, &metrics, &ok_candles(), now());
        assert_eq!(overview.volume, Some(0.0));

        let quote = Quote {
            volume: None,
            ..apple_quote()
        };
        let metrics = apple_metrics()
            .with_metric(metric_keys::AVG_VOLUME_10_DAY, 0.0)
            .with_metric(metric_keys::AVG_VOLUME_3_MONTH, 55.0);
        let overview = combine(&apple_profile(), &quote, &metrics, &ok_candles(), now());
        assert_eq!(overview.volume, Some(0.0));
    }

    #[test]
    fn test_net_income_requires_both_inputs() {
        let metrics = Metrics::default().with_metric(metric_keys::REVENUE_PER_SHARE_TTM, 23.5);
        assert_eq!(derive_net_income_ttm(&metrics), None);

        let metrics = metrics.with_metric(metric_keys::NET_PROFIT_MARGIN_TTM, 0.0);
        assert_eq!(derive_net_income_ttm(&metrics), Some(0.0));
    }

    fn dec(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    #[test]
    fn test_round_half_up_ties() {
        assert_eq!(round_half_up(dec("1.23445"), 4), dec("1.2345"));
        assert_eq!(round_half_up(dec("0.00005"), 4), dec("0.0001"));
        assert_eq!(round_half_up(dec("-1.23445"), 4), dec("-1.2345"));
        assert_eq!(round_half_up(dec("5.875"), 4), dec("5.875"));
        assert_eq!(round_half_up(dec("12.3456789"), 4), dec("12.3457"));
    }

    #[test]
    fn test_round_half_up_just_below_tie_rounds_down() {
        assert_eq!(round_half_up(dec("0.00004999996"), 4), Decimal::ZERO);
        assert_eq!(round_half_up(dec("1.234449999"), 4), dec("1.2344"));
    }

    #[test]
    fn test_net_income_just_below_tie() {
        let metrics = Metrics::default()
            .with_metric(metric_keys::REVENUE_PER_SHARE_TTM, 0.004999996)
            .with_metric(metric_keys::NET_PROFIT_MARGIN_TTM, 1.0);
        assert_eq!(derive_net_income_ttm(&metrics), Some(0.0));

        let json = r#"{"metric":{"revenuePerShareTTM":0.00005,"netProfitMarginTTM":100}}"#;
        let metrics: Metrics = serde_json::from_str(json).unwrap();
        assert_eq!(derive_net_income_ttm(&metrics), Some(0.0001));
    }

    #[test]
    fn test_net_income_uses_decimal_text() {
        // 0.1 * 0.7 / 100 is 0.00069999... in binary floating point.
        let metrics = Metrics::default()
            .with_metric(metric_keys::REVENUE_PER_SHARE_TTM, 0.1)
            .with_metric(metric_keys::NET_PROFIT_MARGIN_TTM, 0.7);
        assert_eq!(derive_net_income_ttm(&metrics), Some(0.0007));

        let metrics = Metrics::default()
            .with_metric(metric_keys::REVENUE_PER_SHARE_TTM, 3.0)
            .with_metric(metric_keys::NET_PROFIT_MARGIN_TTM, 0.0005);
        assert_eq!(derive_net_income_ttm(&metrics), Some(0.0));
    }

    #[test]
    fn test_description_variants() {
        let profile = CompanyProfile {
            name: Some("Apple Inc.".to_string()),
            ..Default::default()
        };
        assert_eq!(build_description(&profile), "Apple Inc..");

        let profile = CompanyProfile {
            finnhub_industry: Some("Technology".to_string()),
            country: Some("US".to_string()),
            ..Default::default()
        };
        assert_eq!(build_description(&profile), "Technology industry based in US.");

        assert_eq!(
            build_description(&CompanyProfile::default()),
            "Company information."
        );
    }

    proptest! {
        #[test]
        fn prop_combine_is_deterministic(
            revenue in proptest::option::of(-1_000.0f64..1_000.0),
            margin in proptest::option::of(-100.0f64..100.0),
            volume in proptest::option::of(0.0f64..1e9),
        ) {
            let mut metrics = Metrics::default();
            if let Some(r) = revenue {
                metrics = metrics.with_metric(metric_keys::REVENUE_PER_SHARE_TTM, r);
            }
            if let Some(m) = margin {
                metrics = metrics.with_metric(metric_keys::NET_PROFIT_MARGIN_TTM, m);
            }
            let quote = Quote { volume, ..apple_quote() };

            let a = combine(&apple_profile(), &quote, &metrics, &ok_candles(), now());
            let b = combine(&apple_profile(), &quote, &metrics, &ok_candles(), now());
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.volume, volume);
            prop_assert_eq!(a.net_income_ttm.is_some(), revenue.is_some() && margin.is_some());
        }
    }
}
