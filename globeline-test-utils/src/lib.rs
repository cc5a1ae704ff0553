//! GlobeLine Test Utilities
//!
//! Centralized test infrastructure for the GlobeLine workspace:
//! - Sample upstream payloads and snapshots
//! - A scripted in-memory [`OverviewSource`] with call counters
//! - Proptest generators for symbols and latencies

pub mod fixtures;
pub mod generators;
pub mod scripted;

pub use fixtures::{
    apple_candles, apple_metrics, apple_profile, apple_quote, profile_for, sample_overview,
};
pub use generators::{latency_ms_strategy, symbol_strategy, symbol_text_strategy};
pub use scripted::ScriptedSource;

// Re-export core types for convenience
pub use globeline_core::{
    Candles, CompanyProfile, Metrics, OverviewError, OverviewSource, Quote, SubSource, Symbol,
    TickerOverview, UpstreamError, UpstreamResult,
};

/// Parse a symbol literal, panicking on invalid input. Tests only.
pub fn sym(raw: &str) -> Symbol {
    match Symbol::parse(raw) {
        Ok(symbol) => symbol,
        Err(e) => panic!("invalid test symbol {:?}: {}", raw, e),
    }
}
