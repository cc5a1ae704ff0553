//! GlobeLine Aggregator - Ticker Overview Orchestration
//!
//! [`OverviewAggregator`] answers `get_overview(symbol)` by:
//!
//! 1. returning a fresh cached snapshot if one exists,
//! 2. otherwise attaching to a fetch already running for the symbol,
//! 3. otherwise fetching profile, quote, metrics and candles concurrently,
//!    combining them and caching the result,
//! 4. and, when a required sub-source fails for any reason other than
//!    not-found, serving the last cached snapshot re-stamped with the current
//!    time.
//!
//! [`InstrumentedAggregator`] wraps the core with timing, outcome counters
//! and error-class logging.

pub mod aggregator;
pub mod instrumented;
pub mod observer;
pub mod telemetry;

pub use aggregator::{fallback_for, Fallback, OverviewAggregator};
pub use instrumented::InstrumentedAggregator;
pub use observer::{AggregationObserver, AggregationStats, AggregationStatsSnapshot, NoopObserver};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
