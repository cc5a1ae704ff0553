//! GlobeLine Core - Ticker Overview Types
//!
//! Pure data structures and the snapshot combiner. Every other crate in the
//! workspace depends on this one; nothing here performs I/O. The fetcher
//! seam ([`OverviewSource`]) is declared here and implemented elsewhere.

pub mod combine;
pub mod config;
pub mod entities;
pub mod error;
pub mod source;
pub mod symbol;

pub use combine::{build_description, combine, derive_net_income_ttm, round_half_up};
pub use config::{
    AggregatorConfig, ApiKey, CacheSettings, RetryConfig, UpstreamConfig, DEFAULT_BASE_URL,
};
pub use entities::{
    Candles, CompanyProfile, Metrics, OhlcPoint, Quote, SubSource, TickerOverview, Timestamp,
};
pub use error::{
    ConfigError, GlobeError, GlobeResult, OverviewError, UpstreamError, ValidationError,
};
pub use source::{OverviewSource, UpstreamResult};
pub use symbol::Symbol;
