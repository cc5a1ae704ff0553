//! Sub-source fetcher trait.

use async_trait::async_trait;

use crate::entities::{Candles, CompanyProfile, Metrics, Quote};
use crate::error::UpstreamError;
use crate::symbol::Symbol;

/// Result of a single sub-source call.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// One network round trip per sub-source.
///
/// Implementations are stateless with respect to callers and apply their own
/// timeout and retry policy, so an `Err` is always terminal for that call.
///
/// # Example
///
/// ```ignore
/// #[async_trait]
/// impl OverviewSource for FinnhubClient {
///     async fn quote(&self, symbol: &Symbol) -> UpstreamResult<Quote> {
///         self.get_json(SubSource::Quote, "/quote", &[("symbol", symbol.to_string())], symbol).await
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait OverviewSource: Send + Sync {
    /// Company profile. Required.
    async fn company_profile(&self, symbol: &Symbol) -> UpstreamResult<CompanyProfile>;

    /// Real-time quote. Required.
    async fn quote(&self, symbol: &Symbol) -> UpstreamResult<Quote>;

    /// Basic financials. Required.
    async fn metrics(&self, symbol: &Symbol) -> UpstreamResult<Metrics>;

    /// Daily candles for the recent window. Optional: callers degrade a
    /// failure to [`Candles::unavailable`].
    async fn candles(&self, symbol: &Symbol) -> UpstreamResult<Candles>;
}
