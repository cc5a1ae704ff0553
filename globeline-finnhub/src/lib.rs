//! GlobeLine Finnhub - HTTP Sub-Source Fetcher
//!
//! Implements [`globeline_core::OverviewSource`] against the Finnhub REST
//! API: one GET per sub-source, authenticated with a static token header,
//! with a per-attempt timeout and bounded retry on rate limiting.

pub mod client;
pub mod source;

pub use client::{FinnhubClient, TOKEN_HEADER};
pub use source::endpoints;
