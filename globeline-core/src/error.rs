//! Error types for GlobeLine operations

use crate::entities::SubSource;
use thiserror::Error;

/// Terminal failure of a single sub-source call, after any local retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("{sub_source} not found for {symbol}")]
    NotFound { sub_source: SubSource, symbol: String },

    #[error("{sub_source} rate limited, retry after {retry_after_ms}ms")]
    RateLimited {
        sub_source: SubSource,
        retry_after_ms: u64,
    },

    #[error("{sub_source} forbidden with status {status}")]
    Forbidden { sub_source: SubSource, status: u16 },

    #[error("{sub_source} timed out after {timeout_ms}ms")]
    Timeout { sub_source: SubSource, timeout_ms: u64 },

    #[error("{sub_source} unavailable: {reason}")]
    Unavailable { sub_source: SubSource, reason: String },

    #[error("{sub_source} returned a malformed response: {reason}")]
    Malformed { sub_source: SubSource, reason: String },
}

impl UpstreamError {
    /// The sub-source that produced this failure.
    pub fn sub_source(&self) -> SubSource {
        match self {
            Self::NotFound { sub_source, .. }
            | Self::RateLimited { sub_source, .. }
            | Self::Forbidden { sub_source, .. }
            | Self::Timeout { sub_source, .. }
            | Self::Unavailable { sub_source, .. }
            | Self::Malformed { sub_source, .. } => *sub_source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Short stable label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::Forbidden { .. } => "forbidden",
            Self::Timeout { .. } => "timeout",
            Self::Unavailable { .. } => "unavailable",
            Self::Malformed { .. } => "malformed",
        }
    }
}

/// Failure returned by `get_overview`.
///
/// `Clone` so a single outcome can be handed to every caller attached to the
/// same in-flight fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OverviewError {
    #[error("Symbol not found: {symbol}")]
    NotFound { symbol: String },

    #[error("Temporarily unavailable - try again later ({symbol}: {reason})")]
    ServiceUnavailable { symbol: String, reason: String },

    #[error("Internal error while aggregating {symbol}: {reason}")]
    Internal { symbol: String, reason: String },
}

impl OverviewError {
    pub fn symbol(&self) -> &str {
        match self {
            Self::NotFound { symbol }
            | Self::ServiceUnavailable { symbol, .. }
            | Self::Internal { symbol, .. } => symbol,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Symbol must not be empty")]
    EmptySymbol,

    #[error("Invalid symbol {symbol}: {reason}")]
    InvalidSymbol { symbol: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to initialise {component}: {reason}")]
    InitFailed { component: String, reason: String },
}

/// Master error type for all GlobeLine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GlobeError {
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Overview error: {0}")]
    Overview(#[from] OverviewError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for GlobeLine operations.
pub type GlobeResult<T> = Result<T, GlobeError>;

// =============================================================================
// TESTS
// =============================================================================
