//! Configuration types

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::error::{ConfigError, GlobeResult};

/// Default upstream API root.
pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";

// ============================================================================
// API KEY (TYPE-SAFE)
// ============================================================================

/// Upstream credential that never appears in logs or `Debug` output.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// # Errors
    /// Returns error if the key is empty.
    pub fn new(key: impl Into<String>) -> GlobeResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "api_key".to_string(),
            }
            .into());
        }
        Ok(Self(SecretString::new(key.into())))
    }

    /// Expose the key value. Only the HTTP client should call this.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey([REDACTED, {} chars])", self.len())
    }
}

// ============================================================================
// RETRY
// ============================================================================

/// Retry policy for rate-limited upstream calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based), capped at `max_backoff`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_backoff.as_millis() as f64);
        if capped.is_finite() && capped > 0.0 {
            Duration::from_millis(capped as u64)
        } else {
            Duration::ZERO
        }
    }
}

// ============================================================================
// CACHE
// ============================================================================

/// Snapshot cache sizing and expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            max_entries: 1000,
        }
    }
}

// ============================================================================
// UPSTREAM
// ============================================================================

/// Upstream HTTP settings.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: Option<ApiKey>,
    /// Whole-call timeout for a single attempt.
    pub call_timeout: Duration,
    pub connect_timeout: Duration,
    /// Width of the daily candle window ending now.
    pub candle_window_days: u32,
    pub retry: RetryConfig,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            call_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            candle_window_days: 30,
            retry: RetryConfig::default(),
        }
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

/// Top-level configuration injected into the aggregator and its collaborators.
#[derive(Debug, Clone, Default)]
pub struct AggregatorConfig {
    pub cache: CacheSettings,
    pub upstream: UpstreamConfig,
}

impl AggregatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `FINNHUB_API_KEY`: upstream credential (required by `validate`)
    /// - `FINNHUB_API_BASE_URL`: upstream root (default: `https://finnhub.io/api/v1`)
    /// - `GLOBELINE_CACHE_TTL_SECS`: snapshot freshness window (default: 30)
    /// - `GLOBELINE_CACHE_MAX_ENTRIES`: cache bound (default: 1000)
    /// - `GLOBELINE_CALL_TIMEOUT_MS`: per-call timeout (default: 15000)
    /// - `GLOBELINE_CONNECT_TIMEOUT_MS`: connect timeout (default: 5000)
    /// - `GLOBELINE_CANDLE_WINDOW_DAYS`: candle window (default: 30)
    /// - `GLOBELINE_RETRY_MAX`: retries on rate limiting (default: 3)
    /// - `GLOBELINE_RETRY_INITIAL_BACKOFF_MS`: first backoff (default: 200)
    /// - `GLOBELINE_RETRY_MAX_BACKOFF_MS`: backoff cap (default: 2000)
    ///
    /// Unparseable numeric values are reported instead of silently replaced.
    pub fn from_env() -> GlobeResult<Self> {
        let defaults = Self::default();

        let api_key = match std::env::var("FINNHUB_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Some(ApiKey::new(key)?),
            _ => None,
        };

        let base_url = std::env::var("FINNHUB_API_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.upstream.base_url);

        let cache = CacheSettings {
            ttl: env_parse::<u64>("GLOBELINE_CACHE_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache.ttl),
            max_entries: env_parse("GLOBELINE_CACHE_MAX_ENTRIES")?
                .unwrap_or(defaults.cache.max_entries),
        };

        let retry = RetryConfig {
            max_retries: env_parse("GLOBELINE_RETRY_MAX")?
                .unwrap_or(defaults.upstream.retry.max_retries),
            initial_backoff: env_parse::<u64>("GLOBELINE_RETRY_INITIAL_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.upstream.retry.initial_backoff),
            max_backoff: env_parse::<u64>("GLOBELINE_RETRY_MAX_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.upstream.retry.max_backoff),
            backoff_multiplier: defaults.upstream.retry.backoff_multiplier,
        };

        let upstream = UpstreamConfig {
            base_url,
            api_key,
            call_timeout: env_parse::<u64>("GLOBELINE_CALL_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.upstream.call_timeout),
            connect_timeout: env_parse::<u64>("GLOBELINE_CONNECT_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.upstream.connect_timeout),
            candle_window_days: env_parse("GLOBELINE_CANDLE_WINDOW_DAYS")?
                .unwrap_or(defaults.upstream.candle_window_days),
            retry,
        };

        Ok(Self { cache, upstream })
    }

    pub fn with_api_key(mut self, key: ApiKey) -> Self {
        self.upstream.api_key = Some(key);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.upstream.base_url = base_url.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = ttl;
        self
    }

    pub fn with_cache_max_entries(mut self, max_entries: usize) -> Self {
        self.cache.max_entries = max_entries;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.upstream.call_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.upstream.retry = retry;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - an API key is present
    /// - base_url is an http(s) URL
    /// - cache TTL, max entries, and timeouts are positive
    /// - backoff bounds are ordered and the multiplier is at least 1.0
    pub fn validate(&self) -> GlobeResult<()> {
        if self.upstream.api_key.is_none() {
            return Err(ConfigError::MissingRequired {
                field: "api_key".to_string(),
            }
            .into());
        }

        let base_url = &self.upstream.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid("base_url", base_url, "must start with http:// or https://"));
        }

        if self.cache.ttl.is_zero() {
            return Err(invalid("cache.ttl", "0s", "must be positive"));
        }

        if self.cache.max_entries == 0 {
            return Err(invalid("cache.max_entries", "0", "must be positive"));
        }

        if self.upstream.call_timeout.is_zero() {
            return Err(invalid("upstream.call_timeout", "0ms", "must be positive"));
        }

        if self.upstream.connect_timeout.is_zero() {
            return Err(invalid("upstream.connect_timeout", "0ms", "must be positive"));
        }

        if self.upstream.candle_window_days == 0 {
            return Err(invalid("upstream.candle_window_days", "0", "must be positive"));
        }

        let retry = &self.upstream.retry;
        if retry.initial_backoff > retry.max_backoff {
            return Err(invalid(
                "upstream.retry.initial_backoff",
                &format!("{:?}", retry.initial_backoff),
                "must not exceed max_backoff",
            ));
        }

        if !(retry.backoff_multiplier >= 1.0) {
            return Err(invalid(
                "upstream.retry.backoff_multiplier",
                &retry.backoff_multiplier.to_string(),
                "must be at least 1.0",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> crate::error::GlobeError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn env_parse<T: std::str::FromStr>(name: &str) -> GlobeResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(name, &raw, "not a valid number")),
        _ => Ok(None),
    }
}
