//! Finnhub HTTP client with timeout and rate-limit retry

use std::time::Duration;

use globeline_core::{
    ApiKey, ConfigError, GlobeResult, RetryConfig, SubSource, Symbol, UpstreamConfig,
    UpstreamError, UpstreamResult,
};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Header carrying the API token.
pub const TOKEN_HEADER: &str = "X-Finnhub-Token";

/// Finnhub API client.
///
/// Every call is a single GET. Each attempt is bounded by `call_timeout`;
/// only rate-limited responses are retried, with capped exponential backoff.
#[derive(Clone)]
pub struct FinnhubClient {
    client: Client,
    base_url: String,
    api_key: ApiKey,
    call_timeout: Duration,
    pub(crate) candle_window_days: u32,
    retry: RetryConfig,
}

impl FinnhubClient {
    /// Create a client from upstream configuration.
    ///
    /// # Errors
    /// Returns a config error if no API key is configured or the HTTP client
    /// cannot be built.
    pub fn new(config: &UpstreamConfig) -> GlobeResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "api_key".to_string(),
            })?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("globeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::InitFailed {
                component: "http client".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            call_timeout: config.call_timeout,
            candle_window_days: config.candle_window_days,
            retry: config.retry.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the JSON body, retrying rate-limited attempts.
    ///
    /// A rate limit that outlasts the retry budget is reported as
    /// [`UpstreamError::Unavailable`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        sub_source: SubSource,
        path: &str,
        query: &[(&str, String)],
        symbol: &Symbol,
    ) -> UpstreamResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            match self.attempt(sub_source, &url, query, symbol).await {
                Err(UpstreamError::RateLimited { retry_after_ms, .. })
                    if attempt < self.retry.max_retries =>
                {
                    let delay = self.backoff(attempt, retry_after_ms);
                    warn!(
                        symbol = %symbol,
                        sub_source = %sub_source,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited by upstream, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(UpstreamError::RateLimited { .. }) => {
                    return Err(UpstreamError::Unavailable {
                        sub_source,
                        reason: format!("rate limited after {} attempts", attempt + 1),
                    });
                }
                other => return other,
            }
        }
    }

    /// Backoff for retry `attempt`, honouring `Retry-After` up to the cap.
    fn backoff(&self, attempt: u32, retry_after_ms: u64) -> Duration {
        let computed = self.retry.delay_for_attempt(attempt);
        computed
            .max(Duration::from_millis(retry_after_ms))
            .min(self.retry.max_backoff)
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        sub_source: SubSource,
        url: &str,
        query: &[(&str, String)],
        symbol: &Symbol,
    ) -> UpstreamResult<T> {
        debug!(symbol = %symbol, sub_source = %sub_source, url, "Upstream request");

        match tokio::time::timeout(self.call_timeout, self.send(sub_source, url, query, symbol))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout {
                sub_source,
                timeout_ms: self.call_timeout.as_millis() as u64,
            }),
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        sub_source: SubSource,
        url: &str,
        query: &[(&str, String)],
        symbol: &Symbol,
    ) -> UpstreamResult<T> {
        let response = self
            .client
            .get(url)
            .header(TOKEN_HEADER, self.api_key.expose())
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(sub_source, &e, self.call_timeout))?;

        let status = response.status();
        if let Some(err) = classify_status(sub_source, status, symbol, response.headers()) {
            return Err(err);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(sub_source, &e, self.call_timeout))?;

        serde_json::from_slice(&body).map_err(|e| UpstreamError::Malformed {
            sub_source,
            reason: format!("failed to parse response: {}", e),
        })
    }
}

/// Map a non-success status to its failure class. `None` for 2xx.
pub(crate) fn classify_status(
    sub_source: SubSource,
    status: StatusCode,
    symbol: &Symbol,
    headers: &reqwest::header::HeaderMap,
) -> Option<UpstreamError> {
    if status.is_success() {
        return None;
    }

    Some(match status {
        StatusCode::NOT_FOUND => UpstreamError::NotFound {
            sub_source,
            symbol: symbol.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited {
            sub_source,
            retry_after_ms: parse_retry_after_ms(headers).unwrap_or(0),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamError::Forbidden {
            sub_source,
            status: status.as_u16(),
        },
        _ => UpstreamError::Unavailable {
            sub_source,
            reason: format!("status {}", status),
        },
    })
}

fn transport_error(sub_source: SubSource, err: &reqwest::Error, timeout: Duration) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout {
            sub_source,
            timeout_ms: timeout.as_millis() as u64,
        }
    } else if err.is_decode() {
        UpstreamError::Malformed {
            sub_source,
            reason: err.to_string(),
        }
    } else {
        UpstreamError::Unavailable {
            sub_source,
            reason: format!("HTTP request failed: {}", err),
        }
    }
}

fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .map(|seconds| (seconds * 1000.0) as u64)
}

impl std::fmt::Debug for FinnhubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinnhubClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("call_timeout", &self.call_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}
