//! Tracing subscriber initialization.
//!
//! Logs go to stderr so that stdout stays free for overview output.

use std::str::FromStr;

use globeline_core::{ConfigError, GlobeResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "globeline=debug,info";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(ConfigError::InvalidValue {
                field: "GLOBELINE_LOG_FORMAT".to_string(),
                value: other.to_string(),
                reason: "expected 'json' or 'pretty'".to_string(),
            }),
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("GLOBELINE_SERVICE_NAME")
                .unwrap_or_else(|_| "globeline".to_string()),
            log_format: std::env::var("GLOBELINE_LOG_FORMAT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        }
    }
}

impl TelemetryConfig {
    /// Read from the environment, rejecting an unknown log format.
    pub fn from_env() -> GlobeResult<Self> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("GLOBELINE_LOG_FORMAT") {
            config.log_format = raw.parse()?;
        }
        Ok(config)
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup. A second call fails with `ConfigError::InitFailed`.
pub fn init_tracing(config: &TelemetryConfig) -> GlobeResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    };
    result.map_err(|e| ConfigError::InitFailed {
        component: "tracing subscriber".to_string(),
        reason: e.to_string(),
    })?;

    tracing::info!(
        service_name = config.service_name,
        log_format = ?config.log_format,
        "Telemetry initialized"
    );

    Ok(())
}
