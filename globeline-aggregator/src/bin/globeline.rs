//! `globeline` - print ticker overviews as JSON.
//!
//! Usage: `globeline <SYMBOL>...`. Arguments are validated as symbols before
//! any configuration is read.
//!
//! Reads configuration from the environment (`FINNHUB_API_KEY` is required)
//! and writes one pretty-printed overview per symbol to stdout. Logs go to
//! stderr.

use std::process::ExitCode;

use clap::Parser;
use globeline_aggregator::{init_tracing, InstrumentedAggregator, TelemetryConfig};
use globeline_core::{AggregatorConfig, GlobeError, Symbol};

#[derive(Parser, Debug)]
#[command(name = "globeline", version, about = "Print ticker overviews as JSON")]
struct Cli {
    /// Ticker symbols (e.g., AAPL BRK.B ^GSPC). Case-insensitive.
    #[arg(required = true, value_parser = parse_symbol)]
    symbols: Vec<Symbol>,
}

fn parse_symbol(raw: &str) -> Result<Symbol, GlobeError> {
    Symbol::parse(raw)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry = match TelemetryConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };
    if let Err(e) = init_tracing(&telemetry) {
        eprintln!("Error: {}", e);
        return ExitCode::from(2);
    }

    let aggregator = match AggregatorConfig::from_env()
        .and_then(|config| InstrumentedAggregator::from_config(&config))
    {
        Ok(aggregator) => aggregator,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let mut failed = false;
    for symbol in &cli.symbols {
        match aggregator.get_overview(symbol).await {
            Ok(overview) => match serde_json::to_string_pretty(&overview) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("{}: failed to encode overview: {}", symbol, e);
                    failed = true;
                }
            },
            Err(e) => {
                eprintln!("{}: {}", symbol, e);
                failed = true;
            }
        }
    }

    let stats = aggregator.stats();
    tracing::info!(
        cache_hits = stats.cache_hits,
        fetches = stats.fetches_started,
        stale_served = stats.stale_served,
        mean_fetch_ms = stats.mean_fetch_time().map(|d| d.as_millis() as u64),
        "Done"
    );

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
