//! Property tests for in-flight coalescing under randomized upstream latency.

use std::sync::Arc;
use std::time::Duration;

use globeline_aggregator::OverviewAggregator;
use globeline_core::CacheSettings;
use globeline_test_utils::{latency_ms_strategy, sym, ScriptedSource};
use proptest::prelude::*;

const KEYS: usize = 10;
const CALLS: usize = 1000;

fn run_burst(latencies_ms: &[u64]) -> (usize, bool, usize) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let source = Arc::new(ScriptedSource::new());
        let symbols: Vec<_> = (0..KEYS).map(|i| sym(&format!("T{}", i))).collect();
        for (symbol, latency) in symbols.iter().zip(latencies_ms) {
            source.set_latency(symbol, Duration::from_millis(*latency));
        }
        let aggregator = OverviewAggregator::new(source.clone(), &CacheSettings::default());

        let mut tasks = Vec::with_capacity(CALLS);
        for i in 0..CALLS {
            let aggregator = aggregator.clone();
            let symbol = symbols[i % KEYS].clone();
            tasks.push(tokio::spawn(async move {
                aggregator.get_overview(&symbol).await
            }));
        }

        let mut ok = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                ok += 1;
            }
        }

        (
            source.fetch_sequences(),
            aggregator.in_flight().is_empty(),
            ok,
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_burst_fetches_each_key_at_most_once(
        latencies in proptest::collection::vec(latency_ms_strategy(), KEYS)
    ) {
        let (fetches, registry_empty, ok) = run_burst(&latencies);
        prop_assert!(fetches <= KEYS, "{} fetches for {} keys", fetches, KEYS);
        prop_assert!(registry_empty);
        prop_assert_eq!(ok, CALLS);
    }
}
