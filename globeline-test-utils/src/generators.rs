//! Proptest generators.

use globeline_core::Symbol;
use proptest::prelude::*;

/// Raw ticker text in mixed case, optionally with a class suffix.
pub fn symbol_text_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z]{1,5}(\\.[a-zA-Z])?"
}

/// Parsed, normalized symbols.
pub fn symbol_strategy() -> impl Strategy<Value = Symbol> {
    symbol_text_strategy().prop_filter_map("valid symbol", |raw| Symbol::parse(&raw).ok())
}

/// Simulated upstream latency in milliseconds.
pub fn latency_ms_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        3 => 0u64..5,
        2 => 5u64..25,
        1 => 25u64..60,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_generated_symbols_are_uppercase(symbol in symbol_strategy()) {
            prop_assert_eq!(symbol.as_str(), symbol.as_str().to_uppercase());
        }
    }
}
