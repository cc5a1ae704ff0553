//! Normalized ticker symbol key.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GlobeResult, ValidationError};

/// Ticker symbol, trimmed and uppercased at construction.
///
/// Equality and hashing operate on the normalized form, so `"aapl"` and
/// `" AAPL "` produce the same cache and in-flight key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Parse and normalize a raw symbol.
    ///
    /// Accepts ASCII letters, digits and the punctuation used by exchange
    /// suffixes and index tickers (`.`, `-`, `:`, `^`, `=`).
    pub fn parse(raw: &str) -> GlobeResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySymbol.into());
        }

        if let Some(bad) = trimmed.chars().find(|c| !is_symbol_char(*c)) {
            return Err(ValidationError::InvalidSymbol {
                symbol: trimmed.to_string(),
                reason: format!("unexpected character {:?}", bad),
            }
            .into());
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// The normalized symbol text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '^' | '=')
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Symbol {
    type Err = crate::error::GlobeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = crate::error::GlobeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}
