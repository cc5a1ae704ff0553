//! Staleness metadata for cache reads.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Result of a cache read, carrying when the value was written.
///
/// Returned by stale lookups so callers can see how old the data they are
/// about to serve is.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    cached_at: DateTime<Utc>,
}

impl<T> CacheRead<T> {
    pub fn new(value: T, cached_at: DateTime<Utc>) -> Self {
        Self { value, cached_at }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// When the value was written to the cache.
    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    /// Age of the value as of `now`. Zero if `now` precedes the write.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.cached_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Age of the value right now.
    pub fn staleness(&self) -> Duration {
        self.age_at(Utc::now())
    }
}
