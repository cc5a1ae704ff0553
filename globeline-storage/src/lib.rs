//! GlobeLine Storage - Snapshot Cache and In-Flight Registry
//!
//! The two pieces of shared mutable state behind the aggregator. Both are
//! in-process and safe for concurrent use from many tasks.

pub mod cache;
pub mod freshness;
pub mod in_flight;

pub use cache::{CacheStats, SnapshotCache};
pub use freshness::CacheRead;
pub use in_flight::{Attachment, InFlightRegistry, SharedOverview};
