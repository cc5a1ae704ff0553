//! Registry of pending composite fetches, one per symbol.
//!
//! Callers that miss the cache while a fetch for the same symbol is already
//! running attach to that fetch instead of starting another. The fetch runs
//! on its own Tokio task, so it completes (and deregisters) even if every
//! attached caller goes away.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use globeline_core::{OverviewError, Symbol, TickerOverview};
use tracing::{debug, error};

/// Future shared by every caller attached to one fetch.
pub type SharedOverview = Shared<BoxFuture<'static, Result<TickerOverview, OverviewError>>>;

/// How a caller came to hold a [`SharedOverview`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// This caller's factory created the operation.
    Started,
    /// An operation was already registered; the factory was not called.
    Joined,
}

struct InFlight {
    id: u64,
    future: SharedOverview,
}

/// Concurrent map of symbol to its pending fetch.
#[derive(Default)]
pub struct InFlightRegistry {
    ops: Arc<DashMap<Symbol, InFlight>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for InFlightRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightRegistry")
            .field("pending", &self.ops.len())
            .finish()
    }
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the pending fetch for `key`, creating it with `factory` if none
    /// is registered.
    ///
    /// Insert-if-absent is atomic: of any number of simultaneous callers for
    /// an absent key, exactly one invokes `factory`. The created future is
    /// spawned immediately and its registry entry is removed exactly once
    /// when it settles, including on panic or abort.
    ///
    /// Must be called from within a Tokio runtime. `factory` runs while the
    /// key's shard is locked and must not call back into this registry.
    pub fn get_or_create<F, Fut>(&self, key: &Symbol, factory: F) -> (SharedOverview, Attachment)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TickerOverview, OverviewError>> + Send + 'static,
    {
        match self.ops.entry(key.clone()) {
            Entry::Occupied(existing) => {
                debug!(symbol = %key, op_id = existing.get().id, "Joining in-flight fetch");
                (existing.get().future.clone(), Attachment::Joined)
            }
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let work = factory();
                let guard = Deregister {
                    ops: Arc::clone(&self.ops),
                    key: key.clone(),
                    id,
                };
                let handle = tokio::spawn(async move {
                    let _guard = guard;
                    work.await
                });

                let symbol = key.to_string();
                let future = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(join_error) => {
                            let reason = if join_error.is_panic() {
                                "aggregation task panicked"
                            } else {
                                "aggregation task was cancelled"
                            };
                            error!(symbol = %symbol, reason, "In-flight fetch failed internally");
                            Err(OverviewError::Internal {
                                symbol,
                                reason: reason.to_string(),
                            })
                        }
                    }
                }
                .boxed()
                .shared();

                slot.insert(InFlight {
                    id,
                    future: future.clone(),
                });
                debug!(symbol = %key, op_id = id, "Registered in-flight fetch");
                (future, Attachment::Started)
            }
        }
    }

    /// True if a fetch for `key` is pending.
    pub fn contains(&self, key: &Symbol) -> bool {
        self.ops.contains_key(key)
    }

    /// Number of pending fetches.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Removes the entry for `(key, id)` when dropped.
///
/// Matching on `id` keeps a late drop from removing a newer operation that
/// reused the same key.
struct Deregister {
    ops: Arc<DashMap<Symbol, InFlight>>,
    key: Symbol,
    id: u64,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        let id = self.id;
        if self.ops.remove_if(&self.key, |_, op| op.id == id).is_some() {
            debug!(symbol = %self.key, op_id = id, "Deregistered in-flight fetch");
        }
    }
}
