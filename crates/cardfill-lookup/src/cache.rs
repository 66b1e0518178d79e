//! TTL cache with in-flight request collapsing.
//!
//! A [`Coordinator`] guarantees at most one running computation per
//! [`CacheKey`]. Every caller that arrives while it runs awaits the same
//! shared future and receives a clone of its result or error. Computations
//! run on their own task, so a caller going away does not cancel the work
//! other callers are waiting on.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinError;

use cardfill_core::CacheKey;

/// Source of "now" for freshness checks.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

type SharedResult<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

struct InFlight<V, E> {
    id: u64,
    future: SharedResult<V, E>,
}

struct State<V, E> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    in_flight: HashMap<CacheKey, InFlight<V, E>>,
    /// Bumped by `clear`; results started under an older epoch are not stored.
    epoch: u64,
    next_id: u64,
}

pub struct Coordinator<V, E> {
    state: Arc<Mutex<State<V, E>>>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl<V, E> std::fmt::Debug for Coordinator<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<V, E> Coordinator<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                epoch: 0,
                next_id: 0,
            })),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            clock,
        }
    }

    /// Returns the fresh cached value for `key`, joins the computation already
    /// running for it, or starts `compute`.
    ///
    /// Successful results are cached; errors are delivered to every waiter
    /// and never cached.
    ///
    /// # Errors
    ///
    /// Whatever `compute` fails with, or `E::from(JoinError)` if it panics.
    pub async fn get_or_compute<F, Fut>(&self, key: &CacheKey, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let shared = {
            let mut state = self.state.lock().await;

            if let Some(entry) = state.entries.get(key) {
                if self.is_fresh(entry) {
                    tracing::debug!(%key, "cache hit");
                    return Ok(entry.value.clone());
                }
            }

            if let Some(running) = state.in_flight.get(key) {
                tracing::debug!(%key, "joining in-flight lookup");
                running.future.clone()
            } else {
                tracing::debug!(%key, "cache miss");
                let id = state.next_id;
                state.next_id += 1;
                let epoch = state.epoch;

                let computation = compute();
                let shared_state = Arc::clone(&self.state);
                let clock = Arc::clone(&self.clock);
                let owned_key = key.clone();
                // Inner task isolates panics so bookkeeping always runs.
                let task = tokio::spawn(async move {
                    let result = tokio::spawn(computation)
                        .await
                        .unwrap_or_else(|e| Err(E::from(e)));
                    settle(&shared_state, clock.as_ref(), owned_key, id, epoch, &result).await;
                    result
                });
                let future = async move { task.await.unwrap_or_else(|e| Err(E::from(e))) }
                    .boxed()
                    .shared();
                state.in_flight.insert(
                    key.clone(),
                    InFlight {
                        id,
                        future: future.clone(),
                    },
                );
                future
            }
        };

        shared.await
    }

    /// Empties the cache and forgets in-flight computations; returns how many
    /// cached entries were dropped.
    ///
    /// Computations already running still answer their callers but do not
    /// write back.
    pub async fn clear(&self) -> usize {
        let mut state = self.state.lock().await;
        let cleared = state.entries.len();
        state.entries.clear();
        state.in_flight.clear();
        state.epoch += 1;
        cleared
    }

    /// Number of cached entries, fresh or not.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    fn is_fresh(&self, entry: &CacheEntry<V>) -> bool {
        self.clock.now().signed_duration_since(entry.stored_at) < self.ttl
    }
}

async fn settle<V: Clone, E>(
    state: &Mutex<State<V, E>>,
    clock: &dyn Clock,
    key: CacheKey,
    id: u64,
    epoch: u64,
    result: &Result<V, E>,
) {
    let mut state = state.lock().await;
    if state.in_flight.get(&key).is_some_and(|running| running.id == id) {
        state.in_flight.remove(&key);
    }
    match result {
        Ok(value) if state.epoch == epoch => {
            state.entries.insert(
                key,
                CacheEntry {
                    value: value.clone(),
                    stored_at: clock.now(),
                },
            );
        }
        Ok(_) => tracing::debug!(%key, "cache cleared during lookup, result not stored"),
        Err(_) => tracing::debug!(%key, "lookup failed, nothing cached"),
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
