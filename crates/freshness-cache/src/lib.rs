//! A time-to-live cache holding a single computed value.
//!
//! Every instance represents one logical key. A value younger than the TTL is
//! returned right away. Once it expires the first caller starts a refresh and
//! every caller arriving while that refresh is in flight shares it, so the
//! upstream source sees at most one computation per key at any time.
//!
//! Refreshes run on their own task. A caller that stops waiting (timeout,
//! dropped request) never cancels the refresh other callers depend on.
//!
//! A failed refresh falls back to the previous value when there is one; only
//! a cache that never held a value reports the failure.

pub mod clock;

#[cfg(any(test, feature = "test-util"))]
pub use clock::FakeClock;
pub use clock::{Clock, SystemClock};
use {
    chrono::{DateTime, Utc},
    futures::{
        FutureExt,
        future::{BoxFuture, Shared},
    },
    prometheus::IntCounterVec,
    std::{
        future::Future,
        panic::AssertUnwindSafe,
        sync::{Arc, Mutex},
        time::Duration,
    },
};

/// A computed value together with the time it was computed at.
#[derive(Debug)]
pub struct Cached<T> {
    pub value: Arc<T>,
    pub computed_at: DateTime<Utc>,
}

impl<T> Clone for Cached<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            computed_at: self.computed_at,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The computation failed and there was no previous value to fall back to.
    #[error("upstream computation failed: {0:#}")]
    Upstream(Arc<anyhow::Error>),
    /// The refresh task was torn down before it finished, e.g. during runtime
    /// shutdown.
    #[error("refresh task aborted: {0}")]
    Aborted(Arc<str>),
}

/// What callers observe while a refresh of an expired value is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Policy {
    /// Wait for the refresh and return its result.
    #[default]
    Wait,
    /// Return the expired value immediately and let the refresh finish in the
    /// background. Callers without any value still wait.
    ServeStale,
}

type Refresh<T> = Shared<BoxFuture<'static, Result<Cached<T>, Error>>>;

pub struct FreshnessCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for FreshnessCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T> {
    label: &'static str,
    ttl: chrono::Duration,
    policy: Policy,
    clock: Arc<dyn Clock>,
    entry: Mutex<Entry<T>>,
}

/// Idle when `refresh` is `None`, refreshing otherwise.
struct Entry<T> {
    value: Option<Cached<T>>,
    refresh: Option<Refresh<T>>,
}

impl<T> FreshnessCache<T>
where
    T: Send + Sync + 'static,
{
    /// Creates an empty cache. The `label` identifies the key in logs and
    /// metrics.
    pub fn new(label: &'static str, ttl: Duration, policy: Policy, clock: Arc<dyn Clock>) -> Self {
        Metrics::get().reset(label);
        Self {
            inner: Arc::new(Inner {
                label,
                ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
                policy,
                clock,
                entry: Mutex::new(Entry {
                    value: None,
                    refresh: None,
                }),
            }),
        }
    }

    /// Returns the cached value if it is still fresh. Otherwise returns the
    /// result of the in-flight refresh, starting one with `compute` if none is
    /// running yet. `compute` is only called by the caller that starts the
    /// refresh.
    pub async fn get<F, Fut>(&self, compute: F) -> Result<Cached<T>, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let refresh = {
            let mut entry = self.inner.entry.lock().unwrap();
            let now = self.inner.clock.now();
            if let Some(cached) = &entry.value {
                if self.inner.is_fresh(cached, now) {
                    self.inner.observe_access("hit");
                    return Ok(cached.clone());
                }
            }

            let refresh = match &entry.refresh {
                Some(refresh) => refresh.clone(),
                None => {
                    tracing::debug!(key = self.inner.label, "starting refresh");
                    let refresh = self.spawn_refresh(compute());
                    entry.refresh = Some(refresh.clone());
                    refresh
                }
            };

            if let (Policy::ServeStale, Some(stale)) = (self.inner.policy, &entry.value) {
                self.inner.observe_access("stale");
                return Ok(stale.clone());
            }
            self.inner.observe_access("miss");
            refresh
        };

        refresh.await
    }

    /// Returns the current value regardless of its age without triggering a
    /// refresh.
    pub fn peek(&self) -> Option<Cached<T>> {
        self.inner.entry.lock().unwrap().value.clone()
    }

    /// Returns whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.entry.lock().unwrap().refresh.is_some()
    }

    fn spawn_refresh<Fut>(&self, computation: Fut) -> Refresh<T>
    where
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            let result = match AssertUnwindSafe(computation).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("computation panicked")),
            };
            inner.complete(result)
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(err) => Err(Error::Aborted(err.to_string().into())),
            }
        }
        .boxed()
        .shared()
    }
}

impl<T> Inner<T> {
    fn is_fresh(&self, cached: &Cached<T>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(cached.computed_at) < self.ttl
    }

    /// Stores the outcome of a refresh and moves the entry back to idle.
    fn complete(&self, result: anyhow::Result<T>) -> Result<Cached<T>, Error> {
        let mut entry = self.entry.lock().unwrap();
        entry.refresh = None;
        match result {
            Ok(value) => {
                let cached = Cached {
                    value: Arc::new(value),
                    computed_at: self.clock.now(),
                };
                entry.value = Some(cached.clone());
                self.observe_refresh("success");
                tracing::debug!(key = self.label, computed_at = %cached.computed_at, "refreshed");
                Ok(cached)
            }
            Err(err) => match &entry.value {
                Some(stale) => {
                    self.observe_refresh("fallback");
                    tracing::warn!(
                        key = self.label,
                        ?err,
                        computed_at = %stale.computed_at,
                        "refresh failed, serving previous value"
                    );
                    Ok(stale.clone())
                }
                None => {
                    self.observe_refresh("failure");
                    tracing::error!(key = self.label, ?err, "refresh failed without previous value");
                    Err(Error::Upstream(Arc::new(err)))
                }
            },
        }
    }

    fn observe_access(&self, result: &str) {
        Metrics::get()
            .freshness_cache_access
            .with_label_values(&[self.label, result])
            .inc();
    }

    fn observe_refresh(&self, result: &str) {
        Metrics::get()
            .freshness_cache_refreshes
            .with_label_values(&[self.label, result])
            .inc();
    }
}

#[derive(prometheus_metric_storage::MetricStorage)]
struct Metrics {
    /// Cache lookups by key and result (hit, miss, stale).
    #[metric(labels("key", "result"))]
    freshness_cache_access: IntCounterVec,

    /// Finished refreshes by key and result (success, fallback, failure).
    #[metric(labels("key", "result"))]
    freshness_cache_refreshes: IntCounterVec,
}

impl Metrics {
    fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry()).unwrap()
    }

    fn reset(&self, key: &str) {
        for result in ["hit", "miss", "stale"] {
            self.freshness_cache_access
                .with_label_values(&[key, result])
                .reset();
        }
        for result in ["success", "fallback", "failure"] {
            self.freshness_cache_refreshes
                .with_label_values(&[key, result])
                .reset();
        }
    }
}
