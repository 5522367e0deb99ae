//! A call-site-owned cache for values that are slow to fetch and fine to be a little old,
//! like the trending entries widget.
//!
//! - Concurrent requests for the same key share one in-flight computation.
//! - Completed values live for a fixed TTL. Expired entries are evicted when read, then recomputed.
//! - Failures are never cached.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use std::hash::Hash;
use std::sync::Arc;

pub struct ChokePoint<K, V, E> {
    cache: Arc<DashMap<K, CacheEntry<V, E>>>,
    ttl: TimeDelta,
    now: Arc<dyn Fn() -> DateTime<Utc>>,
}

enum CacheEntry<V, E> {
    // Store the shared future for in-flight requests
    Computing(Shared<LocalBoxFuture<'static, Result<Arc<V>, E>>>),
    // Store completed values directly for fast path
    Completed {
        value: Arc<V>,
        expires_at: DateTime<Utc>,
    },
}

enum Lookup<V, E> {
    Fresh(Arc<V>),
    InFlight(Shared<LocalBoxFuture<'static, Result<Arc<V>, E>>>),
    Expired,
    Missing,
}

impl<K, V, E> ChokePoint<K, V, E>
where
    K: Clone + Eq + Hash + 'static,
    V: 'static,
    E: Clone + 'static,
{
    pub fn new(ttl: TimeDelta) -> Self {
        Self::with_clock(ttl, Arc::new(Utc::now))
    }

    /// Use `now` instead of the system clock, e.g. to test expiry.
    pub fn with_clock(ttl: TimeDelta, now: Arc<dyn Fn() -> DateTime<Utc>>) -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            ttl,
            now,
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    fn lookup(&self, key: &K, now: DateTime<Utc>) -> Lookup<V, E> {
        match self.cache.get(key) {
            None => Lookup::Missing,
            Some(entry) => match entry.value() {
                CacheEntry::Completed { value, expires_at } if *expires_at > now => {
                    Lookup::Fresh(Arc::clone(value))
                }
                CacheEntry::Completed { .. } => Lookup::Expired,
                CacheEntry::Computing(future) => Lookup::InFlight(future.clone()),
            },
        }
    }

    /// Return the cached value for `key`, or run `compute` to produce it.
    /// `compute` is only called when nothing usable is cached or in flight.
    pub async fn get<F, Fut>(&self, key: K, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + 'static,
    {
        let now = (self.now)();

        // Fast path. The map guard is released before anything is awaited or removed.
        match self.lookup(&key, now) {
            Lookup::Fresh(value) => return Ok(value),
            Lookup::InFlight(future) => return future.await,
            Lookup::Expired => {
                log::debug!("Cache entry expired, evicting");
                self.cache.remove_if(&key, |_, entry| {
                    matches!(entry, CacheEntry::Completed { expires_at, .. } if *expires_at <= now)
                });
            }
            Lookup::Missing => {}
        }

        // Slow path: need to compute
        let key_clone = key.clone();

        // Wrap the computation to handle cleanup on error
        let cache = Arc::clone(&self.cache);
        let clock = Arc::clone(&self.now);
        let ttl = self.ttl;
        let compute = compute();
        let wrapped = async move {
            let result = compute.await.map(Arc::new);

            match &result {
                Ok(value) => {
                    // Replace future with completed value
                    cache.insert(
                        key_clone,
                        CacheEntry::Completed {
                            value: Arc::clone(value),
                            expires_at: clock() + ttl,
                        },
                    );
                }
                Err(_) => {
                    // Remove failed computation
                    cache.remove(&key_clone);
                }
            }

            result
        }
        .boxed_local()
        .shared();

        // Insert or get existing computation
        let future = match self.cache.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => match entry.get() {
                CacheEntry::Completed { value, expires_at } if *expires_at > now => {
                    return Ok(Arc::clone(value));
                }
                CacheEntry::Computing(future) => future.clone(),
                CacheEntry::Completed { .. } => {
                    entry.insert(CacheEntry::Computing(wrapped.clone()));
                    wrapped
                }
            },
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(CacheEntry::Computing(wrapped.clone()));
                wrapped
            }
        };

        future.await
    }

    /// Forget `key`, e.g. after a write that makes it wrong.
    pub fn invalidate(&self, key: &K) {
        self.cache.remove(key);
    }

    /// Drop every completed entry that has expired. In-flight computations are kept.
    pub fn purge_expired(&self) -> usize {
        let now = (self.now)();
        let before = self.cache.len();
        self.cache.retain(|_, entry| match entry {
            CacheEntry::Completed { expires_at, .. } => *expires_at > now,
            CacheEntry::Computing(_) => true,
        });
        before - self.cache.len()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
