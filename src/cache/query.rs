//! Cache-aside query wrapper.
//!
//! `query` returns the cached value for a key when one is live, otherwise runs
//! the caller's fetcher, stores its result and returns it. Fetch errors are
//! handed back untouched and never cached.
//!
//! Concurrent misses on the same key are coalesced: the first caller fetches
//! while later callers wait on a per-key lock and then read the stored value.

use std::any::type_name;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::{counter, histogram};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::{CacheKey, Tag};
use super::store::{CachePayload, TtlStore};

pub(crate) const METRIC_CACHE_FETCH_MS: &str = "fleetdesk_cache_fetch_ms";
pub(crate) const METRIC_CACHE_FETCH_ERROR: &str = "fleetdesk_cache_fetch_error_total";

pub struct CacheAside {
    config: CacheConfig,
    store: Arc<TtlStore>,
    inflight: DashMap<CacheKey, Arc<AsyncMutex<()>>>,
}

impl CacheAside {
    pub fn new(config: CacheConfig, store: Arc<TtlStore>) -> Self {
        Self {
            config,
            store,
            inflight: DashMap::new(),
        }
    }

    /// Read through the cache, storing a miss for `ttl`.
    ///
    /// The stored value is tagged with the namespace named by the key prefix,
    /// so namespace invalidation reaches it.
    pub async fn query<T, E, F, Fut>(&self, key: &CacheKey, ttl: Duration, fetcher: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.query_tagged(key, ttl, std::iter::empty(), fetcher).await
    }

    /// Read through the cache, tagging a freshly stored value for invalidation.
    pub async fn query_tagged<T, E, F, Fut, I>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        tags: I,
        fetcher: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        I: IntoIterator<Item = Tag>,
    {
        if !self.config.enabled {
            return fetcher().await;
        }

        if let Some(value) = self.lookup::<T>(key) {
            return Ok(value);
        }

        let slot = InflightSlot::acquire(&self.inflight, key);
        let _guard = slot.mutex().lock().await;

        // Another caller may have filled the key while we waited.
        if let Some(value) = self.lookup::<T>(key) {
            return Ok(value);
        }
        let mut tags: BTreeSet<Tag> = tags.into_iter().collect();
        if let Some(namespace) = key.namespace() {
            tags.insert(Tag::Namespace(namespace));
        }
        self.fetch_and_store(key, ttl, tags, fetcher).await
    }

    /// Configured `cache.default_ttl_seconds`; dashboards are cached for this long.
    pub fn default_ttl(&self) -> Duration {
        self.config.default_ttl()
    }

    async fn fetch_and_store<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        tags: BTreeSet<Tag>,
        fetcher: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let epoch = self.store.epoch();
        let started_at = Instant::now();

        let value = match fetcher().await {
            Ok(value) => value,
            Err(err) => {
                counter!(METRIC_CACHE_FETCH_ERROR).increment(1);
                warn!(key = %key, "Cache fetch failed; nothing stored");
                return Err(err);
            }
        };
        histogram!(METRIC_CACHE_FETCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        let payload: CachePayload = Arc::new(value.clone());
        let stored = self
            .store
            .set_unless_invalidated(key.clone(), payload, ttl, tags, epoch);
        debug!(key = %key, stored, "Cache filled from fetcher");

        Ok(value)
    }

    fn lookup<T: Clone + 'static>(&self, key: &CacheKey) -> Option<T> {
        let payload = self.store.get(key)?;
        match payload.downcast_ref::<T>() {
            Some(value) => Some(value.clone()),
            None => {
                warn!(
                    key = %key,
                    expected = type_name::<T>(),
                    "Cached value has an unexpected type; treating as miss"
                );
                self.store.delete(key);
                None
            }
        }
    }

    #[cfg(test)]
    fn inflight_len(&self) -> usize {
        self.inflight.len()
    }
}

/// Per-key fetch lock, released from the map when the last holder drops it.
///
/// Dropping a pending query (client disconnect, timeout) runs the same cleanup.
struct InflightSlot<'a> {
    map: &'a DashMap<CacheKey, Arc<AsyncMutex<()>>>,
    key: CacheKey,
    mutex: Option<Arc<AsyncMutex<()>>>,
}

impl<'a> InflightSlot<'a> {
    fn acquire(map: &'a DashMap<CacheKey, Arc<AsyncMutex<()>>>, key: &CacheKey) -> Self {
        let mutex = Arc::clone(
            map.entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .value(),
        );
        Self {
            map,
            key: key.clone(),
            mutex: Some(mutex),
        }
    }

    fn mutex(&self) -> &AsyncMutex<()> {
        self.mutex
            .as_deref()
            .unwrap_or_else(|| unreachable!("slot mutex is only taken on drop"))
    }
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        self.mutex.take();
        // Only the map holds the mutex once every waiter has finished.
        self.map
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
