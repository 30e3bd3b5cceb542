//! TTL store: the process-wide key → entry map.
//!
//! Entries expire `ttl` after they were stored and are treated as absent from
//! that instant on, even before a sweep removes them. Capacity is bounded;
//! inserting into a full store evicts the least recently used entry.

use std::any::Any;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lru::LruCache;
use metrics::{counter, gauge};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::error::CacheError;
use super::keys::{CacheKey, Tag};
use super::lock::mutex_lock;
use super::pattern::KeyPattern;
use super::registry::TagIndex;

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_HIT: &str = "fleetdesk_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "fleetdesk_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "fleetdesk_cache_evict_total";
pub(crate) const METRIC_CACHE_EXPIRE: &str = "fleetdesk_cache_expire_total";
pub(crate) const METRIC_CACHE_INVALIDATE: &str = "fleetdesk_cache_invalidate_total";
pub(crate) const METRIC_CACHE_ENTRIES: &str = "fleetdesk_cache_entries";

/// Type-erased cached value.
pub type CachePayload = Arc<dyn Any + Send + Sync>;

struct CacheEntry {
    value: CachePayload,
    stored_at: OffsetDateTime,
    ttl: Duration,
    hit_count: u64,
}

impl CacheEntry {
    /// `None` when the TTL reaches past the representable calendar.
    fn expires_at(&self) -> Option<OffsetDateTime> {
        let ttl = time::Duration::try_from(self.ttl).ok()?;
        self.stored_at.checked_add(ttl)
    }

    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at().is_some_and(|expires_at| now >= expires_at)
    }
}

struct StoreInner {
    entries: LruCache<CacheKey, CacheEntry>,
    tags: TagIndex,
    /// Bumped by every invalidating call, whether or not it removed anything.
    epoch: u64,
}

impl StoreInner {
    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.pop(key)?;
        self.tags.unregister(key);
        Some(entry)
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    invalidations: AtomicU64,
}

/// Per-entry view returned by [`TtlStore::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct EntryStats {
    pub key: CacheKey,
    pub hit_count: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub stored_at: OffsetDateTime,
    pub ttl_seconds: u64,
    pub expired: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    /// Live entries removed to make room.
    pub evictions: u64,
    /// Entries removed because their TTL elapsed.
    pub expirations: u64,
    /// Entries removed by delete, tag, pattern or clear.
    pub invalidations: u64,
    pub keys: Vec<EntryStats>,
}

pub struct TtlStore {
    inner: Mutex<StoreInner>,
    clock: Arc<dyn Clock>,
    max_entries: NonZeroUsize,
    counters: Counters,
}

impl TtlStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let max_entries = config.max_entries_non_zero();
        Self {
            inner: Mutex::new(StoreInner {
                entries: LruCache::new(max_entries),
                tags: TagIndex::new(),
                epoch: 0,
            }),
            clock,
            max_entries,
            counters: Counters::default(),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Return the live value for `key`, dropping it first if it has expired.
    pub fn get(&self, key: &CacheKey) -> Option<CachePayload> {
        enum Lookup {
            Hit(CachePayload),
            Expired,
            Miss,
        }

        let now = self.clock.now();
        let mut inner = mutex_lock(&self.inner, SOURCE, "get");
        let lookup = match inner.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.hit_count += 1;
                Lookup::Hit(Arc::clone(&entry.value))
            }
            Some(_) => Lookup::Expired,
            None => Lookup::Miss,
        };

        match lookup {
            Lookup::Hit(value) => {
                drop(inner);
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                counter!(METRIC_CACHE_HIT).increment(1);
                debug!(key = %key, "Cache hit");
                Some(value)
            }
            Lookup::Expired => {
                inner.remove(key);
                let size = inner.entries.len();
                drop(inner);
                self.record_expired(1);
                self.record_miss(key);
                gauge!(METRIC_CACHE_ENTRIES).set(size as f64);
                None
            }
            Lookup::Miss => {
                drop(inner);
                self.record_miss(key);
                None
            }
        }
    }

    /// Typed read. A value of a different type counts as absent.
    pub fn get_as<T: Clone + 'static>(&self, key: &CacheKey) -> Option<T> {
        self.get(key)
            .and_then(|payload| payload.downcast_ref::<T>().cloned())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub fn set<T: Send + Sync + 'static>(&self, key: CacheKey, value: T, ttl: Duration) {
        self.insert(key, Arc::new(value), ttl, BTreeSet::new(), None);
    }

    pub fn set_tagged<T, I>(&self, key: CacheKey, value: T, ttl: Duration, tags: I)
    where
        T: Send + Sync + 'static,
        I: IntoIterator<Item = Tag>,
    {
        self.insert(key, Arc::new(value), ttl, tags.into_iter().collect(), None);
    }

    /// Store `value` only if no invalidation ran since `epoch` was observed.
    ///
    /// Returns whether the value was stored.
    pub fn set_unless_invalidated(
        &self,
        key: CacheKey,
        value: CachePayload,
        ttl: Duration,
        tags: BTreeSet<Tag>,
        epoch: u64,
    ) -> bool {
        self.insert(key, value, ttl, tags, Some(epoch))
    }

    fn insert(
        &self,
        key: CacheKey,
        value: CachePayload,
        ttl: Duration,
        tags: BTreeSet<Tag>,
        expected_epoch: Option<u64>,
    ) -> bool {
        if ttl.is_zero() {
            debug!(key = %key, "Cache write skipped: zero ttl");
            return false;
        }

        let now = self.clock.now();
        let mut inner = mutex_lock(&self.inner, SOURCE, "insert");

        if let Some(expected) = expected_epoch
            && inner.epoch != expected
        {
            debug!(
                key = %key,
                observed_epoch = expected,
                current_epoch = inner.epoch,
                "Cache write skipped: invalidated while fetching"
            );
            return false;
        }

        inner.remove(&key);

        let mut evicted = 0u64;
        let mut expired = 0u64;
        while inner.entries.len() >= self.max_entries.get() {
            let Some((old_key, old_entry)) = inner.entries.pop_lru() else {
                break;
            };
            inner.tags.unregister(&old_key);
            if old_entry.is_expired(now) {
                expired += 1;
            } else {
                evicted += 1;
                debug!(key = %old_key, "Cache entry evicted under capacity pressure");
            }
        }

        inner.entries.put(
            key.clone(),
            CacheEntry {
                value,
                stored_at: now,
                ttl,
                hit_count: 0,
            },
        );
        inner.tags.register(&key, tags);
        let size = inner.entries.len();
        drop(inner);

        if evicted > 0 {
            self.counters
                .evictions
                .fetch_add(evicted, Ordering::Relaxed);
            counter!(METRIC_CACHE_EVICT).increment(evicted);
        }
        self.record_expired(expired);
        gauge!(METRIC_CACHE_ENTRIES).set(size as f64);
        true
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Remove one key. Absent keys are not an error.
    pub fn delete(&self, key: &CacheKey) -> bool {
        let mut inner = mutex_lock(&self.inner, SOURCE, "delete");
        inner.epoch += 1;
        let removed = inner.remove(key).is_some();
        let size = inner.entries.len();
        drop(inner);

        self.record_invalidated(usize::from(removed), size);
        removed
    }

    /// Remove every key matching a glob pattern.
    ///
    /// A malformed pattern deletes nothing and reports an error.
    pub fn delete_by_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let pattern = KeyPattern::parse(pattern)?;

        let mut inner = mutex_lock(&self.inner, SOURCE, "delete_by_pattern");
        inner.epoch += 1;
        let matching: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter(|(key, _)| pattern.matches(key.as_str()))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &matching {
            inner.remove(key);
        }
        let size = inner.entries.len();
        drop(inner);

        info!(
            pattern = pattern.as_str(),
            removed = matching.len(),
            "Cache entries deleted by pattern"
        );
        self.record_invalidated(matching.len(), size);
        Ok(matching.len())
    }

    /// Remove every entry carrying `tag`.
    pub fn delete_by_tag(&self, tag: &Tag) -> usize {
        let mut inner = mutex_lock(&self.inner, SOURCE, "delete_by_tag");
        inner.epoch += 1;
        let keys = inner.tags.keys_for_tag(tag);
        let removed = keys
            .iter()
            .filter(|key| inner.remove(key).is_some())
            .count();
        let size = inner.entries.len();
        drop(inner);

        debug!(tag = %tag, removed, "Cache entries deleted by tag");
        self.record_invalidated(removed, size);
        removed
    }

    /// Empty the store.
    pub fn clear(&self) -> usize {
        let mut inner = mutex_lock(&self.inner, SOURCE, "clear");
        inner.epoch += 1;
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.tags.clear();
        drop(inner);

        info!(removed, "Cache cleared");
        self.record_invalidated(removed, 0);
        removed
    }

    /// Drop all entries whose TTL has elapsed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = mutex_lock(&self.inner, SOURCE, "purge_expired");
        let expired: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        let size = inner.entries.len();
        drop(inner);

        self.record_expired(expired.len() as u64);
        gauge!(METRIC_CACHE_ENTRIES).set(size as f64);
        expired.len()
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let inner = mutex_lock(&self.inner, SOURCE, "stats");
        let mut keys: Vec<EntryStats> = inner
            .entries
            .iter()
            .map(|(key, entry)| EntryStats {
                key: key.clone(),
                hit_count: entry.hit_count,
                stored_at: entry.stored_at,
                ttl_seconds: entry.ttl.as_secs(),
                expired: entry.is_expired(now),
                tags: inner
                    .tags
                    .tags_for_key(key)
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            })
            .collect();
        let size = inner.entries.len();
        drop(inner);

        keys.sort_by(|a, b| a.key.cmp(&b.key));
        CacheStats {
            size,
            max_size: self.max_entries.get(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            keys,
        }
    }

    /// Number of physically present entries, expired or not.
    pub fn len(&self) -> usize {
        mutex_lock(&self.inner, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current invalidation epoch.
    pub fn epoch(&self) -> u64 {
        mutex_lock(&self.inner, SOURCE, "epoch").epoch
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries.get()
    }

    fn record_miss(&self, key: &CacheKey) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_MISS).increment(1);
        debug!(key = %key, "Cache miss");
    }

    fn record_expired(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.counters
            .expirations
            .fetch_add(count, Ordering::Relaxed);
        counter!(METRIC_CACHE_EXPIRE).increment(count);
    }

    fn record_invalidated(&self, count: usize, size: usize) {
        if count > 0 {
            self.counters
                .invalidations
                .fetch_add(count as u64, Ordering::Relaxed);
            counter!(METRIC_CACHE_INVALIDATE).increment(count as u64);
        }
        gauge!(METRIC_CACHE_ENTRIES).set(size as f64);
    }
}
