//! Fleetdesk request cache
//!
//! An in-process, TTL-bounded object cache that sits in front of the
//! repositories:
//!
//! - **Store**: LRU-bounded entries with per-entry TTL, hit counts and tags
//! - **Cache-aside**: `CacheAside::query_tagged` reads through the store and
//!   coalesces concurrent misses on the same key
//! - **Invalidation**: services report writes to the `InvalidationRouter`,
//!   which removes entries by tag before the write's response is sent
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_entries = 2000
//! default_ttl_seconds = 120
//! sweep_interval_seconds = 60
//! ```

mod clock;
mod config;
mod error;
mod keys;
mod lock;
mod mutation;
mod pattern;
mod planner;
mod query;
mod registry;
mod router;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use error::CacheError;
pub use keys::{CacheKey, KeyParams, Namespace, Tag, build_key, entity_key};
pub use mutation::Mutation;
pub use pattern::KeyPattern;
pub use planner::InvalidationPlan;
pub use query::CacheAside;
pub use registry::TagIndex;
pub use router::InvalidationRouter;
pub use store::{CachePayload, CacheStats, EntryStats, TtlStore};

pub(crate) use query::{METRIC_CACHE_FETCH_ERROR, METRIC_CACHE_FETCH_MS};
pub(crate) use store::{
    METRIC_CACHE_ENTRIES, METRIC_CACHE_EVICT, METRIC_CACHE_EXPIRE, METRIC_CACHE_HIT,
    METRIC_CACHE_INVALIDATE, METRIC_CACHE_MISS,
};
