//! Cache configuration.
//!
//! Controls the in-process TTL store via the `[cache]` settings section.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_MAX_ENTRIES: usize = 2_000;
const DEFAULT_TTL_SECONDS: u64 = 120;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false every lookup is a miss and nothing is stored.
    pub enabled: bool,
    /// Upper bound on live entries; the least recently used entry is evicted beyond it.
    pub max_entries: usize,
    /// TTL applied when a caller does not supply one.
    pub default_ttl_seconds: u64,
    /// How often the background sweeper drops expired entries.
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            max_entries: settings.max_entries.get(),
            default_ttl_seconds: settings.default_ttl.as_secs(),
            sweep_interval_seconds: settings.sweep_interval.as_secs(),
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    /// Sweep cadence, never shorter than one second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}
