use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::recurring::METRIC_RECURRING_OCCURRENCE;
use crate::cache::{
    METRIC_CACHE_ENTRIES, METRIC_CACHE_EVICT, METRIC_CACHE_EXPIRE, METRIC_CACHE_FETCH_ERROR,
    METRIC_CACHE_FETCH_MS, METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATE, METRIC_CACHE_MISS,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(METRIC_CACHE_HIT, Unit::Count, "Total number of cache hits.");
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of cache misses, including expired and mistyped entries."
        );
        describe_counter!(
            METRIC_CACHE_EVICT,
            Unit::Count,
            "Total number of live entries evicted due to capacity."
        );
        describe_counter!(
            METRIC_CACHE_EXPIRE,
            Unit::Count,
            "Total number of entries dropped after their TTL elapsed."
        );
        describe_counter!(
            METRIC_CACHE_INVALIDATE,
            Unit::Count,
            "Total number of entries removed by invalidation."
        );
        describe_gauge!(
            METRIC_CACHE_ENTRIES,
            Unit::Count,
            "Current number of entries held by the cache."
        );
        describe_histogram!(
            METRIC_CACHE_FETCH_MS,
            Unit::Milliseconds,
            "Latency of fetches run on cache misses in milliseconds."
        );
        describe_counter!(
            METRIC_CACHE_FETCH_ERROR,
            Unit::Count,
            "Total number of fetches that failed on a cache miss."
        );
        describe_counter!(
            METRIC_RECURRING_OCCURRENCE,
            Unit::Count,
            "Total number of recurring expense occurrences booked."
        );
    });
}
