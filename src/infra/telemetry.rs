use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
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

/// Register descriptions for every metric the report cache emits.
fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "bistro_report_cache_hit_total",
            Unit::Count,
            "Report requests served from the cache."
        );
        describe_counter!(
            "bistro_report_cache_miss_total",
            Unit::Count,
            "Report requests that found no fresh cache entry."
        );
        describe_counter!(
            "bistro_report_cache_evict_total",
            Unit::Count,
            "Cached reports evicted because the store reached capacity."
        );
        describe_counter!(
            "bistro_report_cache_invalidated_total",
            Unit::Count,
            "Invalidation passes, labelled by scope."
        );
        describe_counter!(
            "bistro_report_cache_store_error_total",
            Unit::Count,
            "Cache store operations that failed, labelled by operation."
        );
        describe_gauge!(
            "bistro_report_cache_entries",
            Unit::Count,
            "Entries held by the report cache at the last stats read."
        );
        describe_histogram!(
            "bistro_report_generation_ms",
            Unit::Milliseconds,
            "Wall time of requests that generated a fresh report."
        );
        describe_counter!(
            "bistro_report_generation_timeout_total",
            Unit::Count,
            "Report generations abandoned after the deadline."
        );
        describe_counter!(
            "bistro_report_singleflight_joined_total",
            Unit::Count,
            "Requests that joined an in-flight generation instead of starting one."
        );
    });
}
