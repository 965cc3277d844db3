use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    cache::{
        METRIC_CACHE_LOAD_FAILED_TOTAL, METRIC_CACHE_LOAD_MS, METRIC_CACHE_LOAD_TOTAL,
        METRIC_CACHE_PERSIST_FAILED_TOTAL,
    },
    config::{LogFormat, LoggingSettings},
};

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

/// Register descriptions for the catalog cache metrics. Safe to call repeatedly.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_LOAD_TOTAL,
            Unit::Count,
            "Snapshots swapped into a catalog cache, labelled by cache and by origin (source file or product disk cache)."
        );
        describe_counter!(
            METRIC_CACHE_LOAD_FAILED_TOTAL,
            Unit::Count,
            "Catalog loads or reloads that failed; the previously served document, if any, stays in place."
        );
        describe_counter!(
            METRIC_CACHE_PERSIST_FAILED_TOTAL,
            Unit::Count,
            "Failed rewrites of the product `.cache` file; the in-memory document is still served."
        );
        describe_histogram!(
            METRIC_CACHE_LOAD_MS,
            Unit::Milliseconds,
            "Time to read, validate and encode one catalog document."
        );
    });
}
