//! # Telemetry Features
//!
//! Logs are always written to the console through `tracing_subscriber::fmt`,
//! filtered by `RUST_LOG` (default `info`). The pipeline library emits its
//! batch, per-item and lifecycle events there.
//!
//! Metrics are optional and exported through OpenTelemetry.
//!
//! ## Feature matrix
//!
//! - `metrics`: Enables OpenTelemetry metrics (counters, histograms, etc.).
//! - `stdout`: Exports metrics to stdout every 5 seconds. Implies `metrics`.
//!
//! ## Metrics
//!
//! - `items_submitted`: items enqueued by the generator
//! - `items_processed`: results delivered without an error
//! - `items_failed`: results delivered with an error
//! - `items_inflight`: items submitted but not yet collected
//! - `batches`: batches completed by the generator
//! - `run_duration`: wall-clock duration of a run in milliseconds
//!
//! ## Example usage
//!
//! ```bash
//! cargo run -p fanline-cli --features stdout -- --batches 20
//! ```

// Core imports - always needed
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// Metrics-specific imports
#[cfg(feature = "metrics")]
use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, Histogram, Meter, UpDownCounter},
};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::{Resource, metrics as sdkmetrics};
#[cfg(feature = "metrics")]
use opentelemetry_semantic_conventions as semvcns;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

pub struct TelemetryProviders {
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down any exporters. Errors are reported on stderr
    /// since logging may already be torn down.
    pub fn shutdown(self) {
        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        )
        .try_init()?;

    #[cfg(feature = "metrics")]
    {
        let scope = InstrumentationScope::builder("fanline")
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(semvcns::SCHEMA_URL)
            .build();
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        init_metric_handles(&opentelemetry::global::meter_with_scope(scope));
    }

    Ok(TelemetryProviders {
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(feature = "metrics")]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("fanline")
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> sdkmetrics::SdkMeterProvider {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    builder.build()
}

// Metric handles - only compiled when metrics feature is enabled
#[cfg(feature = "metrics")]
static ITEMS_SUBMITTED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static ITEMS_PROCESSED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static ITEMS_FAILED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static ITEMS_INFLIGHT: OnceLock<UpDownCounter<i64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static BATCHES: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static RUN_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: &Meter) {
    let _ = ITEMS_SUBMITTED.set(
        meter
            .u64_counter("items_submitted")
            .with_description("Work items enqueued by the generator")
            .build(),
    );

    let _ = ITEMS_PROCESSED.set(
        meter
            .u64_counter("items_processed")
            .with_description("Results delivered without an error")
            .build(),
    );

    let _ = ITEMS_FAILED.set(
        meter
            .u64_counter("items_failed")
            .with_description("Results delivered with an error")
            .build(),
    );

    let _ = ITEMS_INFLIGHT.set(
        meter
            .i64_up_down_counter("items_inflight")
            .with_description("Items submitted but not yet collected")
            .build(),
    );

    let _ = BATCHES.set(
        meter
            .u64_counter("batches")
            .with_description("Batches completed by the generator")
            .build(),
    );

    let _ = RUN_DURATION_MS.set(
        meter
            .f64_histogram("run_duration")
            .with_unit("ms")
            .with_description("End-to-end pipeline duration")
            .build(),
    );
}

// Convenience functions that compile to no-ops when metrics are disabled
#[cfg(feature = "metrics")]
pub fn record_batch() {
    if let Some(counter) = BATCHES.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_batch() {}

#[cfg(feature = "metrics")]
pub fn record_items_submitted(count: u64) {
    if count == 0 {
        return;
    }
    if let Some(counter) = ITEMS_SUBMITTED.get() {
        counter.add(count, &[]);
    }
    if let Some(counter) = ITEMS_INFLIGHT.get() {
        counter.add(count as i64, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_items_submitted(_count: u64) {}

#[cfg(feature = "metrics")]
pub fn increment_items_processed() {
    if let Some(counter) = ITEMS_PROCESSED.get() {
        counter.add(1, &[]);
    }
    if let Some(counter) = ITEMS_INFLIGHT.get() {
        counter.add(-1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_items_processed() {}

#[cfg(feature = "metrics")]
pub fn increment_items_failed() {
    if let Some(counter) = ITEMS_FAILED.get() {
        counter.add(1, &[]);
    }
    if let Some(counter) = ITEMS_INFLIGHT.get() {
        counter.add(-1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_items_failed() {}

/// Removes items that were submitted but never collected from the in-flight
/// gauge.
#[cfg(feature = "metrics")]
pub fn record_items_dropped(count: u64) {
    if count == 0 {
        return;
    }
    if let Some(counter) = ITEMS_INFLIGHT.get() {
        counter.add(-(count as i64), &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_items_dropped(_count: u64) {}

#[cfg(feature = "metrics")]
pub fn record_run_duration(duration_ms: f64) {
    if let Some(histogram) = RUN_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_run_duration(_duration_ms: f64) {}
