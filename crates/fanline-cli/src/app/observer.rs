use super::telemetry::{
    increment_items_failed, increment_items_processed, record_batch, record_items_dropped,
    record_items_submitted, record_run_duration,
};
use fanline::{CompletionSummary, Event, Observer};
use std::sync::atomic::{AtomicU64, Ordering};

/// Feeds pipeline events into the metric handles.
///
/// Logging already happens inside the library, so this observer only records
/// counters. Without the `metrics` feature every call is a no-op.
///
/// Items are counted as submitted when their batch completes. A batch cut short
/// by cancellation is settled when the generator stops, and items that never
/// produced a result are settled on completion, so `items_inflight` returns to
/// zero at the end of every run.
#[derive(Debug, Default)]
pub struct TelemetryObserver {
    /// Items already reported through `items_submitted`.
    submitted: AtomicU64,
}

impl TelemetryObserver {
    /// Items submitted but not yet reported, given the generator's final
    /// count. Marks them as reported.
    fn settle_submitted(&self, total: u64) -> u64 {
        total.saturating_sub(self.submitted.swap(total, Ordering::Relaxed))
    }
}

/// Items that were submitted but whose result never reached the collector.
fn uncollected(summary: &CompletionSummary) -> u64 {
    summary
        .submitted
        .saturating_sub(summary.processed + summary.errored)
}

impl Observer for TelemetryObserver {
    fn on_event(&self, event: &Event<'_>) {
        match *event {
            Event::BatchDone { submitted, .. } => {
                let submitted = submitted as u64;
                self.submitted.fetch_add(submitted, Ordering::Relaxed);
                record_batch();
                record_items_submitted(submitted);
            }
            Event::GeneratorStopped(report) => {
                record_items_submitted(self.settle_submitted(report.submitted));
            }
            Event::ItemSucceeded { .. } => increment_items_processed(),
            Event::ItemFailed { .. } => increment_items_failed(),
            Event::Completed(summary) => {
                record_items_dropped(uncollected(summary));
                record_run_duration(summary.elapsed.as_secs_f64() * 1_000.0);
            }
            Event::BatchStarted { .. } => {}
        }
    }
}
