use crate::{AdmissionGate, Event, Observer, PipelineConfig, WorkItem, item::Admitted};
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

/// What the generator did before it closed the input queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GeneratorReport {
    /// Items successfully enqueued for the workers.
    pub submitted: u64,
    /// Batches started, including a batch cut short by cancellation.
    pub batches: u64,
    /// Whether the generator stopped because the run was cancelled.
    pub cancelled: bool,
}

enum Submission {
    Sent,
    Cancelled,
    Closed,
}

/// Emits numbered work items in timed batches until the schedule completes or
/// the run is cancelled.
///
/// This task owns the only [`mpsc::Sender`] of the input queue. Returning
/// drops it, which is the one and only way the input queue is closed.
///
/// # Arguments
///
/// - `config`: Batch size, batch period and [`Schedule`](crate::Schedule).
/// - `gate`: Admission gate; one permit is acquired per item before it is
///   enqueued and travels with the item to the worker.
/// - `input`: Sender half of the shared input queue.
/// - `shutdown`: Cancellation token raced at every suspension point.
/// - `observer`: Receives `BatchStarted`, `BatchDone` and `GeneratorStopped`.
///
/// # Behavior
///
/// - The first batch starts one period after the generator starts; item ids
///   are `batch * batch_size + offset`.
/// - Waiting for a permit and waiting for queue space both race `shutdown`.
///   If cancellation wins while an item is waiting for queue space, the item
///   is dropped together with its permit, returning the slot to the gate.
/// - If every worker has gone away the queue reports closed and the generator
///   stops early.
pub(crate) async fn generate_batches<O: Observer>(
    config: PipelineConfig,
    gate: AdmissionGate,
    input: mpsc::Sender<Admitted>,
    shutdown: CancellationToken,
    observer: Arc<O>,
) -> GeneratorReport {
    let schedule = config.schedule();
    let batch_size = config.batch_size() as u64;
    let period = config.batch_period();
    let mut report = GeneratorReport::default();

    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    'batches: while !schedule.is_complete(report.batches) {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                report.cancelled = true;
                break 'batches;
            }
            _ = ticker.tick() => {}
        }

        let batch = report.batches;
        report.batches += 1;
        #[cfg(feature = "tracing")]
        tracing::info!("starting batch {batch}");
        observer.on_event(&Event::BatchStarted { batch });

        for offset in 0..batch_size {
            let item = WorkItem::new(batch * batch_size + offset);
            match submit(item, &gate, &input, &shutdown).await {
                Submission::Sent => report.submitted += 1,
                Submission::Cancelled => {
                    report.cancelled = true;
                    break 'batches;
                }
                Submission::Closed => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("input queue closed by workers during batch {batch}");
                    break 'batches;
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!("batch {batch} done");
        observer.on_event(&Event::BatchDone {
            batch,
            submitted: batch_size as usize,
        });
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        submitted = report.submitted,
        batches = report.batches,
        cancelled = report.cancelled,
        "generator stopped"
    );
    observer.on_event(&Event::GeneratorStopped(&report));

    report
}

/// Admits a single item and hands it to the input queue.
async fn submit(
    item: WorkItem,
    gate: &AdmissionGate,
    input: &mpsc::Sender<Admitted>,
    shutdown: &CancellationToken,
) -> Submission {
    // 1) acquire a slot (waits while the gate is at capacity)
    let Some(permit) = gate.acquire(shutdown).await else {
        return Submission::Cancelled;
    };

    // 2) enqueue (waits while the input queue is full). The permit moves into
    //    the pending send; if cancellation wins, dropping that send releases it.
    tokio::select! {
        biased;
        () = shutdown.cancelled() => Submission::Cancelled,
        sent = input.send(Admitted { item, permit }) => match sent {
            Ok(()) => Submission::Sent,
            Err(_) => Submission::Closed,
        },
    }
}
