//! Fan-out worker pool.
//!
//! All workers pull from one shared input queue and push into one shared
//! result queue. A worker never closes either queue: the input queue belongs
//! to the generator and the result queue is closed by the pipeline once every
//! worker has exited.

use crate::{ItemError, ItemResult, Processor, WorkItem, item::Admitted};
use core::time::Duration;
use std::sync::Arc;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;

/// The receiving half of the input queue, shared by every worker.
pub(crate) type SharedInput = Arc<Mutex<mpsc::Receiver<Admitted>>>;

/// What a single worker did before it exited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    /// Results this worker delivered to the collector.
    pub handled: u64,
}

/// Spawns `count` workers onto a [`JoinSet`].
///
/// Each worker receives its own clone of `results`; the caller keeps the
/// original and decides when the result queue closes.
pub(crate) fn spawn_workers<P: Processor>(
    count: usize,
    input: mpsc::Receiver<Admitted>,
    results: &mpsc::Sender<ItemResult>,
    processor: &Arc<P>,
    item_timeout: Option<Duration>,
    shutdown: &CancellationToken,
) -> JoinSet<WorkerReport> {
    let input: SharedInput = Arc::new(Mutex::new(input));
    let mut workers = JoinSet::new();

    for worker_id in 0..count {
        workers.spawn(worker_loop(
            worker_id,
            Arc::clone(&input),
            results.clone(),
            Arc::clone(processor),
            item_timeout,
            shutdown.clone(),
        ));
    }

    workers
}

/// Worker task: receive, process, report, release.
///
/// Runs until the input queue is closed and drained, the result queue is
/// gone, or `shutdown` fires. Every wait races `shutdown`:
///
/// - waiting for the next item,
/// - processing the item,
/// - waiting for room in the result queue.
///
/// Once an item has been dequeued its admission permit is released on every
/// path. If cancellation interrupts processing or the result send, the result
/// is dropped and the permit still goes back to the gate.
pub(crate) async fn worker_loop<P: Processor>(
    worker_id: usize,
    input: SharedInput,
    results: mpsc::Sender<ItemResult>,
    processor: Arc<P>,
    item_timeout: Option<Duration>,
    shutdown: CancellationToken,
) -> WorkerReport {
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    let mut handled = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            next = recv_next(&input) => next,
        };

        let Some(Admitted { item, permit }) = next else {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {worker_id} input closed");
            break;
        };

        let result = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                permit.release();
                break;
            }
            result = run_item(processor.as_ref(), worker_id, item, item_timeout) => result,
        };

        let sent = tokio::select! {
            biased;
            () = shutdown.cancelled() => false,
            sent = results.send(result) => sent.is_ok(),
        };

        // Release only after the result has left this worker, so the slot
        // covers the whole lifetime of the item.
        permit.release();

        if !sent {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {worker_id} dropped result for item {}", item.id);
            break;
        }
        handled += 1;
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped after {handled} items");

    WorkerReport {
        worker_id,
        handled,
    }
}

async fn recv_next(input: &SharedInput) -> Option<Admitted> {
    input.lock().await.recv().await
}

async fn run_item<P: Processor>(
    processor: &P,
    worker_id: usize,
    item: WorkItem,
    item_timeout: Option<Duration>,
) -> ItemResult {
    let outcome = match item_timeout {
        Some(limit) => tokio::time::timeout(limit, processor.process(worker_id, item))
            .await
            .unwrap_or(Err(ItemError::TimedOut { after: limit })),
        None => processor.process(worker_id, item).await,
    };

    match outcome {
        Ok(outcome) => ItemResult::success(item.id, outcome),
        Err(error) => ItemResult::failure(item.id, error),
    }
}
