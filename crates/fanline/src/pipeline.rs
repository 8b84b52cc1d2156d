//! Orchestration of a single pipeline run.
//!
//! ```text
//!              admission gate
//!                    |
//! generator --> input queue --> worker x N --> result queue --> collector
//!     ^                            ^                                ^
//!     +------------- shutdown (CancellationToken) ------------------+
//! ```
//!
//! Queue ownership:
//!
//! - input queue: closed by the generator, which owns the only sender.
//! - result queue: closed by a dedicated closer task that waits for every
//!   worker to exit and then drops the last sender.
//!
//! The orchestrator itself never shuts anything down beyond triggering the
//! cancellation token; each component is responsible for returning its
//! permits and dropping its queue handles.

use crate::{
    AdmissionGate, Error, Event, ItemResult, NoopObserver, Observer, PipelineConfig, Processor,
    Result, SimulatedWork, WorkerReport,
    collector::collect,
    generator::generate_batches,
    pool::spawn_workers,
};
use core::time::Duration;
use std::{sync::Arc, time::Instant};
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;

/// Final counts for a completed (or cancelled) run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionSummary {
    /// Items the generator enqueued.
    pub submitted: u64,
    /// Results delivered without an error.
    pub processed: u64,
    /// Results delivered with an error.
    pub errored: u64,
    /// Whether the run was cut short by cancellation.
    pub cancelled: bool,
    /// Wall-clock time from start until the collector finished.
    pub elapsed: Duration,
    /// One report per worker that exited normally, in exit order.
    pub workers: Vec<WorkerReport>,
}

/// A clonable handle for cancelling a pipeline from the outside.
///
/// Cancelling is idempotent: calling [`cancel`](Self::cancel) any number of
/// times has the same effect as calling it once, and it never un-signals.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the pipeline has been cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

/// A single-use fan-out/fan-in pipeline.
///
/// `P` performs the per-item work and `O` observes the run. Both default to
/// the simulated workload and a no-op observer.
pub struct Pipeline<P = SimulatedWork, O = NoopObserver> {
    config: PipelineConfig,
    gate: AdmissionGate,
    shutdown: CancellationToken,
    processor: Arc<P>,
    observer: Arc<O>,
}

impl Pipeline {
    /// Creates a pipeline running [`SimulatedWork`] derived from `config`.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_shutdown(config, CancellationToken::new())
    }

    /// Like [`new`](Self::new), but cancelled through an externally owned
    /// token. Cancelling `shutdown` or any [`ShutdownHandle`] of this pipeline
    /// has the same effect.
    pub fn with_shutdown(config: PipelineConfig, shutdown: CancellationToken) -> Self {
        Self {
            gate: AdmissionGate::new(config.admission_capacity()),
            shutdown,
            processor: Arc::new(SimulatedWork::from_config(&config)),
            observer: Arc::new(NoopObserver),
            config,
        }
    }
}

impl<P: Processor, O: Observer> Pipeline<P, O> {
    /// Replaces the per-item work.
    pub fn with_processor<Q: Processor>(self, processor: Q) -> Pipeline<Q, O> {
        Pipeline {
            config: self.config,
            gate: self.gate,
            shutdown: self.shutdown,
            processor: Arc::new(processor),
            observer: self.observer,
        }
    }

    /// Replaces the event observer.
    pub fn with_observer<R: Observer>(self, observer: R) -> Pipeline<P, R> {
        Pipeline {
            config: self.config,
            gate: self.gate,
            shutdown: self.shutdown,
            processor: self.processor,
            observer: Arc::new(observer),
        }
    }

    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The gate bounding in-flight items. Clone it to inspect a run from
    /// outside.
    pub const fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.shutdown.clone(),
        }
    }

    /// Runs the pipeline to completion.
    ///
    /// Returns once the collector has drained the result queue, which happens
    /// after the schedule is exhausted and all items are processed, or after
    /// cancellation has unwound every component.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskFailed`] if the generator or a worker panicked.
    /// Item failures are not errors; they are counted in
    /// [`CompletionSummary::errored`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip_all, fields(workers = self.config.workers()))
    )]
    pub async fn run(self) -> Result<CompletionSummary> {
        let start = Instant::now();
        let Self {
            config,
            gate,
            shutdown,
            processor,
            observer,
        } = self;

        #[cfg(feature = "tracing")]
        tracing::info!(
            "starting pipeline: {} workers, capacity {}, {:?}",
            config.workers(),
            config.admission_capacity(),
            config.schedule()
        );

        let (input_tx, input_rx) = mpsc::channel(config.input_buffer());
        let (result_tx, result_rx) = mpsc::channel(config.result_buffer());

        // Fan-out.
        let workers = spawn_workers(
            config.workers(),
            input_rx,
            &result_tx,
            &processor,
            config.item_timeout(),
            &shutdown,
        );

        // Fan-in closer: the only place the result queue is closed.
        let closer = tokio::spawn(close_after_workers(workers, result_tx));

        let generator = tokio::spawn(generate_batches(
            config,
            gate,
            input_tx,
            shutdown.clone(),
            Arc::clone(&observer),
        ));

        let tally = collect(result_rx, observer.as_ref()).await;

        let report = generator
            .await
            .map_err(|e| Error::task_failed("generator", &e))?;
        let workers = closer
            .await
            .map_err(|e| Error::task_failed("closer", &e))??;

        let summary = CompletionSummary {
            submitted: report.submitted,
            processed: tally.processed,
            errored: tally.errored,
            cancelled: report.cancelled || shutdown.is_cancelled(),
            elapsed: start.elapsed(),
            workers,
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            "pipeline finished: submitted={} processed={} errored={} cancelled={} in {:?}",
            summary.submitted,
            summary.processed,
            summary.errored,
            summary.cancelled,
            summary.elapsed
        );
        observer.on_event(&Event::Completed(&summary));

        Ok(summary)
    }
}

/// Waits for every worker to exit, then drops the last result sender so the
/// collector observes the queue as closed.
async fn close_after_workers(
    mut workers: JoinSet<WorkerReport>,
    results: mpsc::Sender<ItemResult>,
) -> Result<Vec<WorkerReport>> {
    let mut reports = Vec::with_capacity(workers.len());
    let mut failure = None;

    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(report) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    "Worker {} exited after {} items",
                    report.worker_id,
                    report.handled
                );
                reports.push(report);
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("worker task failed: {e}");
                failure.get_or_insert_with(|| Error::task_failed("worker", &e));
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("all workers exited, closing result queue");
    drop(results);

    failure.map_or(Ok(reports), Err)
}

/// Runs a pipeline with [`SimulatedWork`] under an externally owned
/// cancellation token.
///
/// # Errors
///
/// See [`Pipeline::run`].
pub async fn start(
    config: PipelineConfig,
    shutdown: CancellationToken,
) -> Result<CompletionSummary> {
    Pipeline::with_shutdown(config, shutdown).run().await
}
