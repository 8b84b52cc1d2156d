//! Observable pipeline events.
//!
//! Every component reports its progress through an [`Observer`]. The library
//! itself only logs (behind the `tracing` feature); anything else, such as
//! metrics or test assertions, hooks in here.

use crate::{CompletionSummary, GeneratorReport, ItemError};

/// Something observable happened during a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event<'a> {
    /// The generator is about to emit batch `batch`.
    BatchStarted { batch: u64 },
    /// The generator enqueued `submitted` items for batch `batch`.
    BatchDone { batch: u64, submitted: usize },
    /// The collector received a successful result.
    ItemSucceeded { id: u64, outcome: &'a str },
    /// The collector received a failed result.
    ItemFailed { id: u64, error: &'a ItemError },
    /// The generator returned and closed the input queue.
    GeneratorStopped(&'a GeneratorReport),
    /// The collector drained the result queue.
    Completed(&'a CompletionSummary),
}

/// Receives [`Event`]s from all pipeline components.
///
/// Implementations are called concurrently from the generator and collector
/// tasks and must not block.
pub trait Observer: Send + Sync + 'static {
    fn on_event(&self, event: &Event<'_>);
}

/// An [`Observer`] that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_event(&self, _event: &Event<'_>) {}
}
