//! Admission control for in-flight work.
//!
//! The [`AdmissionGate`] bounds how many work items may exist between
//! generation and completion at any instant. It is independent of channel
//! buffer sizes: an item holds its [`AdmissionPermit`] while it waits in the
//! input queue, while a worker processes it, and until the worker has handed
//! its result to the collector.
//!
//! Permits are released on drop, so every exit path returns its slot,
//! including cancellation between acquisition and enqueue.

use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// A fixed-capacity pool of admission permits.
///
/// Cloning the gate is cheap and yields a handle to the same pool.
#[derive(Clone, Debug)]
pub struct AdmissionGate {
    inner: Arc<GateInner>,
}

#[derive(Debug)]
struct GateInner {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    outstanding: AtomicUsize,
    peak: AtomicUsize,
}

impl AdmissionGate {
    /// Creates a gate with `capacity` permits.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`Semaphore::MAX_PERMITS`].
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(GateInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                outstanding: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of permits currently acquired and not yet released.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Highest number of permits ever outstanding at once.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::Acquire)
    }

    /// Waits for a free permit or for `shutdown` to fire, whichever comes
    /// first.
    ///
    /// Returns `None` if the wait was cut short by cancellation. Cancellation
    /// is checked first, so an already-cancelled token never hands out a
    /// permit.
    pub async fn acquire(&self, shutdown: &CancellationToken) -> Option<AdmissionPermit> {
        let permit = tokio::select! {
            biased;
            () = shutdown.cancelled() => return None,
            permit = Arc::clone(&self.inner.semaphore).acquire_owned() => permit.ok()?,
        };

        let now = self.inner.outstanding.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.peak.fetch_max(now, Ordering::AcqRel);

        Some(AdmissionPermit {
            gate: Arc::clone(&self.inner),
            _permit: permit,
        })
    }
}

/// One admission slot. The slot returns to its gate when this is dropped.
#[derive(Debug)]
#[must_use = "dropping a permit immediately releases its admission slot"]
pub struct AdmissionPermit {
    gate: Arc<GateInner>,
    // Declared last so the gauge is decremented before the semaphore slot is
    // handed to the next waiter.
    _permit: OwnedSemaphorePermit,
}

impl AdmissionPermit {
    /// Returns the slot to the gate. Equivalent to dropping the permit.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.gate.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}
