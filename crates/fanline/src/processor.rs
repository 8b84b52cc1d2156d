use crate::{ItemError, PipelineConfig, WorkItem};
use core::time::Duration;
use rand::Rng;

/// The per-item work performed by each worker.
///
/// This allows the pool to be generic over what "processing" means. The
/// returned future must be `Send` so workers can run on any runtime thread.
pub trait Processor: Send + Sync + 'static {
    /// Processes `item` on worker `worker_id`, returning a human readable
    /// outcome or the reason the item failed.
    fn process(
        &self,
        worker_id: usize,
        item: WorkItem,
    ) -> impl Future<Output = Result<String, ItemError>> + Send;
}

/// A [`Processor`] that simulates variable-cost work by sleeping.
///
/// Each item sleeps for a duration drawn uniformly from `min..=max` and then
/// fails with probability `failure_rate`.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedWork {
    min: Duration,
    max: Duration,
    failure_rate: f64,
}

impl SimulatedWork {
    /// # Panics
    ///
    /// Panics if `min > max`.
    pub fn new(min: Duration, max: Duration) -> Self {
        assert!(min <= max, "minimum latency {min:?} exceeds maximum {max:?}");
        Self {
            min,
            max,
            failure_rate: 0.0,
        }
    }

    /// # Panics
    ///
    /// Panics if `rate` is not within `[0, 1]`.
    #[must_use]
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        assert!((0.0..=1.0).contains(&rate), "failure rate must be within [0, 1]");
        self.failure_rate = rate;
        self
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let (min, max) = config.latency();
        Self {
            min,
            max,
            failure_rate: config.failure_rate(),
        }
    }

    fn draw(&self) -> (Duration, bool) {
        let mut rng = rand::rng();
        let delay = rng.random_range(self.min..=self.max);
        let fail = self.failure_rate > 0.0 && rng.random_bool(self.failure_rate);
        (delay, fail)
    }
}

impl Processor for SimulatedWork {
    async fn process(&self, worker_id: usize, item: WorkItem) -> Result<String, ItemError> {
        // The thread-local rng is not `Send`, so draw before the first await.
        let (delay, fail) = self.draw();
        tokio::time::sleep(delay).await;

        if fail {
            return Err(ItemError::Failed {
                reason: format!("simulated failure on worker {worker_id}"),
            });
        }
        Ok(format!("worker {worker_id} processed {}", item.id))
    }
}
