//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is only obtainable through [`PipelineConfig::default`]
//! or [`PipelineConfigBuilder::build`], both of which yield a valid value. The
//! builder rejects mutually exclusive options up front so the pipeline never
//! has to second-guess its configuration.

use crate::ConfigError;
use core::time::Duration;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCHES: u64 = 10;
pub const DEFAULT_BATCH_PERIOD: Duration = Duration::from_millis(200);
pub const DEFAULT_ADMISSION_CAPACITY: usize = 200;
pub const DEFAULT_MIN_LATENCY: Duration = Duration::from_millis(10);
pub const DEFAULT_MAX_LATENCY: Duration = Duration::from_millis(59);
pub const DEFAULT_INPUT_BUFFER: usize = 1;
pub const DEFAULT_RESULT_BUFFER: usize = 128;

/// How long the generator keeps producing batches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// Stop after this many batches.
    Batches(u64),
    /// Keep producing until the run is cancelled.
    UntilCancelled,
}

impl Schedule {
    /// Returns `true` once `completed` batches satisfy the schedule.
    pub const fn is_complete(self, completed: u64) -> bool {
        match self {
            Self::Batches(total) => completed >= total,
            Self::UntilCancelled => false,
        }
    }
}

/// A validated pipeline configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    workers: usize,
    batch_size: usize,
    batch_period: Duration,
    schedule: Schedule,
    admission_capacity: usize,
    min_latency: Duration,
    max_latency: Duration,
    failure_rate: f64,
    item_timeout: Option<Duration>,
    input_buffer: usize,
    result_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_period: DEFAULT_BATCH_PERIOD,
            schedule: Schedule::Batches(DEFAULT_BATCHES),
            admission_capacity: DEFAULT_ADMISSION_CAPACITY,
            min_latency: DEFAULT_MIN_LATENCY,
            max_latency: DEFAULT_MAX_LATENCY,
            failure_rate: 0.0,
            item_timeout: None,
            input_buffer: DEFAULT_INPUT_BUFFER,
            result_buffer: DEFAULT_RESULT_BUFFER,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Number of concurrent worker tasks.
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Items emitted per batch.
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Delay between the start of consecutive batches.
    pub const fn batch_period(&self) -> Duration {
        self.batch_period
    }

    pub const fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Maximum number of items in flight between generation and completion.
    pub const fn admission_capacity(&self) -> usize {
        self.admission_capacity
    }

    /// Inclusive bounds of the simulated per-item latency.
    pub const fn latency(&self) -> (Duration, Duration) {
        (self.min_latency, self.max_latency)
    }

    /// Probability in `[0, 1]` that a simulated item fails.
    pub const fn failure_rate(&self) -> f64 {
        self.failure_rate
    }

    pub const fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout
    }

    /// Capacity of the generator -> worker queue.
    pub const fn input_buffer(&self) -> usize {
        self.input_buffer
    }

    /// Capacity of the worker -> collector queue.
    pub const fn result_buffer(&self) -> usize {
        self.result_buffer
    }
}

/// Fluent builder for [`PipelineConfig`].
///
/// Unset options fall back to the `DEFAULT_*` constants. Two pairs of options
/// are mutually exclusive:
///
/// - [`batches`](Self::batches) and [`until_cancelled`](Self::until_cancelled)
/// - [`latency`](Self::latency) and [`fixed_latency`](Self::fixed_latency)
///
/// Setting both halves of a pair makes [`build`](Self::build) fail with
/// [`ConfigError::Conflict`].
#[derive(Clone, Debug, Default)]
pub struct PipelineConfigBuilder {
    workers: Option<usize>,
    batch_size: Option<usize>,
    batch_period: Option<Duration>,
    batches: Option<u64>,
    until_cancelled: bool,
    admission_capacity: Option<usize>,
    latency: Option<(Duration, Duration)>,
    fixed_latency: Option<Duration>,
    failure_rate: Option<f64>,
    item_timeout: Option<Duration>,
    input_buffer: Option<usize>,
    result_buffer: Option<usize>,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    #[must_use]
    pub const fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    #[must_use]
    pub const fn batch_period(mut self, period: Duration) -> Self {
        self.batch_period = Some(period);
        self
    }

    /// Produce exactly `batches` batches, then close the input queue.
    #[must_use]
    pub const fn batches(mut self, batches: u64) -> Self {
        self.batches = Some(batches);
        self
    }

    /// Produce batches until the run is cancelled.
    #[must_use]
    pub const fn until_cancelled(mut self) -> Self {
        self.until_cancelled = true;
        self
    }

    #[must_use]
    pub const fn admission_capacity(mut self, capacity: usize) -> Self {
        self.admission_capacity = Some(capacity);
        self
    }

    /// Simulated latency drawn uniformly from `min..=max` for each item.
    #[must_use]
    pub const fn latency(mut self, min: Duration, max: Duration) -> Self {
        self.latency = Some((min, max));
        self
    }

    /// Simulated latency of exactly `latency` for each item.
    #[must_use]
    pub const fn fixed_latency(mut self, latency: Duration) -> Self {
        self.fixed_latency = Some(latency);
        self
    }

    #[must_use]
    pub const fn failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = Some(rate);
        self
    }

    /// Fail any item whose processing takes longer than `timeout`.
    #[must_use]
    pub const fn item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn input_buffer(mut self, size: usize) -> Self {
        self.input_buffer = Some(size);
        self
    }

    #[must_use]
    pub const fn result_buffer(mut self, size: usize) -> Self {
        self.result_buffer = Some(size);
        self
    }

    /// Validates the options and produces a [`PipelineConfig`].
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Conflict`] if mutually exclusive options are both set.
    /// - [`ConfigError::Invalid`] if a value is out of range.
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let schedule = match (self.batches, self.until_cancelled) {
            (Some(_), true) => {
                return Err(ConfigError::Conflict {
                    first: "batches",
                    second: "until_cancelled",
                });
            }
            (Some(batches), false) => Schedule::Batches(batches),
            (None, true) => Schedule::UntilCancelled,
            (None, false) => Schedule::Batches(DEFAULT_BATCHES),
        };

        let (min_latency, max_latency) = match (self.latency, self.fixed_latency) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Conflict {
                    first: "latency",
                    second: "fixed_latency",
                });
            }
            (Some(range), None) => range,
            (None, Some(fixed)) => (fixed, fixed),
            (None, None) => (DEFAULT_MIN_LATENCY, DEFAULT_MAX_LATENCY),
        };

        let config = PipelineConfig {
            workers: self.workers.unwrap_or(DEFAULT_WORKERS),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            batch_period: self.batch_period.unwrap_or(DEFAULT_BATCH_PERIOD),
            schedule,
            admission_capacity: self
                .admission_capacity
                .unwrap_or(DEFAULT_ADMISSION_CAPACITY),
            min_latency,
            max_latency,
            failure_rate: self.failure_rate.unwrap_or(0.0),
            item_timeout: self.item_timeout,
            input_buffer: self.input_buffer.unwrap_or(DEFAULT_INPUT_BUFFER),
            result_buffer: self.result_buffer.unwrap_or(DEFAULT_RESULT_BUFFER),
        };
        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &PipelineConfig) -> Result<(), ConfigError> {
    let nonzero = [
        ("workers", config.workers),
        ("batch_size", config.batch_size),
        ("admission_capacity", config.admission_capacity),
        ("input_buffer", config.input_buffer),
        ("result_buffer", config.result_buffer),
    ];
    for (field, value) in nonzero {
        if value == 0 {
            return Err(invalid(field, "must be greater than 0"));
        }
    }

    if config.admission_capacity > tokio::sync::Semaphore::MAX_PERMITS {
        return Err(invalid(
            "admission_capacity",
            format!("must not exceed {}", tokio::sync::Semaphore::MAX_PERMITS),
        ));
    }
    if config.batch_period.is_zero() {
        return Err(invalid("batch_period", "must be greater than 0"));
    }
    if config.min_latency > config.max_latency {
        return Err(invalid(
            "latency",
            format!(
                "minimum {:?} exceeds maximum {:?}",
                config.min_latency, config.max_latency
            ),
        ));
    }
    // Also rejects NaN.
    if !(0.0..=1.0).contains(&config.failure_rate) {
        return Err(invalid("failure_rate", "must be within [0, 1]"));
    }
    if config.item_timeout.is_some_and(|t| t.is_zero()) {
        return Err(invalid("item_timeout", "must be greater than 0"));
    }
    Ok(())
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
