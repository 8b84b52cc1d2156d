//! Command-line and environment configuration.
//!
//! Every flag can also be supplied through a `FANLINE_*` environment variable
//! (a `.env` file is loaded at startup). Arguments are converted into a
//! validated [`PipelineConfig`] through the library's builder, so conflicting
//! options are rejected before the pipeline starts.

use clap::Parser;
use core::time::Duration;
use fanline::{
    ConfigError, DEFAULT_ADMISSION_CAPACITY, DEFAULT_BATCH_PERIOD, DEFAULT_BATCH_SIZE,
    DEFAULT_INPUT_BUFFER, DEFAULT_MAX_LATENCY, DEFAULT_MIN_LATENCY, DEFAULT_RESULT_BUFFER,
    DEFAULT_WORKERS, PipelineConfig,
};

const DEFAULT_BATCH_PERIOD_MS: u64 = DEFAULT_BATCH_PERIOD.as_millis() as u64;

#[derive(Parser, Debug, Clone)]
#[command(name = "fanline")]
#[command(about = "Run a bounded, cancelable fan-out/fan-in pipeline")]
#[command(version)]
pub struct CliArgs {
    /// Number of concurrent workers
    #[arg(long, env = "FANLINE_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Items emitted per batch
    #[arg(long, env = "FANLINE_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Milliseconds between the start of consecutive batches
    #[arg(long, env = "FANLINE_BATCH_PERIOD_MS", default_value_t = DEFAULT_BATCH_PERIOD_MS)]
    pub batch_period_ms: u64,

    /// Number of batches to emit [default: 10]
    #[arg(long, env = "FANLINE_BATCHES")]
    pub batches: Option<u64>,

    /// Keep emitting batches until interrupted (conflicts with --batches)
    #[arg(long, env = "FANLINE_UNTIL_CANCELLED")]
    pub until_cancelled: bool,

    /// Maximum number of items in flight at once
    #[arg(long, env = "FANLINE_CAPACITY", default_value_t = DEFAULT_ADMISSION_CAPACITY)]
    pub capacity: usize,

    /// Lower bound of the simulated per-item latency in milliseconds
    #[arg(long, env = "FANLINE_MIN_LATENCY_MS")]
    pub min_latency_ms: Option<u64>,

    /// Upper bound of the simulated per-item latency in milliseconds
    #[arg(long, env = "FANLINE_MAX_LATENCY_MS")]
    pub max_latency_ms: Option<u64>,

    /// Fixed simulated per-item latency in milliseconds (conflicts with the
    /// min/max bounds)
    #[arg(long, env = "FANLINE_LATENCY_MS")]
    pub latency_ms: Option<u64>,

    /// Probability in [0, 1] that a simulated item fails
    #[arg(long, env = "FANLINE_FAILURE_RATE", default_value_t = 0.0)]
    pub failure_rate: f64,

    /// Fail items that take longer than this many milliseconds
    #[arg(long, env = "FANLINE_ITEM_TIMEOUT_MS")]
    pub item_timeout_ms: Option<u64>,

    /// Capacity of the generator -> worker queue
    #[arg(long, env = "FANLINE_INPUT_BUFFER", default_value_t = DEFAULT_INPUT_BUFFER)]
    pub input_buffer: usize,

    /// Capacity of the worker -> collector queue
    #[arg(long, env = "FANLINE_RESULT_BUFFER", default_value_t = DEFAULT_RESULT_BUFFER)]
    pub result_buffer: usize,
}

impl TryFrom<CliArgs> for PipelineConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let mut builder = Self::builder()
            .workers(args.workers)
            .batch_size(args.batch_size)
            .batch_period(Duration::from_millis(args.batch_period_ms))
            .admission_capacity(args.capacity)
            .failure_rate(args.failure_rate)
            .input_buffer(args.input_buffer)
            .result_buffer(args.result_buffer);

        if let Some(batches) = args.batches {
            builder = builder.batches(batches);
        }
        if args.until_cancelled {
            builder = builder.until_cancelled();
        }

        // Only forward a range when a bound was given explicitly, so that a
        // lone `--latency-ms` is not reported as conflicting with defaults.
        if args.min_latency_ms.is_some() || args.max_latency_ms.is_some() {
            let min = args
                .min_latency_ms
                .map_or(DEFAULT_MIN_LATENCY, Duration::from_millis);
            let max = args
                .max_latency_ms
                .map_or(DEFAULT_MAX_LATENCY, Duration::from_millis);
            builder = builder.latency(min, max);
        }
        if let Some(fixed) = args.latency_ms {
            builder = builder.fixed_latency(Duration::from_millis(fixed));
        }

        if let Some(timeout) = args.item_timeout_ms {
            builder = builder.item_timeout(Duration::from_millis(timeout));
        }

        builder.build()
    }
}
