//! Error types for the pipeline.
//!
//! Errors fall into three groups, matching where they can surface:
//!
//! - [`ConfigError`]: raised by [`PipelineConfigBuilder::build`] before any run
//!   starts. A pipeline never sees an invalid configuration.
//! - [`ItemError`]: a per-item failure carried inside an [`ItemResult`]. It is
//!   reported by the collector and never stops the pool.
//! - [`Error`]: failures of the pipeline itself, such as a spawned task
//!   panicking.
//!
//! Cancellation is not an error. A cancelled run still returns a
//! [`CompletionSummary`] with `cancelled` set.
//!
//! [`PipelineConfigBuilder::build`]: crate::PipelineConfigBuilder::build
//! [`ItemResult`]: crate::ItemResult
//! [`CompletionSummary`]: crate::CompletionSummary

use core::time::Duration;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// A configuration value was rejected by the builder.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Two mutually exclusive options were both set.
    #[error("cannot set `{first}` and `{second}` simultaneously")]
    Conflict {
        first: &'static str,
        second: &'static str,
    },

    /// A single option is out of range.
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Why a single work item failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    /// The processor reported a failure.
    #[error("processing failed: {reason}")]
    Failed { reason: String },

    /// The processor did not finish within the configured item timeout.
    #[error("processing timed out after {after:?}")]
    TimedOut { after: Duration },
}

/// Unified error type for a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration could not be built.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A spawned pipeline task panicked or was aborted.
    #[error("{task} task failed: {reason}")]
    TaskFailed { task: &'static str, reason: String },
}

impl Error {
    pub(crate) fn task_failed(task: &'static str, err: &tokio::task::JoinError) -> Self {
        Self::TaskFailed {
            task,
            reason: err.to_string(),
        }
    }
}
