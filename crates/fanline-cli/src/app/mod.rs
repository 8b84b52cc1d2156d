//! Process-level wiring around the pipeline library.
//!
//! ## Structure
//!
//! - [`config`] - CLI/env arguments and their conversion into a
//!   [`PipelineConfig`](fanline::PipelineConfig).
//! - [`observer`] - bridges pipeline events to metrics.
//! - [`telemetry`] - logging and optional OpenTelemetry metrics.

pub mod config;
pub mod observer;
pub mod telemetry;
