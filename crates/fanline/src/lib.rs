#![doc = include_str!("../README.md")]

mod collector;
mod config;
mod error;
mod event;
mod gate;
mod generator;
mod item;
mod pipeline;
mod pool;
mod processor;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::event::*;
pub use crate::gate::*;
pub use crate::generator::GeneratorReport;
pub use crate::item::{ItemResult, WorkItem};
pub use crate::pipeline::*;
pub use crate::pool::WorkerReport;
pub use crate::processor::*;
// Public re-export so callers can share a token without depending on
// `tokio-util` directly.
pub use tokio_util::sync::CancellationToken;
