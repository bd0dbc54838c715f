//! Conversion settings and batch execution.

mod config;
mod runner;

pub use config::{PrepConfig, DEFAULT_BATCH_SIZE};
pub use runner::{run_convert, worker_pool, Converter, SampleOutput, ORDERED_LABELS};
