#![forbid(unsafe_code)]
//! stagec-exec: stage compilation driver and task bodies.
//!
//! `StageCompiler` runs decomposition, shuffle analysis, codec derivation and
//! flow ordering, stopping at the first phase that leaves errors behind.
//! The resulting `CompiledStage` hands out map, combine and reduce tasks with
//! a setup / run / cleanup lifecycle, and `LocalExchange` drives them over
//! in-memory records.

pub mod compiler;
pub mod error;
pub mod exchange;
pub mod explain;
pub mod metrics;
pub mod runtime;
pub mod tasks;

pub use compiler::{CompiledStage, StageCompiler};
pub use error::{ExecError, Result};
pub use exchange::{ExchangeOutput, LocalExchange};
pub use metrics::ExchangeStats;
pub use runtime::{ShuffleBuffer, ShuffleEntry, SinkBuffer, TaskContext};
pub use tasks::{CombineTask, MapTask, ReduceTask};
