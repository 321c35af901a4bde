#![forbid(unsafe_code)]
//! stagec-operators: the processor registry and the runtime operator surface.
//!
//! Design intent:
//! - A `Processor` classifies an operator (`ProcessorKind`) for decomposition,
//!   answers shuffle-key and combinability questions for the shuffle compiler,
//!   and builds the per-record runtime operator for task emission.
//! - Runtime operators are synchronous and single-threaded; records move by
//!   `&mut Record` through `Collector`s, and `Downstream` implements the
//!   discard / direct / broadcast fan-out.

pub mod collector;
pub mod registry;
pub mod resource;
pub mod traits;

pub mod branch;
pub mod cogroup;
pub mod fold;
pub mod lookup;
pub mod map;
pub mod pass;

pub use collector::{Collector, CollectorRef, Downstream};
pub use registry::{empty_processor, ProcessorRegistry, Registry};
pub use resource::{ResourceHandle, SideTable};
pub use traits::{BuildContext, LineEnd, LinePart, OpError, Processor, ProcessorKind, Rendezvous};
