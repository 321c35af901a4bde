#![forbid(unsafe_code)]
//! stagec-flow: what a task builds, and in which order.
//!
//! Responsibilities:
//! - Build the producer -> consumer graph over a task side's fragments, plus
//!   synthetic shuffle-write and sink-output nodes.
//! - Order construction so every node is built after all of its consumers.
//! - Resolve each fragment output port into a fan-out plan.
//! - Collect entry points and deduplicated resource slots.
//!
//! No runtime objects here; the exec crate turns a `FragmentFlow` into one.

pub mod error;
pub mod flow;
pub mod node;
pub mod resources;
pub mod verify;

pub use error::{FlowError, Result};
pub use flow::{Entry, FlowSide, FragmentFlow};
pub use node::{FanOut, FanOutKind, FlowNode, NodeKey, Target};
pub use resources::ResourceSlot;
pub use verify::check_construction_order;
