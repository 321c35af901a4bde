//! Convenient re-exports for downstream crates.

pub use crate::block::{BlockInput, BlockOutput, BlockPortRef, BlockSide, FlowBlock, StageBlock};
pub use crate::config::CompilerConfig;
pub use crate::diag::{DiagScope, Diagnostic, Diagnostics, Severity};
pub use crate::error::{Error, Result};
pub use crate::flow::{
    Direction, FlowElement, FlowGraph, InputPortRef, OperatorDesc, OutputPortRef, PortDecl,
    ResourceDesc, ShuffleKeySpec, SortKey,
};
pub use crate::graph::Graph;
pub use crate::id::{BlockId, ElementId, FragmentId, NodeId, PortId};
pub use crate::manifest::{CompileManifest, ManifestId};
pub use crate::schema::{DataType, Field, Schema, ShapeCatalog, ShapeRegistry};
pub use crate::types::{Record, Scalar};
