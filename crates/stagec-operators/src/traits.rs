//! Processor trait + runtime operator interfaces.
//!
//! The compiler consults a `Processor` twice: during analysis (`kind`,
//! `is_partial`, `shuffle_key`) and during emission, where it builds the
//! runtime operator matching its kind. Runtime operators never allocate per
//! record unless they produce a new record shape.

use std::fmt;

use stagec_core::flow::{FlowElement, OperatorDesc, ShuffleKeySpec};
use stagec_core::schema::{Schema, ShapeRegistry};
use stagec_core::types::Record;

use crate::collector::Downstream;
use crate::resource::ResourceHandle;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpError {
    #[error("build error: {0}")]
    Build(String),

    #[error("execution error: {0}")]
    Exec(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("processor '{processor}' cannot build a {kind} operator")]
    Unsupported {
        processor: &'static str,
        kind: ProcessorKind,
    },

    #[error(transparent)]
    Core(#[from] stagec_core::Error),
}

/// How an operator participates in fragment decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ProcessorKind {
    /// One input, one output, chained inline.
    LinePart,
    /// One input, terminal: ends the fragment and routes to its outputs.
    LineEnd,
    /// Merge point after the exchange; always alone in its fragment.
    Rendezvous,
    /// No-op placeholder; behaves as a pass-through line part.
    Pseudo,
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessorKind::LinePart => "line-part",
            ProcessorKind::LineEnd => "line-end",
            ProcessorKind::Rendezvous => "rendezvous",
            ProcessorKind::Pseudo => "pseudo",
        };
        f.write_str(s)
    }
}

/// Everything a processor may look at while building its runtime operator.
pub struct BuildContext<'a> {
    pub element: &'a FlowElement,
    pub shapes: &'a dyn ShapeRegistry,
    /// Set-up handles for the element's declared resources, in declaration order.
    pub resources: &'a [ResourceHandle],
}

impl<'a> BuildContext<'a> {
    pub fn input_schema(&self, index: usize) -> Result<&'a Schema, OpError> {
        let port = self.element.inputs.get(index).ok_or_else(|| {
            OpError::Build(format!("{} has no input port {}", self.element.name, index))
        })?;
        self.shapes
            .shape(&port.shape)
            .ok_or_else(|| OpError::Schema(format!("unknown shape '{}'", port.shape)))
    }

    pub fn output_schema(&self, index: usize) -> Result<&'a Schema, OpError> {
        let port = self.element.outputs.get(index).ok_or_else(|| {
            OpError::Build(format!("{} has no output port {}", self.element.name, index))
        })?;
        self.shapes
            .shape(&port.shape)
            .ok_or_else(|| OpError::Schema(format!("unknown shape '{}'", port.shape)))
    }

    pub fn desc(&self) -> &'a OperatorDesc {
        &self.element.desc
    }

    /// Required string parameter.
    pub fn param(&self, name: &str) -> Result<&'a str, OpError> {
        self.element.desc.param_str(name).ok_or_else(|| {
            OpError::Build(format!(
                "{} ({}) requires string parameter '{}'",
                self.element.name, self.element.desc.key, name
            ))
        })
    }

    pub fn resource(&self, name: &str) -> Result<ResourceHandle, OpError> {
        self.resources
            .iter()
            .find(|r| r.borrow().desc().name == name)
            .cloned()
            .ok_or_else(|| {
                OpError::Build(format!("{} has no resource '{}'", self.element.name, name))
            })
    }
}

/// Trait that every registered operator handler implements.
pub trait Processor: Send + Sync + 'static {
    /// Human-readable processor name (stable).
    fn name(&self) -> &'static str;

    fn kind(&self) -> ProcessorKind;

    /// True if the operator is algebraically decomposable for `desc`, so a
    /// partial application before the exchange does not change the result.
    fn is_partial(&self, _desc: &OperatorDesc) -> bool {
        false
    }

    /// Key layout requested for input `port`. Defaults to the port's declaration.
    fn shuffle_key(&self, element: &FlowElement, port: u32) -> Option<ShuffleKeySpec> {
        element
            .inputs
            .get(port as usize)
            .and_then(|p| p.key.clone())
    }

    fn line_part(&self, _ctx: &BuildContext<'_>) -> Result<Box<dyn LinePart>, OpError> {
        Err(OpError::Unsupported {
            processor: self.name(),
            kind: ProcessorKind::LinePart,
        })
    }

    fn line_end(&self, _ctx: &BuildContext<'_>) -> Result<Box<dyn LineEnd>, OpError> {
        Err(OpError::Unsupported {
            processor: self.name(),
            kind: ProcessorKind::LineEnd,
        })
    }

    fn rendezvous(&self, _ctx: &BuildContext<'_>) -> Result<Box<dyn Rendezvous>, OpError> {
        Err(OpError::Unsupported {
            processor: self.name(),
            kind: ProcessorKind::Rendezvous,
        })
    }
}

/// Inline step of a line fragment.
///
/// Returns either `input` (updated in place) or a record owned by the step.
pub trait LinePart {
    fn apply<'a>(&'a mut self, input: &'a mut Record) -> Result<&'a mut Record, OpError>;
}

/// Terminal step of a line fragment.
pub trait LineEnd {
    fn process(&mut self, input: &mut Record, outputs: &mut [Downstream]) -> Result<(), OpError>;
}

/// Merge logic run once per key group: `begin`, `process` per value, `end`.
pub trait Rendezvous {
    fn begin(&mut self) -> Result<(), OpError>;

    /// `port` is the element input the value arrived on.
    fn process(&mut self, port: u32, input: &mut Record) -> Result<(), OpError>;

    fn end(&mut self, outputs: &mut [Downstream]) -> Result<(), OpError>;
}
