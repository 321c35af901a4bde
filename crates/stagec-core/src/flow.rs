//! Operator graphs as delivered by the upstream planner.
//!
//! A `FlowGraph` is a set of `FlowElement`s connected by wires from output
//! ports to input ports. Graphs are acyclic within a block and every wire
//! joins two ports of the same shape.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::NodeId;

/// Sort direction of an ordering property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub property: String,
    #[serde(default = "default_direction")]
    pub direction: Direction,
}

fn default_direction() -> Direction {
    Direction::Asc
}

/// Grouping and ordering requested for one shuffle input port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleKeySpec {
    #[serde(default)]
    pub group: Vec<String>,
    #[serde(default)]
    pub order: Vec<SortKey>,
}

/// Externally described side resource (lookup tables, constants, ...).
///
/// Two descriptions are the same resource iff they are structurally equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceDesc {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// What an element does. `key` selects the processor in the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorDesc {
    pub key: String,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub resources: Vec<ResourceDesc>,
}

impl OperatorDesc {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn with_resource(mut self, resource: ResourceDesc) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(|v| v.as_str())
    }

    pub fn param_bool(&self, name: &str) -> Option<bool> {
        self.params.get(name).and_then(|v| v.as_bool())
    }

    pub fn param_strings(&self, name: &str) -> Option<Vec<String>> {
        self.params.get(name).and_then(|v| match v {
            serde_json::Value::String(s) => Some(vec![s.clone()]),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|i| i.as_str().map(str::to_string))
                .collect(),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDecl {
    pub name: String,
    /// Record shape name, resolved through a `ShapeRegistry`.
    pub shape: String,
    #[serde(default)]
    pub key: Option<ShuffleKeySpec>,
}

impl PortDecl {
    pub fn new(name: impl Into<String>, shape: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: shape.into(),
            key: None,
        }
    }

    pub fn keyed(mut self, key: ShuffleKeySpec) -> Self {
        self.key = Some(key);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowElement {
    pub id: NodeId,
    pub name: String,
    pub desc: OperatorDesc,
    pub inputs: Vec<PortDecl>,
    pub outputs: Vec<PortDecl>,
}

impl FlowElement {
    pub fn input_port(&self, index: u32) -> InputPortRef {
        InputPortRef::new(self.id, index)
    }

    pub fn output_port(&self, index: u32) -> OutputPortRef {
        OutputPortRef::new(self.id, index)
    }

    pub fn input_ports(&self) -> Vec<InputPortRef> {
        (0..self.inputs.len() as u32)
            .map(|i| self.input_port(i))
            .collect()
    }

    pub fn output_ports(&self) -> Vec<OutputPortRef> {
        (0..self.outputs.len() as u32)
            .map(|i| self.output_port(i))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InputPortRef {
    pub node: NodeId,
    pub index: u32,
}

impl InputPortRef {
    pub const fn new(node: NodeId, index: u32) -> Self {
        Self { node, index }
    }
}

impl fmt::Display for InputPortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<-in{}", self.node.get(), self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputPortRef {
    pub node: NodeId,
    pub index: u32,
}

impl OutputPortRef {
    pub const fn new(node: NodeId, index: u32) -> Self {
        Self { node, index }
    }
}

impl fmt::Display for OutputPortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->out{}", self.node.get(), self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Wire {
    pub from: OutputPortRef,
    pub to: InputPortRef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    elements: BTreeMap<NodeId, Arc<FlowElement>>,
    wires: Vec<Wire>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, element: FlowElement) -> Result<NodeId> {
        let id = element.id;
        if self.elements.contains_key(&id) {
            return Err(Error::Plan(format!("duplicate element {}", id)));
        }
        self.elements.insert(id, Arc::new(element));
        Ok(id)
    }

    /// Wire `from` to `to`. Both ends must exist and carry the same shape.
    pub fn connect(&mut self, from: OutputPortRef, to: InputPortRef) -> Result<()> {
        let src = self
            .element(from.node)
            .and_then(|e| e.outputs.get(from.index as usize))
            .ok_or_else(|| Error::Plan(format!("no output port {}", from)))?;
        let dst = self
            .element(to.node)
            .and_then(|e| e.inputs.get(to.index as usize))
            .ok_or_else(|| Error::Plan(format!("no input port {}", to)))?;
        if src.shape != dst.shape {
            return Err(Error::Schema(format!(
                "wire {} -> {} joins shape '{}' to '{}'",
                from, to, src.shape, dst.shape
            )));
        }
        let wire = Wire { from, to };
        if !self.wires.contains(&wire) {
            self.wires.push(wire);
        }
        Ok(())
    }

    pub fn element(&self, id: NodeId) -> Option<&Arc<FlowElement>> {
        self.elements.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.elements.contains_key(&id)
    }

    /// Elements in id order.
    pub fn elements(&self) -> impl Iterator<Item = &Arc<FlowElement>> {
        self.elements.values()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    /// Input ports fed by `port`.
    pub fn downstream_of(&self, port: OutputPortRef) -> Vec<InputPortRef> {
        self.wires
            .iter()
            .filter(|w| w.from == port)
            .map(|w| w.to)
            .collect()
    }

    /// Output ports feeding `port`.
    pub fn upstream_of(&self, port: InputPortRef) -> Vec<OutputPortRef> {
        self.wires
            .iter()
            .filter(|w| w.to == port)
            .map(|w| w.from)
            .collect()
    }

    pub fn predecessors(&self, id: NodeId) -> BTreeSet<NodeId> {
        self.wires
            .iter()
            .filter(|w| w.to.node == id)
            .map(|w| w.from.node)
            .collect()
    }

    pub fn successors(&self, id: NodeId) -> BTreeSet<NodeId> {
        self.wires
            .iter()
            .filter(|w| w.from.node == id)
            .map(|w| w.to.node)
            .collect()
    }
}
