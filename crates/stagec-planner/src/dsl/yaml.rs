//! YAML -> `StageBlock` parser.
//!
//! Example:
//! ```yaml
//! stage: 1
//! shapes:
//!   - name: sale
//!     fields:
//!       - { name: store, type: Int32 }
//!       - { name: amount, type: Int64, nullable: true }
//! blocks:
//!   - id: 1
//!     side: map
//!     elements:
//!       - { name: read, op: identity, inputs: [{name: in, shape: sale}], outputs: [{name: out, shape: sale}] }
//!     inputs:
//!       - { port: read.in, sources: [{block: 100, index: 0}] }
//!     outputs:
//!       - { port: read.out }
//!   - id: 2
//!     side: reduce
//!     elements:
//!       - name: total
//!         op: fold
//!         params: { sum: [amount] }
//!         inputs: [{ name: in, shape: sale, key: { group: [store] } }]
//!         outputs: [{ name: out, shape: sale }]
//!     inputs:
//!       - { port: total.in }
//!     outputs:
//!       - { port: total.out, targets: [{block: 200, index: 0}] }
//! connections:
//!   - { from: {block: 1, index: 0}, to: {block: 2, index: 0} }
//! inputs:
//!   - { block: 1, index: 0, rows: [[1, 10], [1, 5], [2, 7]] }
//! ```
//!
//! Ports are written `element.port`. Element ids are assigned in document
//! order starting at 1.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stagec_core::block::{BlockPortRef, BlockSide, FlowBlock, StageBlock};
use stagec_core::config::CompilerConfig;
use stagec_core::flow::{
    FlowElement, FlowGraph, InputPortRef, OperatorDesc, OutputPortRef, PortDecl, ResourceDesc,
};
use stagec_core::id::{BlockId, NodeId};
use stagec_core::schema::{DataType, Field, Schema, ShapeCatalog, ShapeRegistry};
use stagec_core::types::Record;

#[derive(Debug, Error)]
pub enum DslError {
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid stage document: {0}")]
    Invalid(String),

    #[error(transparent)]
    Core(#[from] stagec_core::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDoc {
    #[serde(default = "default_stage")]
    pub stage: u32,
    #[serde(default)]
    pub config: Option<StageConfig>,
    #[serde(default)]
    pub shapes: Vec<ShapeDef>,
    pub blocks: Vec<BlockDef>,
    #[serde(default)]
    pub connections: Vec<ConnectionDef>,
    #[serde(default)]
    pub inputs: Vec<InputRowsDef>,
}

fn default_stage() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDef {
    pub id: u64,
    pub side: BlockSide,
    pub elements: Vec<ElementDef>,
    #[serde(default)]
    pub wires: Vec<WireDef>,
    #[serde(default)]
    pub inputs: Vec<BlockInputDef>,
    #[serde(default)]
    pub outputs: Vec<BlockOutputDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDef {
    pub name: String,
    pub op: String,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub resources: Vec<ResourceDesc>,
    #[serde(default)]
    pub inputs: Vec<PortDecl>,
    #[serde(default)]
    pub outputs: Vec<PortDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDef {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInputDef {
    pub port: String,
    #[serde(default)]
    pub sources: Vec<BlockPortRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockOutputDef {
    pub port: String,
    #[serde(default)]
    pub targets: Vec<BlockPortRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDef {
    pub from: BlockPortRef,
    pub to: BlockPortRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRowsDef {
    pub block: u64,
    pub index: u32,
    pub rows: Vec<serde_json::Value>,
}

/// Per-document overrides of `CompilerConfig`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub partitions: Option<u32>,
    pub combine: Option<bool>,
    pub verify_comparators: Option<bool>,
    pub name_prefix: Option<String>,
}

impl StageConfig {
    pub fn apply(&self, config: &mut CompilerConfig) {
        if let Some(v) = self.partitions {
            config.partitions = v;
        }
        if let Some(v) = self.combine {
            config.combine = v;
        }
        if let Some(v) = self.verify_comparators {
            config.verify_comparators = v;
        }
        if let Some(v) = &self.name_prefix {
            config.name_prefix = v.clone();
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedStage {
    pub stage: StageBlock,
    pub shapes: ShapeCatalog,
    pub config: StageConfig,
    /// Inline records per block input, already typed by the input's shape.
    pub inputs: BTreeMap<BlockPortRef, Vec<Record>>,
}

pub fn parse_yaml_stage(yaml_src: &str) -> Result<ParsedStage, DslError> {
    let doc: StageDoc = serde_yaml::from_str(yaml_src)?;

    let mut shapes = ShapeCatalog::new();
    for shape in &doc.shapes {
        let fields = shape
            .fields
            .iter()
            .map(|f| {
                let dt = DataType::parse(&f.data_type).ok_or_else(|| {
                    DslError::Invalid(format!(
                        "shape '{}': unknown type '{}' for '{}'",
                        shape.name, f.data_type, f.name
                    ))
                })?;
                Ok(Field::new(f.name.clone(), dt, f.nullable))
            })
            .collect::<Result<Vec<_>, DslError>>()?;
        if shapes.insert(shape.name.clone(), Schema::new(fields)).is_some() {
            return Err(DslError::Invalid(format!("duplicate shape '{}'", shape.name)));
        }
    }

    let mut stage = StageBlock::new(doc.stage);
    let mut next_node = 1u64;
    for def in &doc.blocks {
        let block = build_block(def, &mut next_node)?;
        match block.side {
            BlockSide::Map => stage.map_blocks.push(block),
            BlockSide::Reduce => stage.reduce_blocks.push(block),
        }
    }
    for conn in &doc.connections {
        stage.connect(conn.from, conn.to)?;
    }
    stage.validate()?;

    let mut inputs = BTreeMap::new();
    for def in &doc.inputs {
        let port = BlockPortRef::new(BlockId::new(def.block), def.index);
        let schema = input_schema(&stage, &shapes, port)?;
        let rows = def
            .rows
            .iter()
            .map(|row| Record::from_json_row(row, schema))
            .collect::<Result<Vec<_>, _>>()?;
        inputs.entry(port).or_insert_with(Vec::new).extend(rows);
    }

    Ok(ParsedStage {
        stage,
        shapes,
        config: doc.config.unwrap_or_default(),
        inputs,
    })
}

fn build_block(def: &BlockDef, next_node: &mut u64) -> Result<FlowBlock, DslError> {
    let mut graph = FlowGraph::new();
    let mut by_name: BTreeMap<&str, NodeId> = BTreeMap::new();
    for e in &def.elements {
        let id = NodeId::new(*next_node);
        *next_node += 1;
        if by_name.insert(e.name.as_str(), id).is_some() {
            return Err(DslError::Invalid(format!(
                "block {}: duplicate element '{}'",
                def.id, e.name
            )));
        }
        graph.add(FlowElement {
            id,
            name: e.name.clone(),
            desc: OperatorDesc {
                key: e.op.clone(),
                params: e.params.clone(),
                resources: e.resources.clone(),
            },
            inputs: e.inputs.clone(),
            outputs: e.outputs.clone(),
        })?;
    }

    for wire in &def.wires {
        let from = output_port(&graph, &by_name, &wire.from)?;
        let to = input_port(&graph, &by_name, &wire.to)?;
        graph.connect(from, to)?;
    }

    let mut block = FlowBlock::new(BlockId::new(def.id), def.side, graph);
    for input in &def.inputs {
        let port = input_port(&block.graph, &by_name, &input.port)?;
        block.add_input(port);
        if let Some(last) = block.inputs.last_mut() {
            last.sources = input.sources.clone();
        }
    }
    for output in &def.outputs {
        let port = output_port(&block.graph, &by_name, &output.port)?;
        block.add_output(port);
        if let Some(last) = block.outputs.last_mut() {
            last.targets = output.targets.clone();
        }
    }
    Ok(block)
}

fn split_port(text: &str) -> Result<(&str, &str), DslError> {
    text.rsplit_once('.')
        .ok_or_else(|| DslError::Invalid(format!("port '{}' is not 'element.port'", text)))
}

fn input_port(
    graph: &FlowGraph,
    by_name: &BTreeMap<&str, NodeId>,
    text: &str,
) -> Result<InputPortRef, DslError> {
    let (element, port) = split_port(text)?;
    let element = by_name
        .get(element)
        .and_then(|id| graph.element(*id))
        .ok_or_else(|| DslError::Invalid(format!("unknown element in '{}'", text)))?;
    let index = element
        .inputs
        .iter()
        .position(|p| p.name == port)
        .ok_or_else(|| DslError::Invalid(format!("unknown input port '{}'", text)))?;
    Ok(element.input_port(index as u32))
}

fn output_port(
    graph: &FlowGraph,
    by_name: &BTreeMap<&str, NodeId>,
    text: &str,
) -> Result<OutputPortRef, DslError> {
    let (element, port) = split_port(text)?;
    let element = by_name
        .get(element)
        .and_then(|id| graph.element(*id))
        .ok_or_else(|| DslError::Invalid(format!("unknown element in '{}'", text)))?;
    let index = element
        .outputs
        .iter()
        .position(|p| p.name == port)
        .ok_or_else(|| DslError::Invalid(format!("unknown output port '{}'", text)))?;
    Ok(element.output_port(index as u32))
}

fn input_schema<'s>(
    stage: &StageBlock,
    shapes: &'s ShapeCatalog,
    port: BlockPortRef,
) -> Result<&'s Schema, DslError> {
    let input = stage
        .input(port)
        .ok_or_else(|| DslError::Invalid(format!("rows for unknown block input {}", port)))?;
    let shape = stage
        .block(port.block)
        .and_then(|b| b.graph.element(input.port.node))
        .and_then(|e| e.inputs.get(input.port.index as usize))
        .map(|p| p.shape.as_str())
        .ok_or_else(|| DslError::Invalid(format!("block input {} has no port", port)))?;
    shapes
        .shape(shape)
        .ok_or_else(|| DslError::Invalid(format!("unknown shape '{}'", shape)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
stage: 3
config: { partitions: 2 }
shapes:
  - name: kv
    fields:
      - { name: k, type: Int32 }
      - { name: v, type: Utf8, nullable: true }
blocks:
  - id: 1
    side: map
    elements:
      - { name: a, op: identity, inputs: [{name: in, shape: kv}], outputs: [{name: out, shape: kv}] }
      - { name: b, op: identity, inputs: [{name: in, shape: kv}], outputs: [{name: out, shape: kv}] }
    wires:
      - { from: a.out, to: b.in }
    inputs:
      - { port: a.in }
    outputs:
      - { port: b.out, targets: [{block: 9, index: 0}] }
inputs:
  - { block: 1, index: 0, rows: [[1, "x"], [2, null]] }
"#;

    #[test]
    fn parses_blocks_wires_and_rows() {
        let parsed = parse_yaml_stage(DOC).unwrap();
        assert_eq!(parsed.stage.number, 3);
        assert_eq!(parsed.config.partitions, Some(2));
        let block = &parsed.stage.map_blocks[0];
        assert_eq!(block.graph.len(), 2);
        assert_eq!(block.graph.wires().len(), 1);
        let rows = &parsed.inputs[&BlockPortRef::new(BlockId::new(1), 0)];
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn unknown_port_is_reported() {
        let bad = DOC.replace("to: b.in", "to: b.nope");
        match parse_yaml_stage(&bad) {
            Err(DslError::Invalid(msg)) => assert!(msg.contains("b.nope")),
            other => panic!("unexpected {:?}", other.map(|p| p.stage.number)),
        }
    }
}
