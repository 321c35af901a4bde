//! Flow blocks and stage blocks: the planner's pre-partitioned stage input.
//!
//! A stage has one or more map-side blocks and zero or more reduce-side
//! blocks. Map outputs that target reduce inputs of the same stage travel
//! through the shuffle; everything else leaves the stage.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::flow::{FlowGraph, InputPortRef, OutputPortRef};
use crate::id::{BlockId, NodeId};

/// One end of a block-to-block connection: the `index`-th input or output of `block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPortRef {
    pub block: BlockId,
    pub index: u32,
}

impl BlockPortRef {
    pub const fn new(block: BlockId, index: u32) -> Self {
        Self { block, index }
    }
}

impl fmt::Display for BlockPortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.block.get(), self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInput {
    /// Element port inside the block that receives the records.
    pub port: InputPortRef,
    /// Upstream block outputs feeding this input.
    #[serde(default)]
    pub sources: Vec<BlockPortRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockOutput {
    pub port: OutputPortRef,
    /// Downstream block inputs fed by this output.
    #[serde(default)]
    pub targets: Vec<BlockPortRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockSide {
    Map,
    Reduce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowBlock {
    pub id: BlockId,
    pub side: BlockSide,
    pub graph: FlowGraph,
    pub inputs: Vec<BlockInput>,
    pub outputs: Vec<BlockOutput>,
}

impl FlowBlock {
    pub fn new(id: BlockId, side: BlockSide, graph: FlowGraph) -> Self {
        Self {
            id,
            side,
            graph,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Declare a block input; returns its connection handle.
    pub fn add_input(&mut self, port: InputPortRef) -> BlockPortRef {
        self.inputs.push(BlockInput {
            port,
            sources: Vec::new(),
        });
        BlockPortRef::new(self.id, (self.inputs.len() - 1) as u32)
    }

    /// Declare a block output; returns its connection handle.
    pub fn add_output(&mut self, port: OutputPortRef) -> BlockPortRef {
        self.outputs.push(BlockOutput {
            port,
            targets: Vec::new(),
        });
        BlockPortRef::new(self.id, (self.outputs.len() - 1) as u32)
    }

    pub fn input(&self, index: u32) -> Option<&BlockInput> {
        self.inputs.get(index as usize)
    }

    pub fn output(&self, index: u32) -> Option<&BlockOutput> {
        self.outputs.get(index as usize)
    }

    pub fn input_ref(&self, index: usize) -> BlockPortRef {
        BlockPortRef::new(self.id, index as u32)
    }

    pub fn output_ref(&self, index: usize) -> BlockPortRef {
        BlockPortRef::new(self.id, index as u32)
    }

    /// True if `node` owns one of this block's outputs.
    pub fn owns_output(&self, node: NodeId) -> bool {
        self.outputs.iter().any(|o| o.port.node == node)
    }

    /// Structural checks the planner is trusted to satisfy.
    pub fn validate(&self) -> Result<()> {
        for input in &self.inputs {
            let ok = self
                .graph
                .element(input.port.node)
                .map(|e| (input.port.index as usize) < e.inputs.len())
                .unwrap_or(false);
            if !ok {
                return Err(Error::Plan(format!(
                    "block {} input {} does not name an element port",
                    self.id, input.port
                )));
            }
        }
        for output in &self.outputs {
            let ok = self
                .graph
                .element(output.port.node)
                .map(|e| (output.port.index as usize) < e.outputs.len())
                .unwrap_or(false);
            if !ok {
                return Err(Error::Plan(format!(
                    "block {} output {} does not name an element port",
                    self.id, output.port
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageBlock {
    pub number: u32,
    pub map_blocks: Vec<FlowBlock>,
    pub reduce_blocks: Vec<FlowBlock>,
}

impl StageBlock {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            map_blocks: Vec::new(),
            reduce_blocks: Vec::new(),
        }
    }

    pub fn has_reduce_blocks(&self) -> bool {
        !self.reduce_blocks.is_empty()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &FlowBlock> {
        self.map_blocks.iter().chain(self.reduce_blocks.iter())
    }

    pub fn block(&self, id: BlockId) -> Option<&FlowBlock> {
        self.blocks().find(|b| b.id == id)
    }

    fn block_mut(&mut self, id: BlockId) -> Option<&mut FlowBlock> {
        self.map_blocks
            .iter_mut()
            .chain(self.reduce_blocks.iter_mut())
            .find(|b| b.id == id)
    }

    pub fn input(&self, port: BlockPortRef) -> Option<&BlockInput> {
        self.block(port.block).and_then(|b| b.input(port.index))
    }

    pub fn output(&self, port: BlockPortRef) -> Option<&BlockOutput> {
        self.block(port.block).and_then(|b| b.output(port.index))
    }

    /// True if `port` names an input of one of this stage's reduce blocks.
    pub fn is_reduce_input(&self, port: BlockPortRef) -> bool {
        self.reduce_blocks
            .iter()
            .any(|b| b.id == port.block && (port.index as usize) < b.inputs.len())
    }

    /// Record a connection on both ends. Either end may lie outside the stage.
    pub fn connect(&mut self, upstream: BlockPortRef, downstream: BlockPortRef) -> Result<()> {
        let mut touched = false;
        if let Some(block) = self.block_mut(upstream.block) {
            let out = block
                .outputs
                .get_mut(upstream.index as usize)
                .ok_or_else(|| Error::Plan(format!("no block output {}", upstream)))?;
            if !out.targets.contains(&downstream) {
                out.targets.push(downstream);
            }
            touched = true;
        }
        if let Some(block) = self.block_mut(downstream.block) {
            let input = block
                .inputs
                .get_mut(downstream.index as usize)
                .ok_or_else(|| Error::Plan(format!("no block input {}", downstream)))?;
            if !input.sources.contains(&upstream) {
                input.sources.push(upstream);
            }
            touched = true;
        }
        if !touched {
            return Err(Error::Plan(format!(
                "connection {} -> {} touches no block of stage {}",
                upstream, downstream, self.number
            )));
        }
        Ok(())
    }

    /// Checks every block and the uniqueness of element ids across the stage.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        let mut block_ids = BTreeSet::new();
        for block in self.blocks() {
            if !block_ids.insert(block.id) {
                return Err(Error::Plan(format!("duplicate block {}", block.id)));
            }
            block.validate()?;
            for element in block.graph.elements() {
                if !seen.insert(element.id) {
                    return Err(Error::Plan(format!(
                        "element {} appears in more than one block",
                        element.id
                    )));
                }
            }
        }
        for block in &self.map_blocks {
            if block.side != BlockSide::Map {
                return Err(Error::Plan(format!("block {} is not map-side", block.id)));
            }
        }
        for block in &self.reduce_blocks {
            if block.side != BlockSide::Reduce {
                return Err(Error::Plan(format!("block {} is not reduce-side", block.id)));
            }
        }
        Ok(())
    }
}
