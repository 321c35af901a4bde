//! Flow nodes, edge targets and fan-out plans.

use std::fmt;
use std::sync::Arc;

use stagec_core::flow::OutputPortRef;
use stagec_core::id::{FragmentId, PortId};
use stagec_planner::fragment::Fragment;

/// Identity of a node in a fragment flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKey {
    Fragment(FragmentId),
    /// Shuffle write for one segment.
    Shuffle(PortId),
    /// Index into the stage model's sinks.
    Output(usize),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Fragment(id) => write!(f, "{}", id),
            NodeKey::Shuffle(port) => write!(f, "shuffle {}", port),
            NodeKey::Output(sink) => write!(f, "output #{}", sink),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FlowNode {
    Line(Arc<Fragment>),
    Rendezvous(Arc<Fragment>),
    Shuffle(PortId),
    Output(usize),
}

impl FlowNode {
    pub fn key(&self) -> NodeKey {
        match self {
            FlowNode::Line(f) | FlowNode::Rendezvous(f) => NodeKey::Fragment(f.id()),
            FlowNode::Shuffle(port) => NodeKey::Shuffle(*port),
            FlowNode::Output(sink) => NodeKey::Output(*sink),
        }
    }

    pub fn fragment(&self) -> Option<&Arc<Fragment>> {
        match self {
            FlowNode::Line(f) | FlowNode::Rendezvous(f) => Some(f),
            _ => None,
        }
    }

    /// Name hint for generated identifiers.
    pub fn hint(&self) -> &'static str {
        match self {
            FlowNode::Line(_) => "line",
            FlowNode::Rendezvous(_) => "rendezvous",
            FlowNode::Shuffle(_) => "shuffle",
            FlowNode::Output(_) => "output",
        }
    }
}

/// One consumer of an output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Target {
    pub node: NodeKey,
    /// Input port of the consumer; 0 for shuffle and output nodes.
    pub input: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOutKind {
    Discard,
    Direct,
    Broadcast,
}

/// Consumers of one fragment output port, in target order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOut {
    pub port: OutputPortRef,
    pub targets: Vec<Target>,
}

impl FanOut {
    pub fn kind(&self) -> FanOutKind {
        match self.targets.len() {
            0 => FanOutKind::Discard,
            1 => FanOutKind::Direct,
            _ => FanOutKind::Broadcast,
        }
    }
}
