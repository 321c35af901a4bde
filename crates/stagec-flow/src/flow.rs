//! Fragment flow of one task side.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use stagec_core::block::{BlockPortRef, StageBlock};
use stagec_core::flow::{InputPortRef, OutputPortRef};
use stagec_core::graph::Graph;
use stagec_core::id::{FragmentId, NodeId};
use stagec_planner::fragment::Fragment;
use stagec_planner::model::StageModel;
use stagec_planner::names::NameGenerator;
use stagec_shuffle::model::ShuffleModel;

use crate::error::{FlowError, Result};
use crate::node::{FanOut, FlowNode, NodeKey, Target};
use crate::resources::{collect_slots, ResourceSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowSide {
    Map,
    Combine,
    Reduce,
}

/// Where outside records enter a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// A block input feeding a line fragment.
    Input(BlockPortRef),
    /// Shuffle groups of a rendezvous element.
    Rendezvous(NodeId),
}

#[derive(Debug, Clone)]
pub struct FragmentFlow {
    side: FlowSide,
    nodes: BTreeMap<NodeKey, FlowNode>,
    names: BTreeMap<NodeKey, String>,
    /// Producer -> consumer.
    graph: Graph<NodeKey>,
    order: Vec<NodeKey>,
    fan_outs: BTreeMap<FragmentId, Vec<FanOut>>,
    entries: Vec<(Entry, FragmentId)>,
    resources: Vec<ResourceSlot>,
    resource_uses: BTreeMap<FragmentId, Vec<usize>>,
}

impl FragmentFlow {
    /// Map side: every map unit, entered through its block inputs.
    pub fn map(
        model: &StageModel,
        shuffle: &ShuffleModel,
        names: &mut NameGenerator,
    ) -> Result<Self> {
        let mut entries = Vec::new();
        for unit in model.map_units() {
            for input in unit.inputs() {
                let node = entry_node(model.stage(), *input)?;
                let head = unit
                    .fragments()
                    .iter()
                    .find(|f| f.first().element().id == node)
                    .ok_or_else(|| {
                        FlowError::Invariant(format!("block input {} has no head fragment", input))
                    })?;
                entries.push((Entry::Input(*input), head.id()));
            }
        }
        let fragments = distinct(model.map_units().iter().flat_map(|u| u.fragments()));
        build(FlowSide::Map, model, shuffle, fragments, entries, names)
    }

    /// Reduce side: every reduce unit, entered through its rendezvous head.
    pub fn reduce(
        model: &StageModel,
        shuffle: &ShuffleModel,
        names: &mut NameGenerator,
    ) -> Result<Self> {
        let entries = rendezvous_entries(model, |_| true)?;
        let fragments = distinct(model.reduce_units().iter().flat_map(|u| u.fragments()));
        build(FlowSide::Reduce, model, shuffle, fragments, entries, names)
    }

    /// Combine side: the rendezvous heads of `combinable` elements only, each
    /// output `i` writing back into the segment of input `i`.
    pub fn combine(
        model: &StageModel,
        shuffle: &ShuffleModel,
        combinable: &BTreeSet<NodeId>,
        names: &mut NameGenerator,
    ) -> Result<Self> {
        let entries = rendezvous_entries(model, |n| combinable.contains(&n))?;
        let fragments = distinct(
            model
                .reduce_units()
                .iter()
                .filter_map(|u| u.head())
                .filter(|f| combinable.contains(&f.first().element().id)),
        );
        build(FlowSide::Combine, model, shuffle, fragments, entries, names)
    }

    pub fn side(&self) -> FlowSide {
        self.side
    }

    pub fn node(&self, key: NodeKey) -> Option<&FlowNode> {
        self.nodes.get(&key)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.nodes.values()
    }

    pub fn name(&self, key: NodeKey) -> Option<&str> {
        self.names.get(&key).map(String::as_str)
    }

    pub fn graph(&self) -> &Graph<NodeKey> {
        &self.graph
    }

    /// Consumers first: building in this order lets every node hold its
    /// already-built downstream nodes.
    pub fn construction_order(&self) -> &[NodeKey] {
        &self.order
    }

    /// Fan-out plan of each output port of `fragment`, in port order.
    pub fn fan_outs(&self, fragment: FragmentId) -> &[FanOut] {
        self.fan_outs
            .get(&fragment)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn entries(&self) -> &[(Entry, FragmentId)] {
        &self.entries
    }

    pub fn entry(&self, entry: Entry) -> Option<FragmentId> {
        self.entries
            .iter()
            .find(|(e, _)| *e == entry)
            .map(|(_, id)| *id)
    }

    pub fn resources(&self) -> &[ResourceSlot] {
        &self.resources
    }

    /// Slot indices used by `fragment`, in its declaration order.
    pub fn resource_uses(&self, fragment: FragmentId) -> &[usize] {
        self.resource_uses
            .get(&fragment)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn entry_node(stage: &StageBlock, input: BlockPortRef) -> Result<NodeId> {
    stage
        .input(input)
        .map(|i| i.port.node)
        .ok_or_else(|| FlowError::Invariant(format!("unknown block input {}", input)))
}

fn rendezvous_entries(
    model: &StageModel,
    keep: impl Fn(NodeId) -> bool,
) -> Result<Vec<(Entry, FragmentId)>> {
    let mut entries = Vec::new();
    for unit in model.reduce_units() {
        let head = unit
            .head()
            .ok_or_else(|| FlowError::Invariant("reduce unit without fragments".into()))?;
        let element = head.first().element().id;
        if keep(element) {
            entries.push((Entry::Rendezvous(element), head.id()));
        }
    }
    Ok(entries)
}

fn distinct<'a>(fragments: impl Iterator<Item = &'a Arc<Fragment>>) -> Vec<Arc<Fragment>> {
    let mut seen = BTreeSet::new();
    fragments.filter(|f| seen.insert(f.id())).cloned().collect()
}

fn build(
    side: FlowSide,
    model: &StageModel,
    shuffle: &ShuffleModel,
    fragments: Vec<Arc<Fragment>>,
    entries: Vec<(Entry, FragmentId)>,
    names: &mut NameGenerator,
) -> Result<FragmentFlow> {
    let by_start: BTreeMap<NodeId, &Arc<Fragment>> = fragments
        .iter()
        .map(|f| (f.first().element().id, f))
        .collect();

    let mut nodes = BTreeMap::new();
    let mut graph = Graph::new();
    let mut fan_outs = BTreeMap::new();
    for fragment in &fragments {
        let node = if fragment.is_rendezvous() {
            FlowNode::Rendezvous(Arc::clone(fragment))
        } else {
            FlowNode::Line(Arc::clone(fragment))
        };
        let key = node.key();
        nodes.insert(key, node);
        graph.add_node(key);

        let mut plans = Vec::new();
        for port in fragment.output_ports() {
            let targets = consumers(side, model, shuffle, &by_start, fragment, port)?;
            for target in &targets {
                graph.add_edge(key, target.node);
                match target.node {
                    NodeKey::Shuffle(p) => {
                        nodes.entry(target.node).or_insert(FlowNode::Shuffle(p));
                    }
                    NodeKey::Output(s) => {
                        nodes.entry(target.node).or_insert(FlowNode::Output(s));
                    }
                    NodeKey::Fragment(_) => {}
                }
            }
            plans.push(FanOut { port, targets });
        }
        fan_outs.insert(fragment.id(), plans);
    }

    let order = graph.sort_post_order();
    let mut node_names = BTreeMap::new();
    for key in &order {
        if let Some(node) = nodes.get(key) {
            node_names.insert(*key, names.create(node.hint()));
        }
    }
    let (resources, resource_uses) = collect_slots(fragments.iter().map(|f| f.as_ref()), names);

    #[cfg(feature = "tracing")]
    tracing::debug!(
        side = ?side,
        nodes = nodes.len(),
        resources = resources.len(),
        "fragment flow built"
    );

    Ok(FragmentFlow {
        side,
        nodes,
        names: node_names,
        graph,
        order,
        fan_outs,
        entries,
        resources,
        resource_uses,
    })
}

/// Consumers of `port`, deduplicated in discovery order.
fn consumers(
    side: FlowSide,
    model: &StageModel,
    shuffle: &ShuffleModel,
    by_start: &BTreeMap<NodeId, &Arc<Fragment>>,
    fragment: &Fragment,
    port: OutputPortRef,
) -> Result<Vec<Target>> {
    let mut targets: Vec<Target> = Vec::new();
    let mut push = |t: Target| {
        if !targets.contains(&t) {
            targets.push(t);
        }
    };

    if side == FlowSide::Combine {
        let input = InputPortRef::new(port.node, port.index);
        if let Some(segment) = shuffle.segment_at(input) {
            push(Target {
                node: NodeKey::Shuffle(segment.port_id),
                input: 0,
            });
        }
        return Ok(targets);
    }

    let stage = model.stage();
    let block = stage.block(fragment.block()).ok_or_else(|| {
        FlowError::Invariant(format!("fragment {} names unknown block", fragment.id()))
    })?;
    for opposite in block.graph.downstream_of(port) {
        let consumer = by_start.get(&opposite.node).ok_or_else(|| {
            FlowError::Invariant(format!("{} feeds {} outside this flow", port, opposite))
        })?;
        push(Target {
            node: NodeKey::Fragment(consumer.id()),
            input: opposite.index,
        });
    }
    for (i, output) in block.outputs.iter().enumerate() {
        if output.port != port {
            continue;
        }
        if side == FlowSide::Map {
            for target in &output.targets {
                if !stage.is_reduce_input(*target) {
                    continue;
                }
                let segment = stage
                    .input(*target)
                    .and_then(|input| shuffle.segment_at(input.port));
                if let Some(segment) = segment {
                    push(Target {
                        node: NodeKey::Shuffle(segment.port_id),
                        input: 0,
                    });
                }
            }
        }
        let reference = block.output_ref(i);
        if let Some(sink) = model
            .sinks()
            .iter()
            .position(|s| s.outputs.contains(&reference))
        {
            push(Target {
                node: NodeKey::Output(sink),
                input: 0,
            });
        }
    }
    Ok(targets)
}
