//! Fragment decomposition and unit assembly for one stage.
//!
//! Per block:
//! 1. resolve every element's processor (a missing one is reported once and
//!    replaced by the empty placeholder)
//! 2. pick the fragment starts and grow a fragment from each
//! 3. link fragments producer -> consumer through the block's wires
//!
//! Then map units come from block inputs, reduce units from the rendezvous
//! elements behind reduce inputs, and sinks from the observed block outputs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use stagec_core::block::{BlockPortRef, FlowBlock, StageBlock};
use stagec_core::diag::DiagScope;
use stagec_core::error::Error;
use stagec_core::flow::FlowGraph;
use stagec_core::graph::Graph;
use stagec_core::id::{FragmentId, NodeId};
use stagec_operators::registry::empty_processor;
use stagec_operators::traits::ProcessorKind;

use crate::env::CompileEnv;
use crate::error::{PlanError, Result};
use crate::fragment::{Factor, Fragment};
use crate::model::{Sink, StageModel, Unit, UnitKind};
use crate::names::NameGenerator;

const PHASE: &str = "decompose";

/// Fragments of one block, keyed by their start element.
#[derive(Debug, Clone, Default)]
pub struct BlockFragments {
    /// Elements whose processor was missing.
    pub missing: BTreeSet<NodeId>,
    pub starts: BTreeSet<NodeId>,
    pub by_start: BTreeMap<NodeId, Arc<Fragment>>,
    /// Producer -> consumer.
    pub graph: Graph<FragmentId>,
}

impl BlockFragments {
    pub fn fragment(&self, id: FragmentId) -> Option<&Arc<Fragment>> {
        self.by_start.values().find(|f| f.id() == id)
    }

    /// The fragment covering `node`, if any.
    pub fn covering(&self, node: NodeId) -> Option<&Arc<Fragment>> {
        self.by_start.values().find(|f| f.contains(node))
    }

    pub fn len(&self) -> usize {
        self.by_start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_start.is_empty()
    }
}

pub struct StageAnalyzer<'e> {
    env: &'e CompileEnv,
    diag: DiagScope<'e>,
    next_fragment: u64,
}

impl<'e> StageAnalyzer<'e> {
    pub fn new(env: &'e CompileEnv) -> Self {
        Self {
            env,
            diag: env.diagnostics.scope(),
            next_fragment: 1,
        }
    }

    /// Decompose every block of `stage` and assemble the stage model.
    ///
    /// Returns `PlanError::Diagnosed` if this pass reported errors.
    pub fn analyze(
        &mut self,
        stage: Arc<StageBlock>,
        names: &mut NameGenerator,
    ) -> Result<StageModel> {
        stage.validate()?;
        let before = self.diag.error_count();

        let mut map_units = Vec::new();
        for block in &stage.map_blocks {
            let fragments = self.decompose(block)?;
            map_units.extend(self.map_units(block, &fragments)?);
        }
        let map_units = compose(map_units, |unit| upstream_of(&stage, unit));

        let mut reduce_units = Vec::new();
        for block in &stage.reduce_blocks {
            let fragments = self.decompose(block)?;
            reduce_units.extend(self.reduce_units(block, &fragments)?);
        }

        let sink_units = if stage.has_reduce_blocks() {
            &reduce_units
        } else {
            &map_units
        };
        let sinks = collect_sinks(&stage, sink_units, names);

        let errors = self.diag.error_count() - before;
        if errors > 0 {
            return Err(PlanError::Diagnosed {
                phase: PHASE,
                errors,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            stage = stage.number,
            map_units = map_units.len(),
            reduce_units = reduce_units.len(),
            sinks = sinks.len(),
            "stage decomposed"
        );

        Ok(StageModel::new(stage, map_units, reduce_units, sinks)?)
    }

    /// Split one block into fragments and link them.
    pub fn decompose(&mut self, block: &FlowBlock) -> Result<BlockFragments> {
        let (factors, missing) = self.resolve_factors(&block.graph);
        let starts: BTreeSet<NodeId> = block
            .graph
            .elements()
            .map(|e| e.id)
            .filter(|id| is_start(block, &factors, *id))
            .collect();

        let mut by_start = BTreeMap::new();
        for start in &starts {
            let fragment = self.grow(block, &factors, &starts, &missing, *start)?;
            by_start.insert(*start, Arc::new(fragment));
        }

        let mut graph = Graph::new();
        for fragment in by_start.values() {
            graph.add_node(fragment.id());
            for port in fragment.output_ports() {
                for opposite in block.graph.downstream_of(port) {
                    let consumer = by_start.get(&opposite.node).ok_or_else(|| {
                        Error::Invariant(format!(
                            "{} feeds {} which does not start a fragment",
                            port, opposite
                        ))
                    })?;
                    graph.add_edge(fragment.id(), consumer.id());
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(block = %block.id, fragments = by_start.len(), "block decomposed");

        Ok(BlockFragments {
            missing,
            starts,
            by_start,
            graph,
        })
    }

    fn resolve_factors(
        &self,
        graph: &FlowGraph,
    ) -> (BTreeMap<NodeId, Factor>, BTreeSet<NodeId>) {
        let mut factors = BTreeMap::new();
        let mut missing = BTreeSet::new();
        for element in graph.elements() {
            let processor = match self.env.processors.find(&element.desc) {
                Some(p) => p,
                None => {
                    self.diag.error(
                        PHASE,
                        format!(
                            "no processor registered for '{}' (element {})",
                            element.desc.key, element.name
                        ),
                    );
                    missing.insert(element.id);
                    empty_processor()
                }
            };
            factors.insert(element.id, Factor::new(Arc::clone(element), processor));
        }
        (factors, missing)
    }

    fn grow(
        &mut self,
        block: &FlowBlock,
        factors: &BTreeMap<NodeId, Factor>,
        starts: &BTreeSet<NodeId>,
        missing: &BTreeSet<NodeId>,
        start: NodeId,
    ) -> Result<Fragment> {
        let mut chain = Vec::new();
        let mut resources = Vec::new();
        let mut current = start;
        loop {
            let factor = factors
                .get(&current)
                .cloned()
                .ok_or_else(|| Error::Invariant(format!("no factor for {}", current)))?;
            for resource in &factor.element().desc.resources {
                if !resources.contains(resource) {
                    resources.push(resource.clone());
                }
            }
            let terminal = matches!(
                factor.kind(),
                ProcessorKind::LineEnd | ProcessorKind::Rendezvous
            );
            chain.push(factor);
            if terminal {
                break;
            }
            let successors = block.graph.successors(current);
            let mut iter = successors.iter();
            let next = match (iter.next(), iter.next()) {
                (Some(next), None) => *next,
                _ => break,
            };
            if starts.contains(&next) {
                break;
            }
            if chain.len() > block.graph.len() {
                return Err(Error::Invariant(format!(
                    "cycle through {} in block {}",
                    current, block.id
                ))
                .into());
            }
            current = next;
        }
        let id = FragmentId::new(self.next_fragment);
        self.next_fragment += 1;
        if missing.contains(&start) {
            return Ok(Fragment::placeholder(id, block.id, chain, resources)?);
        }
        Ok(Fragment::new(id, block.id, chain, resources)?)
    }

    fn map_units(&self, block: &FlowBlock, fragments: &BlockFragments) -> Result<Vec<Unit>> {
        let mut units = Vec::new();
        for (i, input) in block.inputs.iter().enumerate() {
            let head = head_at(fragments, input.port.node)?;
            let body = unit_body(fragments, head)?;
            units.push(Unit::new(UnitKind::Map, vec![block.input_ref(i)], body));
        }
        Ok(units)
    }

    fn reduce_units(&self, block: &FlowBlock, fragments: &BlockFragments) -> Result<Vec<Unit>> {
        // Owner element -> block inputs, in first-seen order.
        let mut owners: Vec<(NodeId, Vec<BlockPortRef>)> = Vec::new();
        for (i, input) in block.inputs.iter().enumerate() {
            let port = block.input_ref(i);
            match owners.iter_mut().find(|(n, _)| *n == input.port.node) {
                Some((_, ports)) => ports.push(port),
                None => owners.push((input.port.node, vec![port])),
            }
        }
        let mut units = Vec::new();
        for (node, inputs) in owners {
            let head = head_at(fragments, node)?;
            if !head.is_rendezvous() && !fragments.missing.contains(&node) {
                self.diag.error(
                    PHASE,
                    format!(
                        "reduce input of block {} feeds {} which is not a rendezvous",
                        block.id,
                        head.first().element().name
                    ),
                );
            }
            let body = unit_body(fragments, head)?;
            units.push(Unit::new(UnitKind::Reduce, inputs, body));
        }
        Ok(units)
    }
}

fn head_at(fragments: &BlockFragments, node: NodeId) -> Result<&Arc<Fragment>> {
    fragments.by_start.get(&node).ok_or_else(|| {
        PlanError::from(Error::Invariant(format!(
            "block input element {} does not start a fragment",
            node
        )))
    })
}

/// `head` plus everything downstream of it, producers first.
fn unit_body(fragments: &BlockFragments, head: &Arc<Fragment>) -> Result<Vec<Arc<Fragment>>> {
    let mut reach = fragments.graph.collect_all_connected([&head.id()]);
    reach.insert(head.id());
    let sub = fragments.graph.subgraph(&reach);
    sub.transpose()
        .sort_post_order()
        .into_iter()
        .map(|id| {
            fragments.fragment(id).cloned().ok_or_else(|| {
                PlanError::from(Error::Invariant(format!("unknown fragment {}", id)))
            })
        })
        .collect()
}

/// Fragment start rules.
fn is_start(block: &FlowBlock, factors: &BTreeMap<NodeId, Factor>, id: NodeId) -> bool {
    if factors.get(&id).map(Factor::is_rendezvous).unwrap_or(false) {
        return true;
    }
    if block.inputs.iter().any(|input| input.port.node == id) {
        return true;
    }
    let preds = block.graph.predecessors(id);
    let pred = match (preds.len(), preds.iter().next()) {
        (1, Some(pred)) => *pred,
        _ => return true,
    };
    if block.graph.successors(pred).len() >= 2 {
        return true;
    }
    if block
        .graph
        .element(pred)
        .map(|e| e.outputs.len() >= 2)
        .unwrap_or(false)
    {
        return true;
    }
    if block.owns_output(pred) {
        return true;
    }
    matches!(
        factors.get(&pred).map(Factor::kind),
        Some(ProcessorKind::LineEnd) | Some(ProcessorKind::Rendezvous)
    )
}

/// Upstream block outputs feeding any input of `unit`.
fn upstream_of(stage: &StageBlock, unit: &Unit) -> BTreeSet<BlockPortRef> {
    unit.inputs()
        .iter()
        .filter_map(|port| stage.input(*port))
        .flat_map(|input| input.sources.iter().copied())
        .collect()
}

/// Merge units whose keys are equal; groups keep first-seen order.
fn compose<K: Ord>(units: Vec<Unit>, key: impl Fn(&Unit) -> K) -> Vec<Unit> {
    let mut groups: Vec<(K, Unit)> = Vec::new();
    for unit in units {
        let k = key(&unit);
        match groups.iter_mut().find(|(g, _)| *g == k) {
            Some((_, merged)) => merged.absorb(unit),
            None => groups.push((k, unit)),
        }
    }
    groups.into_iter().map(|(_, unit)| unit).collect()
}

/// Observed block outputs, grouped by their downstream consumer set.
fn collect_sinks(stage: &StageBlock, units: &[Unit], names: &mut NameGenerator) -> Vec<Sink> {
    let produced: BTreeSet<_> = units
        .iter()
        .flat_map(|u| u.fragments().iter())
        .flat_map(|f| f.output_ports())
        .collect();

    let blocks = if stage.has_reduce_blocks() {
        &stage.reduce_blocks
    } else {
        &stage.map_blocks
    };

    let mut groups: Vec<(BTreeSet<BlockPortRef>, Vec<BlockPortRef>)> = Vec::new();
    for block in blocks {
        for (i, output) in block.outputs.iter().enumerate() {
            if !produced.contains(&output.port) {
                continue;
            }
            let targets: BTreeSet<_> = output.targets.iter().copied().collect();
            let port = block.output_ref(i);
            match groups.iter_mut().find(|(t, _)| *t == targets) {
                Some((_, outputs)) => outputs.push(port),
                None => groups.push((targets, vec![port])),
            }
        }
    }
    groups
        .into_iter()
        .map(|(targets, outputs)| Sink {
            name: names.create("result"),
            outputs,
            targets,
        })
        .collect()
}
