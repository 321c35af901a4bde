//! Runtime nodes built from a `FragmentFlow`.
//!
//! Nodes are constructed in the flow's construction order, so every node is
//! created with `Downstream`s pointing at already-built consumers.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use stagec_core::id::{FragmentId, PortId};
use stagec_core::schema::ShapeRegistry;
use stagec_core::types::Record;
use stagec_flow::{FlowNode, FragmentFlow, NodeKey};
use stagec_operators::collector::{Collector, CollectorRef, Downstream};
use stagec_operators::resource::{ResourceHandle, SideTable};
use stagec_operators::traits::{BuildContext, LineEnd, LinePart, OpError, ProcessorKind, Rendezvous};
use stagec_planner::fragment::Fragment;
use stagec_shuffle::key::{KeySchema, ShuffleValue};

use crate::error::{ExecError, Result};

/// One record written into the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ShuffleEntry {
    pub key: Vec<u8>,
    pub value: ShuffleValue,
}

pub type ShuffleBuffer = Rc<RefCell<Vec<ShuffleEntry>>>;
pub type SinkBuffer = Rc<RefCell<Vec<Record>>>;

/// What a task needs from its environment during `setup`.
#[derive(Clone)]
pub struct TaskContext {
    pub shapes: Arc<dyn ShapeRegistry>,
    pub keys: KeySchema,
    /// Destination of shuffle writes.
    pub shuffle: ShuffleBuffer,
    /// Sink buffers, indexed like the stage model's sinks.
    pub sinks: Vec<SinkBuffer>,
}

struct ShuffleWriter {
    port: PortId,
    keys: KeySchema,
    out: ShuffleBuffer,
}

impl Collector for ShuffleWriter {
    fn add(&mut self, record: &mut Record) -> std::result::Result<(), OpError> {
        let key = self
            .keys
            .key_of(self.port, record)
            .and_then(|k| self.keys.encode(&k))
            .map_err(|e| OpError::Exec(format!("shuffle write to {}: {}", self.port, e)))?;
        let mut out = self
            .out
            .try_borrow_mut()
            .map_err(|_| OpError::Exec("shuffle buffer re-entered".into()))?;
        out.push(ShuffleEntry {
            key,
            value: ShuffleValue {
                port: self.port,
                record: record.clone(),
            },
        });
        Ok(())
    }
}

/// A line fragment: inline parts, then an optional terminal step.
struct LineNode {
    parts: Vec<Box<dyn LinePart>>,
    end: Option<Box<dyn LineEnd>>,
    outputs: Vec<Downstream>,
}

impl Collector for LineNode {
    fn add(&mut self, record: &mut Record) -> std::result::Result<(), OpError> {
        let mut current = record;
        for part in self.parts.iter_mut() {
            current = part.apply(current)?;
        }
        match self.end.as_mut() {
            Some(end) => end.process(current, &mut self.outputs),
            None => match self.outputs.first_mut() {
                Some(out) => out.add(current),
                None => Ok(()),
            },
        }
    }
}

/// A rendezvous fragment, driven once per key group.
pub struct RendezvousNode {
    op: Box<dyn Rendezvous>,
    outputs: Vec<Downstream>,
}

impl RendezvousNode {
    pub fn begin(&mut self) -> Result<()> {
        Ok(self.op.begin()?)
    }

    pub fn process(&mut self, port: u32, record: &mut Record) -> Result<()> {
        Ok(self.op.process(port, record)?)
    }

    pub fn end(&mut self) -> Result<()> {
        Ok(self.op.end(&mut self.outputs)?)
    }
}

pub type RendezvousRef = Rc<RefCell<RendezvousNode>>;

/// Everything `setup` created; dropped by `cleanup`.
pub(crate) struct Instance {
    pub lines: BTreeMap<FragmentId, CollectorRef>,
    pub rendezvous: BTreeMap<FragmentId, RendezvousRef>,
    pub resources: Vec<ResourceHandle>,
}

impl Instance {
    /// Release resources in reverse setup order.
    pub fn release(self) {
        for handle in self.resources.iter().rev() {
            handle.borrow_mut().cleanup();
        }
    }
}

pub(crate) fn instantiate(flow: &FragmentFlow, ctx: &TaskContext) -> Result<Instance> {
    let resources = setup_resources(flow)?;
    match build_nodes(flow, ctx, &resources) {
        Ok((lines, rendezvous)) => Ok(Instance {
            lines,
            rendezvous,
            resources,
        }),
        Err(e) => {
            for handle in resources.iter().rev() {
                handle.borrow_mut().cleanup();
            }
            Err(e)
        }
    }
}

fn setup_resources(flow: &FragmentFlow) -> Result<Vec<ResourceHandle>> {
    let mut handles: Vec<ResourceHandle> = Vec::with_capacity(flow.resources().len());
    for slot in flow.resources() {
        let handle = SideTable::handle(slot.desc.clone());
        if let Err(e) = handle.borrow_mut().setup() {
            for done in handles.iter().rev() {
                done.borrow_mut().cleanup();
            }
            return Err(e.into());
        }
        handles.push(handle);
    }
    Ok(handles)
}

type Built = (
    BTreeMap<FragmentId, CollectorRef>,
    BTreeMap<FragmentId, RendezvousRef>,
);

fn build_nodes(
    flow: &FragmentFlow,
    ctx: &TaskContext,
    resources: &[ResourceHandle],
) -> Result<Built> {
    let mut built: BTreeMap<NodeKey, CollectorRef> = BTreeMap::new();
    let mut lines = BTreeMap::new();
    let mut rendezvous = BTreeMap::new();
    for key in flow.construction_order() {
        let node = flow
            .node(*key)
            .ok_or_else(|| ExecError::Invalid(format!("{} missing from flow", key)))?;
        match node {
            FlowNode::Shuffle(port) => {
                let writer: CollectorRef = Rc::new(RefCell::new(ShuffleWriter {
                    port: *port,
                    keys: ctx.keys.clone(),
                    out: Rc::clone(&ctx.shuffle),
                }));
                built.insert(*key, writer);
            }
            FlowNode::Output(sink) => {
                let buffer = ctx
                    .sinks
                    .get(*sink)
                    .ok_or_else(|| ExecError::Invalid(format!("no buffer for sink #{}", sink)))?;
                let collector: CollectorRef = Rc::clone(buffer) as CollectorRef;
                built.insert(*key, collector);
            }
            FlowNode::Line(fragment) => {
                let outputs = downstreams(flow, fragment, &built)?;
                let handles = fragment_resources(flow, fragment, resources);
                let line: CollectorRef = Rc::new(RefCell::new(build_line(
                    fragment, ctx, &handles, outputs,
                )?));
                built.insert(*key, Rc::clone(&line));
                lines.insert(fragment.id(), line);
            }
            FlowNode::Rendezvous(fragment) => {
                let outputs = downstreams(flow, fragment, &built)?;
                let handles = fragment_resources(flow, fragment, resources);
                let factor = fragment.first();
                let bctx = BuildContext {
                    element: factor.element(),
                    shapes: ctx.shapes.as_ref(),
                    resources: &handles,
                };
                let op = factor.processor().rendezvous(&bctx)?;
                rendezvous.insert(
                    fragment.id(),
                    Rc::new(RefCell::new(RendezvousNode { op, outputs })),
                );
            }
        }
    }
    Ok((lines, rendezvous))
}

fn fragment_resources(
    flow: &FragmentFlow,
    fragment: &Fragment,
    resources: &[ResourceHandle],
) -> Vec<ResourceHandle> {
    flow.resource_uses(fragment.id())
        .iter()
        .filter_map(|i| resources.get(*i).cloned())
        .collect()
}

fn downstreams(
    flow: &FragmentFlow,
    fragment: &Fragment,
    built: &BTreeMap<NodeKey, CollectorRef>,
) -> Result<Vec<Downstream>> {
    flow.fan_outs(fragment.id())
        .iter()
        .map(|plan| {
            let targets = plan
                .targets
                .iter()
                .map(|t| {
                    built.get(&t.node).cloned().ok_or_else(|| {
                        ExecError::Invalid(format!(
                            "{} feeds {} which is not a record consumer here",
                            fragment.label(),
                            t.node
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Downstream::of(targets))
        })
        .collect()
}

fn build_line(
    fragment: &Fragment,
    ctx: &TaskContext,
    resources: &[ResourceHandle],
    outputs: Vec<Downstream>,
) -> Result<LineNode> {
    let mut parts = Vec::new();
    let mut end = None;
    for factor in fragment.factors() {
        let bctx = BuildContext {
            element: factor.element(),
            shapes: ctx.shapes.as_ref(),
            resources,
        };
        match factor.kind() {
            ProcessorKind::LinePart | ProcessorKind::Pseudo => {
                parts.push(factor.processor().line_part(&bctx)?)
            }
            ProcessorKind::LineEnd => end = Some(factor.processor().line_end(&bctx)?),
            ProcessorKind::Rendezvous => {
                return Err(ExecError::Invalid(format!(
                    "rendezvous {} inside line fragment {}",
                    factor.element().name,
                    fragment.id()
                )))
            }
        }
    }
    Ok(LineNode {
        parts,
        end,
        outputs,
    })
}
