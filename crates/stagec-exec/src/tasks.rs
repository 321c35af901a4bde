//! Map, combine and reduce task bodies.
//!
//! Lifecycle: `setup` builds every node and resource, `run`/`run_group`
//! drive records, `cleanup` releases resources in reverse order and drops all
//! references so a reused task starts clean.

use std::collections::BTreeMap;
use std::rc::Rc;

use stagec_core::block::BlockPortRef;
use stagec_core::id::{NodeId, PortId};
use stagec_core::types::Record;
use stagec_flow::{Entry, FragmentFlow};
use stagec_operators::collector::CollectorRef;
use stagec_shuffle::dispatch::DispatchTable;
use stagec_shuffle::key::ShuffleValue;

use crate::error::{ExecError, Result};
use crate::runtime::{instantiate, Instance, RendezvousRef, ShuffleBuffer, ShuffleEntry, TaskContext};

/// Runs every map unit; records are routed by the block input they arrive on.
pub struct MapTask {
    flow: FragmentFlow,
    instance: Option<Instance>,
    entries: BTreeMap<BlockPortRef, CollectorRef>,
}

impl MapTask {
    pub fn new(flow: FragmentFlow) -> Self {
        Self {
            flow,
            instance: None,
            entries: BTreeMap::new(),
        }
    }

    pub fn flow(&self) -> &FragmentFlow {
        &self.flow
    }

    /// Block inputs this task reads.
    pub fn inputs(&self) -> Vec<BlockPortRef> {
        self.flow
            .entries()
            .iter()
            .filter_map(|(entry, _)| match entry {
                Entry::Input(port) => Some(*port),
                Entry::Rendezvous(_) => None,
            })
            .collect()
    }

    pub fn setup(&mut self, ctx: &TaskContext) -> Result<()> {
        if self.instance.is_some() {
            return Err(ExecError::Lifecycle("map task set up twice".into()));
        }
        let instance = instantiate(&self.flow, ctx)?;
        for (entry, fragment) in self.flow.entries() {
            if let Entry::Input(port) = entry {
                let line = instance.lines.get(fragment).ok_or_else(|| {
                    ExecError::Invalid(format!("input {} enters no line fragment", port))
                })?;
                self.entries.insert(*port, Rc::clone(line));
            }
        }
        self.instance = Some(instance);
        Ok(())
    }

    pub fn run(&mut self, input: BlockPortRef, record: &mut Record) -> Result<()> {
        if self.instance.is_none() {
            return Err(ExecError::Lifecycle("map task run before setup".into()));
        }
        let entry = self
            .entries
            .get(&input)
            .ok_or(ExecError::UnknownInput(input))?;
        let mut line = entry
            .try_borrow_mut()
            .map_err(|_| ExecError::Lifecycle("map entry re-entered".into()))?;
        Ok(line.add(record)?)
    }

    pub fn cleanup(&mut self) {
        self.entries.clear();
        if let Some(instance) = self.instance.take() {
            instance.release();
        }
    }
}

/// Shared dispatch: port tag -> rendezvous head.
struct GroupDispatch {
    table: DispatchTable,
    heads: BTreeMap<NodeId, RendezvousRef>,
}

impl GroupDispatch {
    fn bind(flow: &FragmentFlow, instance: &Instance, table: DispatchTable) -> Result<Self> {
        let mut heads = BTreeMap::new();
        for (entry, fragment) in flow.entries() {
            if let Entry::Rendezvous(element) = entry {
                let node = instance.rendezvous.get(fragment).ok_or_else(|| {
                    ExecError::Invalid(format!("element {} has no rendezvous node", element))
                })?;
                heads.insert(*element, Rc::clone(node));
            }
        }
        Ok(Self { table, heads })
    }

    /// One `begin`, a `process` per value, one `end`.
    fn drive<'v>(&self, group: impl IntoIterator<Item = (PortId, &'v mut Record)>) -> Result<()> {
        let mut group = group.into_iter().peekable();
        let Some((first, _)) = group.peek() else {
            return Ok(());
        };
        let route = *self.table.route(*first)?;
        let head = self.heads.get(&route.element).ok_or_else(|| {
            ExecError::Invalid(format!("no rendezvous bound for port {}", first))
        })?;
        let mut node = head
            .try_borrow_mut()
            .map_err(|_| ExecError::Lifecycle("rendezvous re-entered".into()))?;
        node.begin()?;
        for (port, record) in group {
            let r = self.table.route(port)?;
            if r.element_id != route.element_id {
                return Err(ExecError::Invalid(format!(
                    "group mixes {} and {}",
                    route.element_id, r.element_id
                )));
            }
            node.process(r.input_index, record)?;
        }
        node.end()
    }
}

/// Runs every reduce unit; each key group goes to the rendezvous its tag names.
pub struct ReduceTask {
    flow: FragmentFlow,
    table: DispatchTable,
    instance: Option<Instance>,
    dispatch: Option<GroupDispatch>,
}

impl ReduceTask {
    pub fn new(flow: FragmentFlow, table: DispatchTable) -> Self {
        Self {
            flow,
            table,
            instance: None,
            dispatch: None,
        }
    }

    pub fn flow(&self) -> &FragmentFlow {
        &self.flow
    }

    /// Port tags the dispatch switch branches on.
    pub fn ports(&self) -> Vec<PortId> {
        self.table.ports()
    }

    pub fn setup(&mut self, ctx: &TaskContext) -> Result<()> {
        if self.instance.is_some() {
            return Err(ExecError::Lifecycle("reduce task set up twice".into()));
        }
        let instance = instantiate(&self.flow, ctx)?;
        self.dispatch = Some(GroupDispatch::bind(&self.flow, &instance, self.table.clone())?);
        self.instance = Some(instance);
        Ok(())
    }

    /// Values of one key group, in sort order.
    pub fn run_group(&mut self, values: &mut [ShuffleValue]) -> Result<()> {
        let dispatch = self
            .dispatch
            .as_ref()
            .ok_or_else(|| ExecError::Lifecycle("reduce task run before setup".into()))?;
        dispatch.drive(values.iter_mut().map(|v| (v.port, &mut v.record)))
    }

    pub fn cleanup(&mut self) {
        self.dispatch = None;
        if let Some(instance) = self.instance.take() {
            instance.release();
        }
    }
}

/// Pre-aggregates combinable groups of one map task's output.
///
/// Non-combinable groups pass through with their original keys.
pub struct CombineTask {
    flow: FragmentFlow,
    table: DispatchTable,
    instance: Option<Instance>,
    dispatch: Option<GroupDispatch>,
    output: Option<ShuffleBuffer>,
}

impl CombineTask {
    pub fn new(flow: FragmentFlow, table: DispatchTable) -> Self {
        Self {
            flow,
            table,
            instance: None,
            dispatch: None,
            output: None,
        }
    }

    pub fn flow(&self) -> &FragmentFlow {
        &self.flow
    }

    pub fn ports(&self) -> Vec<PortId> {
        self.table.ports()
    }

    /// `ctx.shuffle` receives the combined output.
    pub fn setup(&mut self, ctx: &TaskContext) -> Result<()> {
        if self.instance.is_some() {
            return Err(ExecError::Lifecycle("combine task set up twice".into()));
        }
        let instance = instantiate(&self.flow, ctx)?;
        self.dispatch = Some(GroupDispatch::bind(&self.flow, &instance, self.table.clone())?);
        self.output = Some(Rc::clone(&ctx.shuffle));
        self.instance = Some(instance);
        Ok(())
    }

    pub fn run_group(&mut self, group: &mut [ShuffleEntry]) -> Result<()> {
        let (Some(dispatch), Some(output)) = (self.dispatch.as_ref(), self.output.as_ref()) else {
            return Err(ExecError::Lifecycle("combine task run before setup".into()));
        };
        let Some(first) = group.first() else {
            return Ok(());
        };
        if !self.table.route(first.value.port)?.combinable {
            let mut out = output
                .try_borrow_mut()
                .map_err(|_| ExecError::Lifecycle("combine output re-entered".into()))?;
            out.extend(group.iter().cloned());
            return Ok(());
        }
        dispatch.drive(
            group
                .iter_mut()
                .map(|e| (e.value.port, &mut e.value.record)),
        )
    }

    pub fn cleanup(&mut self) {
        self.dispatch = None;
        self.output = None;
        if let Some(instance) = self.instance.take() {
            instance.release();
        }
    }
}
