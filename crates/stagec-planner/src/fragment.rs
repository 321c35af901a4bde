//! Factors and fragments.

use std::fmt;
use std::sync::Arc;

use stagec_core::error::{Error, Result};
use stagec_core::flow::{FlowElement, InputPortRef, OutputPortRef, ResourceDesc};
use stagec_core::id::{BlockId, FragmentId, NodeId};
use stagec_operators::traits::{Processor, ProcessorKind};

/// One flow element paired with the processor that handles it.
#[derive(Clone)]
pub struct Factor {
    element: Arc<FlowElement>,
    processor: Arc<dyn Processor>,
}

impl Factor {
    pub fn new(element: Arc<FlowElement>, processor: Arc<dyn Processor>) -> Self {
        Self { element, processor }
    }

    pub fn element(&self) -> &Arc<FlowElement> {
        &self.element
    }

    pub fn processor(&self) -> &Arc<dyn Processor> {
        &self.processor
    }

    pub fn kind(&self) -> ProcessorKind {
        self.processor.kind()
    }

    pub fn is_line_end(&self) -> bool {
        self.kind() == ProcessorKind::LineEnd
    }

    pub fn is_rendezvous(&self) -> bool {
        self.kind() == ProcessorKind::Rendezvous
    }
}

impl fmt::Debug for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factor")
            .field("element", &self.element.name)
            .field("processor", &self.processor.name())
            .field("kind", &self.kind())
            .finish()
    }
}

/// A straight line of factors, or a single rendezvous.
///
/// Equality and ordering go by id only.
#[derive(Debug, Clone)]
pub struct Fragment {
    id: FragmentId,
    block: BlockId,
    factors: Vec<Factor>,
    resources: Vec<ResourceDesc>,
}

impl Fragment {
    /// Fails with `Error::Invariant` when the factor sequence is not representable.
    pub fn new(
        id: FragmentId,
        block: BlockId,
        factors: Vec<Factor>,
        resources: Vec<ResourceDesc>,
    ) -> Result<Self> {
        let Some(first) = factors.first() else {
            return Err(Error::Invariant(format!("fragment {} has no factors", id)));
        };
        if first.is_rendezvous() {
            if factors.len() != 1 {
                return Err(Error::Invariant(format!(
                    "rendezvous {} chained with {} other factor(s) in fragment {}",
                    first.element().name,
                    factors.len() - 1,
                    id
                )));
            }
        } else {
            if first.element().inputs.len() != 1 {
                return Err(Error::Invariant(format!(
                    "line fragment {} starts at {} with {} input ports",
                    id,
                    first.element().name,
                    first.element().inputs.len()
                )));
            }
            let last = factors.len() - 1;
            for (i, factor) in factors.iter().enumerate() {
                let ok = match factor.kind() {
                    ProcessorKind::LinePart | ProcessorKind::Pseudo => true,
                    ProcessorKind::LineEnd => i == last,
                    ProcessorKind::Rendezvous => false,
                };
                if !ok {
                    return Err(Error::Invariant(format!(
                        "{} ({}) cannot appear at position {} of fragment {}",
                        factor.element().name,
                        factor.kind(),
                        i,
                        id
                    )));
                }
            }
        }
        Ok(Self {
            id,
            block,
            factors,
            resources,
        })
    }

    /// Chain over a substituted placeholder; skips the port checks, since the
    /// missing handler has already been reported and the pass will not finish.
    pub(crate) fn placeholder(
        id: FragmentId,
        block: BlockId,
        factors: Vec<Factor>,
        resources: Vec<ResourceDesc>,
    ) -> Result<Self> {
        if factors.is_empty() {
            return Err(Error::Invariant(format!("fragment {} has no factors", id)));
        }
        Ok(Self {
            id,
            block,
            factors,
            resources,
        })
    }

    pub fn id(&self) -> FragmentId {
        self.id
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    pub fn resources(&self) -> &[ResourceDesc] {
        &self.resources
    }

    pub fn first(&self) -> &Factor {
        // Non-empty by construction.
        &self.factors[0]
    }

    pub fn last(&self) -> &Factor {
        &self.factors[self.factors.len() - 1]
    }

    pub fn is_rendezvous(&self) -> bool {
        self.first().is_rendezvous()
    }

    pub fn input_ports(&self) -> Vec<InputPortRef> {
        self.first().element().input_ports()
    }

    pub fn output_ports(&self) -> Vec<OutputPortRef> {
        self.last().element().output_ports()
    }

    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.factors.iter().map(|f| f.element().id)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.elements().any(|n| n == node)
    }

    /// Short label such as `read>filter>branch`.
    pub fn label(&self) -> String {
        self.factors
            .iter()
            .map(|f| f.element().name.as_str())
            .collect::<Vec<_>>()
            .join(">")
    }
}

impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Fragment {}

impl PartialOrd for Fragment {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fragment {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::hash::Hash for Fragment {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
