//! Port tag -> rendezvous routing, shared by the reducer and the combiner.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use stagec_core::id::{ElementId, NodeId, PortId};

use crate::error::{Result, ShuffleError};
use crate::model::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub element_id: ElementId,
    pub element: NodeId,
    /// Input port of the rendezvous the value is delivered to.
    pub input_index: u32,
    pub combinable: bool,
}

#[derive(Debug, Clone)]
pub struct DispatchTable {
    routes: BTreeMap<PortId, Route>,
}

impl DispatchTable {
    /// One route per segment; `combinable` lists rendezvous elements whose
    /// groups may be pre-aggregated before the exchange.
    pub fn new(segments: Arc<[Segment]>, combinable: &BTreeSet<NodeId>) -> Self {
        let routes = segments
            .iter()
            .map(|s| {
                (
                    s.port_id,
                    Route {
                        element_id: s.element_id,
                        element: s.element,
                        input_index: s.port.index,
                        combinable: combinable.contains(&s.element),
                    },
                )
            })
            .collect();
        Self { routes }
    }

    pub fn route(&self, port: PortId) -> Result<&Route> {
        self.routes
            .get(&port)
            .ok_or(ShuffleError::UnknownTag(i64::from(port.get())))
    }

    /// Every tag the table branches on, ascending.
    pub fn ports(&self) -> Vec<PortId> {
        self.routes.keys().copied().collect()
    }

    pub fn routes(&self) -> impl Iterator<Item = (&PortId, &Route)> {
        self.routes.iter()
    }

    pub fn has_combinable(&self) -> bool {
        self.routes.values().any(|r| r.combinable)
    }
}
