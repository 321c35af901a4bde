//! Units, sinks and the per-stage model.

use std::collections::BTreeSet;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Serialize;

use stagec_core::block::{BlockPortRef, StageBlock};
use stagec_core::error::{Error, Result};
use stagec_core::hash::{hash_serde, Hash256};
use stagec_core::id::FragmentId;

use crate::fragment::Fragment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnitKind {
    Map,
    Reduce,
}

/// Block inputs plus the fragments reachable from them, producers first.
#[derive(Debug, Clone)]
pub struct Unit {
    kind: UnitKind,
    serial: OnceCell<u32>,
    inputs: Vec<BlockPortRef>,
    fragments: Vec<Arc<Fragment>>,
}

impl Unit {
    pub fn new(kind: UnitKind, inputs: Vec<BlockPortRef>, fragments: Vec<Arc<Fragment>>) -> Self {
        Self {
            kind,
            serial: OnceCell::new(),
            inputs,
            fragments,
        }
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Stage-unique serial, set once by `StageModel::new`.
    pub fn serial(&self) -> Option<u32> {
        self.serial.get().copied()
    }

    fn renumber(&self, serial: u32) -> Result<()> {
        self.serial.set(serial).map_err(|_| {
            Error::Invariant(format!("unit already numbered {:?}", self.serial.get()))
        })
    }

    pub fn inputs(&self) -> &[BlockPortRef] {
        &self.inputs
    }

    /// Construction order: every fragment follows its producers.
    pub fn fragments(&self) -> &[Arc<Fragment>] {
        &self.fragments
    }

    pub fn head(&self) -> Option<&Arc<Fragment>> {
        self.fragments.first()
    }

    /// True for a reduce unit headed by a rendezvous whose handler is partial.
    pub fn can_combine(&self) -> bool {
        if self.kind != UnitKind::Reduce {
            return false;
        }
        match self.head() {
            Some(head) if head.is_rendezvous() => {
                let factor = head.first();
                factor.processor().is_partial(&factor.element().desc)
            }
            _ => false,
        }
    }

    /// Merge `other` into this unit: inputs and fragments deduplicated in order.
    pub(crate) fn absorb(&mut self, other: Unit) {
        for input in other.inputs {
            if !self.inputs.contains(&input) {
                self.inputs.push(input);
            }
        }
        for fragment in other.fragments {
            if !self.fragments.iter().any(|f| f.id() == fragment.id()) {
                self.fragments.push(fragment);
            }
        }
    }
}

/// A named stage output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sink {
    pub name: String,
    /// Block outputs collapsed into this sink.
    pub outputs: Vec<BlockPortRef>,
    /// Downstream block inputs every one of `outputs` feeds.
    pub targets: BTreeSet<BlockPortRef>,
}

#[derive(Debug, Clone)]
pub struct StageModel {
    stage: Arc<StageBlock>,
    map_units: Vec<Unit>,
    reduce_units: Vec<Unit>,
    sinks: Vec<Sink>,
}

impl StageModel {
    /// Numbers map units first, then reduce units, starting at 1.
    pub fn new(
        stage: Arc<StageBlock>,
        map_units: Vec<Unit>,
        reduce_units: Vec<Unit>,
        sinks: Vec<Sink>,
    ) -> Result<Self> {
        for (i, unit) in map_units.iter().chain(reduce_units.iter()).enumerate() {
            unit.renumber(i as u32 + 1)?;
        }
        Ok(Self {
            stage,
            map_units,
            reduce_units,
            sinks,
        })
    }

    pub fn stage(&self) -> &Arc<StageBlock> {
        &self.stage
    }

    pub fn number(&self) -> u32 {
        self.stage.number
    }

    pub fn map_units(&self) -> &[Unit] {
        &self.map_units
    }

    pub fn reduce_units(&self) -> &[Unit] {
        &self.reduce_units
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.map_units.iter().chain(self.reduce_units.iter())
    }

    pub fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    /// Distinct fragments over all units, in unit order.
    pub fn fragments(&self) -> Vec<Arc<Fragment>> {
        let mut seen = BTreeSet::new();
        self.units()
            .flat_map(|u| u.fragments().iter())
            .filter(|f| seen.insert(f.id()))
            .cloned()
            .collect()
    }

    pub fn has_combinable(&self) -> bool {
        self.reduce_units.iter().any(Unit::can_combine)
    }

    /// Stable hash over unit structure and sinks.
    pub fn fingerprint(&self) -> Result<Hash256> {
        hash_serde(&self.summary())
    }

    fn summary(&self) -> ModelSummary {
        let units = self
            .units()
            .map(|u| UnitSummary {
                kind: u.kind(),
                serial: u.serial().unwrap_or(0),
                inputs: u.inputs().to_vec(),
                fragments: u
                    .fragments()
                    .iter()
                    .map(|f| FragmentSummary {
                        id: f.id(),
                        elements: f.elements().map(|n| n.get()).collect(),
                    })
                    .collect(),
            })
            .collect();
        ModelSummary {
            stage: self.number(),
            units,
            sinks: self.sinks.clone(),
        }
    }
}

#[derive(Serialize)]
struct ModelSummary {
    stage: u32,
    units: Vec<UnitSummary>,
    sinks: Vec<Sink>,
}

#[derive(Serialize)]
struct UnitSummary {
    kind: UnitKind,
    serial: u32,
    inputs: Vec<BlockPortRef>,
    fragments: Vec<FragmentSummary>,
}

#[derive(Serialize)]
struct FragmentSummary {
    id: FragmentId,
    elements: Vec<u64>,
}
