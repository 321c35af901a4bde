//! The bundle of codec artifacts for one stage.

use std::collections::BTreeSet;

use stagec_core::hash::Hash256;
use stagec_core::id::NodeId;
use stagec_planner::model::StageModel;

use crate::combine::combinable_elements;
use crate::compare::{GroupingComparator, SortComparator};
use crate::dispatch::DispatchTable;
use crate::key::KeySchema;
use crate::model::ShuffleModel;
use crate::partition::Partitioner;

#[derive(Debug, Clone)]
pub struct ShuffleCodec {
    pub model: ShuffleModel,
    pub keys: KeySchema,
    pub partitioner: Partitioner,
    pub sort: SortComparator,
    pub grouping: GroupingComparator,
    pub dispatch: DispatchTable,
    pub combinable: BTreeSet<NodeId>,
}

impl ShuffleCodec {
    /// Derive every artifact from the model's one segment list.
    ///
    /// With `combine` off no route is marked combinable.
    pub fn derive(model: &ShuffleModel, stage: &StageModel, combine: bool) -> Self {
        let combinable = if combine {
            combinable_elements(stage)
        } else {
            BTreeSet::new()
        };
        let shared = model.shared();
        Self {
            model: model.clone(),
            keys: KeySchema::new(shared.clone()),
            partitioner: Partitioner::new(shared.clone()),
            sort: SortComparator::new(shared.clone()),
            grouping: GroupingComparator::new(shared.clone()),
            dispatch: DispatchTable::new(shared, &combinable),
            combinable,
        }
    }

    pub fn fingerprint(&self) -> stagec_core::Result<Hash256> {
        self.model.fingerprint()
    }
}
