//! Combiner eligibility.

use std::collections::BTreeSet;

use stagec_core::id::NodeId;
use stagec_planner::model::StageModel;

/// Rendezvous elements heading a combinable reduce unit.
pub fn combinable_elements(model: &StageModel) -> BTreeSet<NodeId> {
    model
        .reduce_units()
        .iter()
        .filter(|u| u.can_combine())
        .filter_map(|u| u.head())
        .map(|f| f.first().element().id)
        .collect()
}
