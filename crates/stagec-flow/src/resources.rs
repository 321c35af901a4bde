//! Resource slots shared by the fragments of one task.

use std::collections::BTreeMap;

use stagec_core::flow::ResourceDesc;
use stagec_core::id::FragmentId;
use stagec_planner::fragment::Fragment;
use stagec_planner::names::NameGenerator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlot {
    pub name: String,
    pub desc: ResourceDesc,
}

/// Deduplicate resources across `fragments`; returns the slots in first-seen
/// order plus each fragment's slot indices.
pub fn collect_slots<'a>(
    fragments: impl IntoIterator<Item = &'a Fragment>,
    names: &mut NameGenerator,
) -> (Vec<ResourceSlot>, BTreeMap<FragmentId, Vec<usize>>) {
    let mut slots: Vec<ResourceSlot> = Vec::new();
    let mut uses = BTreeMap::new();
    for fragment in fragments {
        let mut indices = Vec::new();
        for desc in fragment.resources() {
            let index = match slots.iter().position(|s| &s.desc == desc) {
                Some(i) => i,
                None => {
                    slots.push(ResourceSlot {
                        name: names.create("resource"),
                        desc: desc.clone(),
                    });
                    slots.len() - 1
                }
            };
            indices.push(index);
        }
        uses.insert(fragment.id(), indices);
    }
    (slots, uses)
}
