//! Construction-order checks, run by the compiler after each flow is built.

use std::collections::BTreeMap;

use crate::error::{FlowError, Result};
use crate::flow::FragmentFlow;

/// Every node appears once and after all of its consumers.
pub fn check_construction_order(flow: &FragmentFlow) -> Result<()> {
    let mut position = BTreeMap::new();
    for (i, key) in flow.construction_order().iter().enumerate() {
        if position.insert(*key, i).is_some() {
            return Err(FlowError::Invariant(format!("{} built twice", key)));
        }
    }
    for producer in flow.graph().nodes() {
        let Some(&p) = position.get(producer) else {
            return Err(FlowError::Invariant(format!("{} never built", producer)));
        };
        for consumer in flow.graph().connected(producer) {
            match position.get(consumer) {
                Some(&c) if c < p => {}
                _ => {
                    return Err(FlowError::Order {
                        node: producer.to_string(),
                        consumer: consumer.to_string(),
                    })
                }
            }
        }
    }
    Ok(())
}
