//! Partition function.
//!
//! `hash` starts at the element id and folds `hash * 31 + term_hash` over the
//! grouping terms with wrapping i32 arithmetic. The port tag never enters the
//! hash, so segments of one element co-locate equal groups.

use std::sync::Arc;

use crate::codec::{skip_value, term_hash, term_hash_bytes};
use crate::error::{Result, ShuffleError};
use crate::key::{read_port, ShuffleKey};
use crate::model::{find_segment, Segment};

#[derive(Debug, Clone)]
pub struct Partitioner {
    segments: Arc<[Segment]>,
}

impl Partitioner {
    pub fn new(segments: Arc<[Segment]>) -> Self {
        Self { segments }
    }

    /// Partition of an encoded key.
    pub fn try_partition(&self, key: &[u8], partitions: u32) -> Result<u32> {
        check(partitions)?;
        let segment = find_segment(&self.segments, read_port(key)?)?;
        let mut hash = segment.element_id.get() as i32;
        let mut at = 4;
        for term in segment.grouping_terms() {
            let next = skip_value(key, at, term.data_type)?;
            hash = hash
                .wrapping_mul(31)
                .wrapping_add(term_hash_bytes(&key[at..next]));
            at = next;
        }
        Ok(reduce(hash, partitions))
    }

    /// Partition of a decoded key; equal to `try_partition` of its encoding.
    pub fn try_partition_key(&self, key: &ShuffleKey, partitions: u32) -> Result<u32> {
        check(partitions)?;
        let segment = find_segment(&self.segments, key.port)?;
        let mut hash = segment.element_id.get() as i32;
        for (term, value) in segment.grouping_terms().zip(&key.terms) {
            hash = hash
                .wrapping_mul(31)
                .wrapping_add(term_hash(value, term.data_type)?);
        }
        Ok(reduce(hash, partitions))
    }
}

fn check(partitions: u32) -> Result<()> {
    if partitions == 0 {
        return Err(ShuffleError::Partitions(partitions));
    }
    Ok(())
}

fn reduce(hash: i32, partitions: u32) -> u32 {
    ((hash & i32::MAX) as u32) % partitions
}
