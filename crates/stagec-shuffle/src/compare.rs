//! Sort and grouping comparators.
//!
//! Sort order:
//! 1. element id of the port tag
//! 2. grouping terms, in order
//! 3. raw port tag
//! 4. sort terms, reversed for `Descending`
//!
//! The grouping comparator stops after step 2. Both come in a byte form that
//! walks encoded keys and an object form over decoded keys; for keys that
//! encode/decode into each other the two forms agree in sign.

use std::cmp::Ordering;
use std::sync::Arc;

use stagec_core::types::scalar_cmp;

use crate::codec::compare_values;
use crate::error::{CodecError, Result};
use crate::key::{read_port, ShuffleKey};
use crate::model::{find_segment, Arrangement, Segment};

/// Compares encoded keys.
pub trait ByteComparator {
    fn try_compare_bytes(&self, a: &[u8], b: &[u8]) -> Result<Ordering>;
}

/// Compares decoded keys.
pub trait ObjectComparator {
    fn try_compare(&self, a: &ShuffleKey, b: &ShuffleKey) -> Result<Ordering>;
}

#[derive(Debug, Clone)]
pub struct SortComparator {
    segments: Arc<[Segment]>,
}

#[derive(Debug, Clone)]
pub struct GroupingComparator {
    segments: Arc<[Segment]>,
}

impl SortComparator {
    pub fn new(segments: Arc<[Segment]>) -> Self {
        Self { segments }
    }
}

impl GroupingComparator {
    pub fn new(segments: Arc<[Segment]>) -> Self {
        Self { segments }
    }
}

macro_rules! decide {
    ($ord:expr) => {
        match $ord {
            Ordering::Equal => {}
            other => return Ok(other),
        }
    };
}

/// Element ids then grouping terms; returns the cursors past the grouping terms.
fn compare_group_bytes<'s>(
    segments: &'s [Segment],
    a: &[u8],
    b: &[u8],
) -> Result<(Ordering, &'s Segment, &'s Segment, usize, usize)> {
    let sa = find_segment(segments, read_port(a)?)?;
    let sb = find_segment(segments, read_port(b)?)?;
    let ord = sa.element_id.cmp(&sb.element_id);
    if ord != Ordering::Equal {
        return Ok((ord, sa, sb, 4, 4));
    }
    let (mut ia, mut ib) = (4, 4);
    for (ta, tb) in sa.grouping_terms().zip(sb.grouping_terms()) {
        if ta.data_type != tb.data_type {
            return Err(CodecError::Type {
                expected: ta.data_type,
                got: format!("{:?}", tb.data_type),
            }
            .into());
        }
        let (ord, na, nb) = compare_values(a, ia, b, ib, ta.data_type)?;
        if ord != Ordering::Equal {
            return Ok((ord, sa, sb, na, nb));
        }
        ia = na;
        ib = nb;
    }
    Ok((Ordering::Equal, sa, sb, ia, ib))
}

fn compare_group_keys(segments: &[Segment], a: &ShuffleKey, b: &ShuffleKey) -> Result<Ordering> {
    let sa = find_segment(segments, a.port)?;
    let sb = find_segment(segments, b.port)?;
    decide!(sa.element_id.cmp(&sb.element_id));
    let groups = sa.grouping_terms().count();
    for (x, y) in a.terms.iter().zip(&b.terms).take(groups) {
        decide!(scalar_cmp(x, y));
    }
    Ok(Ordering::Equal)
}

impl ByteComparator for SortComparator {
    fn try_compare_bytes(&self, a: &[u8], b: &[u8]) -> Result<Ordering> {
        let (ord, sa, sb, mut ia, mut ib) = compare_group_bytes(&self.segments, a, b)?;
        decide!(ord);
        decide!(sa.port_id.cmp(&sb.port_id));
        for term in sa.sort_terms() {
            let (ord, na, nb) = compare_values(a, ia, b, ib, term.data_type)?;
            decide!(directed(ord, term.arrangement));
            ia = na;
            ib = nb;
        }
        Ok(Ordering::Equal)
    }
}

impl ObjectComparator for SortComparator {
    fn try_compare(&self, a: &ShuffleKey, b: &ShuffleKey) -> Result<Ordering> {
        decide!(compare_group_keys(&self.segments, a, b)?);
        decide!(a.port.cmp(&b.port));
        let segment = find_segment(&self.segments, a.port)?;
        for ((term, x), y) in segment.terms.iter().zip(&a.terms).zip(&b.terms) {
            if term.is_grouping() {
                continue;
            }
            decide!(directed(scalar_cmp(x, y), term.arrangement));
        }
        Ok(Ordering::Equal)
    }
}

impl ByteComparator for GroupingComparator {
    fn try_compare_bytes(&self, a: &[u8], b: &[u8]) -> Result<Ordering> {
        Ok(compare_group_bytes(&self.segments, a, b)?.0)
    }
}

impl ObjectComparator for GroupingComparator {
    fn try_compare(&self, a: &ShuffleKey, b: &ShuffleKey) -> Result<Ordering> {
        compare_group_keys(&self.segments, a, b)
    }
}

fn directed(ord: Ordering, arrangement: Arrangement) -> Ordering {
    match arrangement {
        Arrangement::Descending => ord.reverse(),
        _ => ord,
    }
}
