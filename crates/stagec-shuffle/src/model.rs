//! Segments and terms.

use std::sync::Arc;

use serde::Serialize;

use stagec_core::flow::{Direction, InputPortRef};
use stagec_core::hash::{hash_serde, Hash256};
use stagec_core::id::{ElementId, NodeId, PortId};
use stagec_core::schema::{DataType, Schema};

use crate::error::{Result, ShuffleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Arrangement {
    Grouping,
    Ascending,
    Descending,
}

impl From<Direction> for Arrangement {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Asc => Arrangement::Ascending,
            Direction::Desc => Arrangement::Descending,
        }
    }
}

/// One key property of a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Term {
    /// 1-based, local to the segment; grouping terms come first.
    pub term_id: u32,
    pub property: String,
    /// Position of the property in the segment's record shape.
    pub index: usize,
    pub data_type: DataType,
    pub arrangement: Arrangement,
}

impl Term {
    pub fn is_grouping(&self) -> bool {
        self.arrangement == Arrangement::Grouping
    }
}

/// Key layout of one shuffle input port.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub element_id: ElementId,
    /// Wire tag; strictly increasing in segment order.
    pub port_id: PortId,
    pub port: InputPortRef,
    pub element: NodeId,
    pub element_name: String,
    pub source_shape: String,
    pub target_shape: String,
    pub schema: Schema,
    pub terms: Vec<Term>,
    /// True if a map block of the stage writes into this port.
    pub consumed: bool,
}

impl Segment {
    pub fn grouping_terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.iter().filter(|t| t.is_grouping())
    }

    pub fn sort_terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.iter().filter(|t| !t.is_grouping())
    }

    pub fn grouping_types(&self) -> Vec<DataType> {
        self.grouping_terms().map(|t| t.data_type).collect()
    }
}

/// Find the segment tagged `port`. Relies on port ids ascending in list order.
pub fn find_segment(segments: &[Segment], port: PortId) -> Result<&Segment> {
    segments
        .binary_search_by_key(&port, |s| s.port_id)
        .map(|i| &segments[i])
        .map_err(|_| ShuffleError::UnknownTag(i64::from(port.get())))
}

/// Ordered segments of one stage's exchange.
#[derive(Debug, Clone)]
pub struct ShuffleModel {
    segments: Arc<[Segment]>,
}

impl ShuffleModel {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments: segments.into(),
        }
    }

    /// Model of a stage without reduce blocks.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The shared list every codec artifact is derived from.
    pub fn shared(&self) -> Arc<[Segment]> {
        Arc::clone(&self.segments)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn segment(&self, port: PortId) -> Result<&Segment> {
        find_segment(&self.segments, port)
    }

    pub fn segment_at(&self, port: InputPortRef) -> Option<&Segment> {
        self.segments.iter().find(|s| s.port == port)
    }

    /// Segments of one rendezvous element, in port order.
    pub fn by_element(&self, element: ElementId) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(move |s| s.element_id == element)
    }

    pub fn port_ids(&self) -> Vec<PortId> {
        self.segments.iter().map(|s| s.port_id).collect()
    }

    pub fn fingerprint(&self) -> stagec_core::Result<Hash256> {
        hash_serde(&self.segments)
    }
}
