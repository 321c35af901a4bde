//! Shuffle keys and values, object and byte forms.

use std::sync::Arc;

use serde::Serialize;

use stagec_core::id::{ElementId, PortId};
use stagec_core::types::{Record, Scalar};

use crate::codec::{decode_value, encode_value};
use crate::error::{CodecError, Result, ShuffleError};
use crate::model::{find_segment, Segment};

/// Decoded key: the port tag plus one value per term, in segment term order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShuffleKey {
    pub port: PortId,
    pub terms: Vec<Scalar>,
}

/// Tagged exchange value: the record plus the port it was written for.
#[derive(Debug, Clone, PartialEq)]
pub struct ShuffleValue {
    pub port: PortId,
    pub record: Record,
}

/// Key extraction, encoding and decoding for every segment of a stage.
#[derive(Debug, Clone)]
pub struct KeySchema {
    segments: Arc<[Segment]>,
}

pub(crate) fn read_port(bytes: &[u8]) -> Result<PortId> {
    let head: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(CodecError::Truncated { needed: 4, at: 0 })?;
    let raw = i32::from_be_bytes(head);
    u32::try_from(raw)
        .map(PortId::new)
        .map_err(|_| ShuffleError::UnknownTag(i64::from(raw)))
}

impl KeySchema {
    pub fn new(segments: Arc<[Segment]>) -> Self {
        Self { segments }
    }

    pub fn segment(&self, port: PortId) -> Result<&Segment> {
        find_segment(&self.segments, port)
    }

    pub fn element_of(&self, port: PortId) -> Result<ElementId> {
        Ok(self.segment(port)?.element_id)
    }

    /// Pull the key terms for `port` out of `record`.
    pub fn key_of(&self, port: PortId, record: &Record) -> Result<ShuffleKey> {
        let segment = self.segment(port)?;
        let mut terms = Vec::with_capacity(segment.terms.len());
        for term in &segment.terms {
            let value = record.get(term.index).ok_or(CodecError::Arity {
                index: term.index,
                got: record.len(),
            })?;
            if !value.conforms_to(term.data_type) {
                return Err(CodecError::Type {
                    expected: term.data_type,
                    got: format!("{:?}", value),
                }
                .into());
            }
            terms.push(value.clone());
        }
        Ok(ShuffleKey { port, terms })
    }

    pub fn encode(&self, key: &ShuffleKey) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(16);
        self.encode_into(key, &mut out)?;
        Ok(out)
    }

    /// Append the byte form of `key` to `out`.
    pub fn encode_into(&self, key: &ShuffleKey, out: &mut Vec<u8>) -> Result<()> {
        let segment = self.segment(key.port)?;
        if key.terms.len() != segment.terms.len() {
            return Err(CodecError::Arity {
                index: segment.terms.len(),
                got: key.terms.len(),
            }
            .into());
        }
        let tag = i32::try_from(key.port.get())
            .map_err(|_| ShuffleError::UnknownTag(i64::from(key.port.get())))?;
        out.extend_from_slice(&tag.to_be_bytes());
        for (term, value) in segment.terms.iter().zip(&key.terms) {
            encode_value(out, value, term.data_type)?;
        }
        Ok(())
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<ShuffleKey> {
        let port = read_port(bytes)?;
        let segment = self.segment(port)?;
        let mut at = 4;
        let mut terms = Vec::with_capacity(segment.terms.len());
        for term in &segment.terms {
            let (value, next) = decode_value(bytes, at, term.data_type)?;
            terms.push(value);
            at = next;
        }
        if at != bytes.len() {
            return Err(CodecError::Trailing(bytes.len() - at).into());
        }
        Ok(ShuffleKey { port, terms })
    }

    /// Overwrite the grouping values of `dst` with those of `src`.
    ///
    /// Both keys must belong to the same element; sort terms are untouched.
    pub fn copy_group_from(&self, dst: &mut ShuffleKey, src: &ShuffleKey) -> Result<()> {
        let d = self.segment(dst.port)?;
        let s = self.segment(src.port)?;
        if d.element_id != s.element_id {
            return Err(CodecError::ElementMismatch {
                expected: dst.port,
                got: src.port,
            }
            .into());
        }
        let groups = d.grouping_terms().count();
        for i in 0..groups {
            match (dst.terms.get_mut(i), src.terms.get(i)) {
                (Some(to), Some(from)) => to.clone_from(from),
                _ => {
                    return Err(CodecError::Arity {
                        index: i,
                        got: src.terms.len().min(dst.terms.len()),
                    }
                    .into())
                }
            }
        }
        Ok(())
    }
}
