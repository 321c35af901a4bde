//! Compile manifest: what was compiled, by which compiler, from which model.
//!
//! Two compilations of the same stage produce identical hashes; the id and
//! timestamps differ per run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::Hash256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestId(pub Uuid);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileManifest {
    pub id: ManifestId,

    pub stage: u32,

    /// Stable hash of the stage model (units, fragments, sinks).
    pub model_hash: Hash256,

    /// Stable hash of the ordered segment list every codec artifact derives from.
    pub codec_hash: Option<Hash256>,

    /// Compiler version string for provenance.
    pub compiler_version: String,

    pub map_units: usize,
    pub reduce_units: usize,
    pub segments: usize,
    pub combinable: bool,

    /// Milliseconds since Unix epoch (UTC).
    pub started_ms: u64,
    pub finished_ms: u64,
}

impl CompileManifest {
    pub fn new(stage: u32, model_hash: Hash256, started_ms: u64) -> Self {
        Self {
            id: ManifestId(Uuid::new_v4()),
            stage,
            model_hash,
            codec_hash: None,
            compiler_version: crate::VERSION.to_string(),
            map_units: 0,
            reduce_units: 0,
            segments: 0,
            combinable: false,
            started_ms,
            finished_ms: started_ms,
        }
    }

    pub fn finish(mut self, finished_ms: u64) -> Self {
        self.finished_ms = finished_ms;
        self
    }

    /// Combined fingerprint of model and codec.
    pub fn fingerprint(&self) -> Hash256 {
        match &self.codec_hash {
            Some(codec) => self.model_hash.combine(codec),
            None => self.model_hash,
        }
    }
}
