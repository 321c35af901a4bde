//! blake3 digests for model fingerprints, codec tables and term hashes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn of(bytes: &[u8]) -> Self {
        Hash256(*blake3::hash(bytes).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    /// Order-sensitive digest of `self` followed by `other`.
    pub fn combine(&self, other: &Hash256) -> Hash256 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.0);
        hasher.update(&other.0);
        Hash256(*hasher.finalize().as_bytes())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Digest of a value's JSON form. Only pass values whose maps are ordered.
pub fn hash_serde<T: Serialize>(value: &T) -> Result<Hash256> {
    let bytes = serde_json::to_vec(value).map_err(|e| Error::Hash(e.to_string()))?;
    Ok(Hash256::of(&bytes))
}

/// First four digest bytes, little-endian. Same value on every platform.
pub fn hash32(bytes: &[u8]) -> i32 {
    let digest = blake3::hash(bytes);
    let b = digest.as_bytes();
    i32::from_le_bytes([b[0], b[1], b[2], b[3]])
}
