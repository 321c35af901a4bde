//! Compiler configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Number of reduce partitions used by the local exchange runner.
    pub partitions: u32,

    /// Emit a combine task when at least one reduce unit is combinable.
    pub combine: bool,

    /// Cross-check the object comparator against the byte comparator while sorting.
    pub verify_comparators: bool,

    /// Prefix prepended to every generated identifier.
    pub name_prefix: String,

    /// Upper bound on diagnostics a front end prints before truncating.
    pub max_errors: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            partitions: 4,
            combine: true,
            verify_comparators: false,
            name_prefix: String::new(),
            max_errors: 100,
        }
    }
}

impl CompilerConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `STAGEC_PARTITIONS`: reduce partition count
    /// - `STAGEC_COMBINE`: `true`/`false`
    /// - `STAGEC_VERIFY_COMPARATORS`: `true`/`false`
    /// - `STAGEC_NAME_PREFIX`: identifier prefix
    /// - `STAGEC_MAX_ERRORS`: diagnostic cap
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("STAGEC_PARTITIONS") {
            if let Ok(v) = s.parse::<u32>() {
                cfg.partitions = v;
            }
        }

        if let Ok(s) = std::env::var("STAGEC_COMBINE") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.combine = v;
            }
        }

        if let Ok(s) = std::env::var("STAGEC_VERIFY_COMPARATORS") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.verify_comparators = v;
            }
        }

        if let Ok(s) = std::env::var("STAGEC_NAME_PREFIX") {
            cfg.name_prefix = s;
        }

        if let Ok(s) = std::env::var("STAGEC_MAX_ERRORS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_errors = v;
            }
        }

        cfg
    }

    /// Reject values no stage can be compiled or run with.
    pub fn validate(&self) -> Result<()> {
        if self.partitions == 0 {
            return Err(Error::Config("partitions must be at least 1".into()));
        }
        if !self
            .name_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::Config(format!(
                "name prefix '{}' is not a valid identifier fragment",
                self.name_prefix
            )));
        }
        Ok(())
    }
}
