#![forbid(unsafe_code)]
//! stagec-core: shared vocabulary for the stage compiler.
//!
//! Contents:
//! - strongly-typed ids (`id`), the crate error (`error`), `CompilerConfig`
//! - record shapes and scalar values (`schema`, `types`)
//! - the planner's output model: flow graphs, flow blocks, stage blocks
//! - a small ordered graph toolkit (`graph`) used by every analysis pass
//! - the append-only diagnostic sink shared by all phases (`diag`)
//! - blake3 hashing and the compile manifest
//!
//! Nothing here performs I/O or code generation.

pub mod block;
pub mod config;
pub mod diag;
pub mod error;
pub mod flow;
pub mod graph;
pub mod hash;
pub mod id;
pub mod manifest;
pub mod prelude;
pub mod schema;
pub mod types;

pub use error::{Error, Result};

/// Compiler version recorded in manifests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
