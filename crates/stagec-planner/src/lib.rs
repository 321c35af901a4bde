#![forbid(unsafe_code)]
//! stagec-planner: from a stage block to a `StageModel`.
//!
//! Design:
//! - `StageAnalyzer` splits every block into fragments (maximal straight-line
//!   chains, or one rendezvous), builds the fragment graph, and assembles
//!   map units, reduce units and sinks.
//! - Recoverable problems go to the shared diagnostic sink; the analyzer
//!   refuses to produce a model when its pass reported errors.
//! - `dsl::yaml` parses a stage document into a `StageBlock` plus shapes.

pub mod analyze;
pub mod dsl;
pub mod env;
pub mod error;
pub mod fragment;
pub mod model;
pub mod names;

pub use analyze::StageAnalyzer;
pub use dsl::yaml::{parse_yaml_stage, DslError, ParsedStage, StageConfig};
pub use env::CompileEnv;
pub use error::{PlanError, Result};
pub use fragment::{Factor, Fragment};
pub use model::{Sink, StageModel, Unit, UnitKind};
pub use names::NameGenerator;
