//! Stage compilation driver.
//!
//! Phases run in order and the driver stops after the first one that
//! reported errors: decomposition, shuffle analysis, codec derivation, flow
//! ordering. Diagnostics stay in the environment's sink for the caller.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use stagec_core::block::StageBlock;
use stagec_core::config::CompilerConfig;
use stagec_core::manifest::CompileManifest;
use stagec_core::schema::ShapeRegistry;
use stagec_flow::{check_construction_order, FragmentFlow};
use stagec_planner::env::CompileEnv;
use stagec_planner::model::StageModel;
use stagec_planner::names::NameGenerator;
use stagec_planner::StageAnalyzer;
use stagec_shuffle::{ShuffleAnalyzer, ShuffleCodec, ShuffleModel};

use crate::error::Result;
use crate::metrics::report_compiled;
use crate::runtime::{ShuffleBuffer, SinkBuffer, TaskContext};
use crate::tasks::{CombineTask, MapTask, ReduceTask};

pub struct StageCompiler {
    env: CompileEnv,
}

impl StageCompiler {
    pub fn new(env: CompileEnv) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &CompileEnv {
        &self.env
    }

    pub fn compile(&self, stage: StageBlock) -> Result<CompiledStage> {
        let started_ms = now_millis();
        let config = &self.env.config;
        config.validate()?;
        let mut names = NameGenerator::with_prefix(config.name_prefix.clone());

        let model = StageAnalyzer::new(&self.env).analyze(Arc::new(stage), &mut names)?;
        let shuffle = if model.stage().has_reduce_blocks() {
            ShuffleAnalyzer::new(&self.env).analyze(&model)?
        } else {
            ShuffleModel::empty()
        };
        let codec = ShuffleCodec::derive(&shuffle, &model, config.combine);

        let map_flow = FragmentFlow::map(&model, &shuffle, &mut names)?;
        check_construction_order(&map_flow)?;
        let combine_flow = if codec.combinable.is_empty() {
            None
        } else {
            let flow = FragmentFlow::combine(&model, &shuffle, &codec.combinable, &mut names)?;
            check_construction_order(&flow)?;
            Some(flow)
        };
        let reduce_flow = if model.reduce_units().is_empty() {
            None
        } else {
            let flow = FragmentFlow::reduce(&model, &shuffle, &mut names)?;
            check_construction_order(&flow)?;
            Some(flow)
        };

        let mut manifest = CompileManifest::new(model.number(), model.fingerprint()?, started_ms);
        if !shuffle.is_empty() {
            manifest.codec_hash = Some(codec.fingerprint()?);
        }
        manifest.map_units = model.map_units().len();
        manifest.reduce_units = model.reduce_units().len();
        manifest.segments = shuffle.len();
        manifest.combinable = combine_flow.is_some();
        let manifest = manifest.finish(now_millis());

        report_compiled(&manifest);

        Ok(CompiledStage {
            model,
            codec,
            map_flow,
            combine_flow,
            reduce_flow,
            manifest,
            config: config.clone(),
            shapes: Arc::clone(&self.env.shapes),
        })
    }
}

/// Everything a stage's tasks are built from.
pub struct CompiledStage {
    pub model: StageModel,
    pub codec: ShuffleCodec,
    pub map_flow: FragmentFlow,
    pub combine_flow: Option<FragmentFlow>,
    pub reduce_flow: Option<FragmentFlow>,
    pub manifest: CompileManifest,
    pub config: CompilerConfig,
    pub shapes: Arc<dyn ShapeRegistry>,
}

impl CompiledStage {
    pub fn map_task(&self) -> MapTask {
        MapTask::new(self.map_flow.clone())
    }

    pub fn combine_task(&self) -> Option<CombineTask> {
        self.combine_flow
            .as_ref()
            .map(|flow| CombineTask::new(flow.clone(), self.codec.dispatch.clone()))
    }

    pub fn reduce_task(&self) -> Option<ReduceTask> {
        self.reduce_flow
            .as_ref()
            .map(|flow| ReduceTask::new(flow.clone(), self.codec.dispatch.clone()))
    }

    /// Task context writing shuffle output to `shuffle` and sink `i` to `sinks[i]`.
    pub fn context(&self, shuffle: ShuffleBuffer, sinks: Vec<SinkBuffer>) -> TaskContext {
        TaskContext {
            shapes: Arc::clone(&self.shapes),
            keys: self.codec.keys.clone(),
            shuffle,
            sinks,
        }
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.model.sinks().iter().map(|s| s.name.as_str()).collect()
    }

    pub fn explain(&self) -> String {
        crate::explain::render(self)
    }
}

impl std::fmt::Debug for CompiledStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledStage")
            .field("stage", &self.model.number())
            .field("manifest", &self.manifest)
            .finish()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
