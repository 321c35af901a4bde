//! Segment discovery for a stage's exchange.
//!
//! Rendezvous elements are visited in reduce-block input order; each gets the
//! next element id. Every input port of an element becomes one segment, and
//! a port id is handed out only once its segment resolved cleanly.

use std::collections::BTreeSet;
use std::sync::Arc;

use stagec_core::block::{FlowBlock, StageBlock};
use stagec_core::diag::DiagScope;
use stagec_core::flow::{FlowElement, PortDecl, ShuffleKeySpec};
use stagec_core::id::{ElementId, PortId};
use stagec_core::schema::Schema;
use stagec_planner::env::CompileEnv;
use stagec_planner::model::StageModel;

use crate::error::{Result, ShuffleError};
use crate::model::{Arrangement, Segment, ShuffleModel, Term};

const PHASE: &str = "shuffle";

pub struct ShuffleAnalyzer<'e> {
    env: &'e CompileEnv,
    diag: DiagScope<'e>,
    next_element: u32,
    next_port: u32,
}

impl<'e> ShuffleAnalyzer<'e> {
    pub fn new(env: &'e CompileEnv) -> Self {
        Self {
            env,
            diag: env.diagnostics.scope(),
            next_element: 0,
            next_port: 0,
        }
    }

    pub fn analyze(&mut self, model: &StageModel) -> Result<ShuffleModel> {
        let stage = model.stage();
        let before = self.diag.error_count();

        let mut seen = BTreeSet::new();
        let mut segments = Vec::new();
        for block in &stage.reduce_blocks {
            for input in &block.inputs {
                let node = input.port.node;
                if !seen.insert(node) {
                    continue;
                }
                let Some(element) = block.graph.element(node) else {
                    continue;
                };
                let built = self.element_segments(stage, block, element);
                self.check_grouping(element, &built);
                segments.extend(built);
            }
        }

        let errors = self.diag.error_count() - before;
        if errors > 0 {
            return Err(ShuffleError::Diagnosed {
                phase: PHASE,
                errors,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            stage = stage.number,
            elements = seen.len(),
            segments = segments.len(),
            "shuffle analyzed"
        );

        Ok(ShuffleModel::new(segments))
    }

    fn element_segments(
        &mut self,
        stage: &StageBlock,
        block: &FlowBlock,
        element: &Arc<FlowElement>,
    ) -> Vec<Segment> {
        let element_id = ElementId::new(self.next_element);
        self.next_element += 1;

        // A missing handler was already reported during decomposition.
        let processor = self.env.processors.find(&element.desc);
        let mut built = Vec::new();
        for (index, decl) in element.inputs.iter().enumerate() {
            let key = match &processor {
                Some(p) => p.shuffle_key(element, index as u32),
                None => decl.key.clone(),
            }
            .unwrap_or_default();
            if let Some(segment) =
                self.segment(stage, block, element, element_id, index as u32, decl, &key)
            {
                built.push(segment);
            }
        }
        built
    }

    #[allow(clippy::too_many_arguments)]
    fn segment(
        &mut self,
        stage: &StageBlock,
        block: &FlowBlock,
        element: &FlowElement,
        element_id: ElementId,
        index: u32,
        decl: &PortDecl,
        key: &ShuffleKeySpec,
    ) -> Option<Segment> {
        let env = self.env;
        let port = element.input_port(index);
        let Some(schema) = env.shapes.shape(&decl.shape) else {
            self.diag.error(
                PHASE,
                format!(
                    "{}.{}: unknown record shape '{}'",
                    element.name, decl.name, decl.shape
                ),
            );
            return None;
        };

        let mut consumed = false;
        let mut source_shape = decl.shape.clone();
        let sources = block
            .inputs
            .iter()
            .filter(|i| i.port == port)
            .flat_map(|i| i.sources.iter());
        for source in sources {
            if !stage.map_blocks.iter().any(|b| b.id == source.block) {
                continue;
            }
            consumed = true;
            let shape = stage
                .output(*source)
                .and_then(|out| {
                    stage
                        .block(source.block)
                        .and_then(|b| b.graph.element(out.port.node))
                        .and_then(|e| e.outputs.get(out.port.index as usize))
                })
                .map(|p| p.shape.clone());
            if let Some(shape) = shape {
                source_shape = shape;
            }
        }
        if source_shape != decl.shape {
            self.diag.error(
                PHASE,
                format!(
                    "{}.{}: source shape '{}' differs from '{}'",
                    element.name, decl.name, source_shape, decl.shape
                ),
            );
            return None;
        }

        let terms = self.terms(element, decl, schema, key)?;
        let port_id = PortId::new(self.next_port);
        self.next_port += 1;
        Some(Segment {
            element_id,
            port_id,
            port,
            element: element.id,
            element_name: element.name.clone(),
            source_shape,
            target_shape: decl.shape.clone(),
            schema: schema.clone(),
            terms,
            consumed,
        })
    }

    /// Grouping terms first, then sort terms; every unresolved name is reported.
    fn terms(
        &self,
        element: &FlowElement,
        decl: &PortDecl,
        schema: &Schema,
        key: &ShuffleKeySpec,
    ) -> Option<Vec<Term>> {
        let wanted = key
            .group
            .iter()
            .map(|name| (name, Arrangement::Grouping))
            .chain(
                key.order
                    .iter()
                    .map(|k| (&k.property, Arrangement::from(k.direction))),
            );
        let mut terms = Vec::new();
        let mut ok = true;
        for (name, arrangement) in wanted {
            let resolved = schema
                .index_of(name)
                .and_then(|i| schema.field(i).map(|f| (i, f.data_type)));
            match resolved {
                Some((index, data_type)) => terms.push(Term {
                    term_id: terms.len() as u32 + 1,
                    property: name.clone(),
                    index,
                    data_type,
                    arrangement,
                }),
                None => {
                    ok = false;
                    self.diag.error(
                        PHASE,
                        format!(
                            "{}.{}: shape '{}' has no property '{}'",
                            element.name, decl.name, decl.shape, name
                        ),
                    );
                }
            }
        }
        ok.then_some(terms)
    }

    /// One error per element whose segments disagree on grouping terms.
    fn check_grouping(&self, element: &FlowElement, built: &[Segment]) {
        let Some((first, rest)) = built.split_first() else {
            return;
        };
        let expected = first.grouping_types();
        if let Some(other) = rest.iter().find(|s| s.grouping_types() != expected) {
            self.diag.error(
                PHASE,
                format!(
                    "{}: grouping of port {} {:?} is incompatible with port {} {:?}",
                    element.name,
                    first.port.index,
                    expected,
                    other.port.index,
                    other.grouping_types()
                ),
            );
        }
    }
}
