//! Shared stage documents and helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use stagec_core::config::CompilerConfig;
use stagec_core::flow::OperatorDesc;
use stagec_core::types::{scalar_tuple_cmp, Record, Scalar};
use stagec_exec::{CompiledStage, StageCompiler};
use stagec_operators::collector::{Collector, Downstream};
use stagec_operators::traits::{BuildContext, OpError, Processor, ProcessorKind, Rendezvous};
use stagec_operators::Registry;
use stagec_planner::{parse_yaml_stage, CompileEnv, ParsedStage};

/// One map block feeding a summing fold over `store`.
pub const TOTALS: &str = r#"
stage: 1
shapes:
  - name: sale
    fields:
      - { name: store, type: Int32 }
      - { name: amount, type: Int64, nullable: true }
blocks:
  - id: 1
    side: map
    elements:
      - { name: read, op: identity, inputs: [{name: in, shape: sale}], outputs: [{name: out, shape: sale}] }
    inputs:
      - { port: read.in, sources: [{block: 100, index: 0}] }
    outputs:
      - { port: read.out }
  - id: 2
    side: reduce
    elements:
      - name: total
        op: fold
        params: { sum: [amount] }
        inputs: [{ name: in, shape: sale, key: { group: [store] } }]
        outputs: [{ name: out, shape: sale }]
    inputs:
      - { port: total.in }
    outputs:
      - { port: total.out, targets: [{block: 200, index: 0}] }
connections:
  - { from: {block: 1, index: 0}, to: {block: 2, index: 0} }
inputs:
  - { block: 1, index: 0, rows: [[1, 10], [2, 7], [1, 5], [3, null], [2, 1], [1, 1]] }
"#;

/// Two map inputs meeting in one two-input rendezvous; `@OP` picks its handler.
pub const JOIN: &str = r#"
stage: 2
shapes:
  - name: kv
    fields:
      - { name: k, type: Int32 }
      - { name: v, type: Utf8, nullable: true }
blocks:
  - id: 1
    side: map
    elements:
      - { name: left, op: identity, inputs: [{name: in, shape: kv}], outputs: [{name: out, shape: kv}] }
      - { name: right, op: identity, inputs: [{name: in, shape: kv}], outputs: [{name: out, shape: kv}] }
    inputs:
      - { port: left.in, sources: [{block: 100, index: 0}] }
      - { port: right.in, sources: [{block: 101, index: 0}] }
    outputs:
      - { port: left.out }
      - { port: right.out }
  - id: 2
    side: reduce
    elements:
      - name: meet
        op: "@OP"
        inputs:
          - { name: l, shape: kv, key: { group: [k] } }
          - { name: r, shape: kv, key: { group: [k] } }
        outputs:
          - { name: l, shape: kv }
          - { name: r, shape: kv }
    inputs:
      - { port: meet.l }
      - { port: meet.r }
    outputs:
      - { port: meet.l, targets: [{block: 200, index: 0}] }
      - { port: meet.r, targets: [{block: 200, index: 1}] }
connections:
  - { from: {block: 1, index: 0}, to: {block: 2, index: 0} }
  - { from: {block: 1, index: 1}, to: {block: 2, index: 1} }
inputs:
  - { block: 1, index: 0, rows: [[1, "a"], [1, "a"], [2, "b"]] }
  - { block: 1, index: 1, rows: [[1, "x"], [3, "y"], [3, "y"]] }
"#;

/// Map-only stage: one producer broadcasting to three consumers, the first
/// of which overwrites `amount` in place.
pub const FANOUT: &str = r#"
stage: 3
shapes:
  - name: sale
    fields:
      - { name: store, type: Int32 }
      - { name: amount, type: Int64, nullable: true }
blocks:
  - id: 1
    side: map
    elements:
      - { name: src, op: identity, inputs: [{name: in, shape: sale}], outputs: [{name: out, shape: sale}] }
      - { name: zero, op: set, params: { column: amount, value: 0 }, inputs: [{name: in, shape: sale}], outputs: [{name: out, shape: sale}] }
      - { name: keep, op: identity, inputs: [{name: in, shape: sale}], outputs: [{name: out, shape: sale}] }
      - { name: copy, op: identity, inputs: [{name: in, shape: sale}], outputs: [{name: out, shape: sale}] }
    wires:
      - { from: src.out, to: zero.in }
      - { from: src.out, to: keep.in }
      - { from: src.out, to: copy.in }
    inputs:
      - { port: src.in }
    outputs:
      - { port: zero.out, targets: [{block: 9, index: 0}] }
      - { port: keep.out, targets: [{block: 9, index: 1}] }
      - { port: copy.out, targets: [{block: 9, index: 2}] }
inputs:
  - { block: 1, index: 0, rows: [[1, 10], [2, 20]] }
"#;

pub fn join_with(op: &str) -> String {
    JOIN.replace("@OP", op)
}

/// `join_with`, but `l` orders each group by `v` ascending and `r` by `v`
/// descending.
pub fn sorted_join(op: &str) -> String {
    join_with(op)
        .replace(
            "{ name: l, shape: kv, key: { group: [k] } }",
            "{ name: l, shape: kv, key: { group: [k], order: [{ property: v, direction: asc }] } }",
        )
        .replace(
            "{ name: r, shape: kv, key: { group: [k] } }",
            "{ name: r, shape: kv, key: { group: [k], order: [{ property: v, direction: desc }] } }",
        )
        .replace(
            r#"rows: [[1, "a"], [1, "a"], [2, "b"]]"#,
            r#"rows: [[1, "b"], [1, "a"], [2, "d"], [2, "c"]]"#,
        )
        .replace(
            r#"rows: [[1, "x"], [3, "y"], [3, "y"]]"#,
            r#"rows: [[1, "x"], [1, "z"], [3, "y"]]"#,
        )
}

/// Built-ins plus `first`, a partial two-way rendezvous.
pub fn registry() -> Registry {
    let mut registry = Registry::with_builtins();
    registry.register("first", FirstPerGroup);
    registry
}

pub fn parse(yaml: &str) -> ParsedStage {
    parse_yaml_stage(yaml).expect("stage document parses")
}

pub fn env_for(parsed: &ParsedStage, config: CompilerConfig) -> CompileEnv {
    CompileEnv::new(
        config,
        Arc::new(registry()),
        Arc::new(parsed.shapes.clone()),
    )
}

pub fn compiler_for(parsed: &ParsedStage) -> StageCompiler {
    let mut config = CompilerConfig::default();
    parsed.config.apply(&mut config);
    StageCompiler::new(env_for(parsed, config))
}

pub fn compile(yaml: &str) -> (ParsedStage, CompiledStage) {
    let parsed = parse(yaml);
    let compiled = compiler_for(&parsed)
        .compile(parsed.stage.clone())
        .expect("stage compiles");
    (parsed, compiled)
}

pub fn record(values: Vec<Scalar>) -> Record {
    Record::new(values)
}

/// Records in scalar order, so partition placement does not matter.
pub fn sorted(mut records: Vec<Record>) -> Vec<Record> {
    records.sort_by(|a, b| scalar_tuple_cmp(&a.values, &b.values));
    records
}

/// Keeps the first record of each input per key group; output `i` mirrors
/// input `i`. Idempotent, so it may run before and after the exchange.
#[derive(Debug, Default)]
pub struct FirstPerGroup;

impl Processor for FirstPerGroup {
    fn name(&self) -> &'static str {
        "first"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Rendezvous
    }

    fn is_partial(&self, _desc: &OperatorDesc) -> bool {
        true
    }

    fn rendezvous(&self, ctx: &BuildContext<'_>) -> Result<Box<dyn Rendezvous>, OpError> {
        Ok(Box::new(FirstOp {
            seen: vec![None; ctx.element.inputs.len()],
        }))
    }
}

struct FirstOp {
    seen: Vec<Option<Record>>,
}

impl Rendezvous for FirstOp {
    fn begin(&mut self) -> Result<(), OpError> {
        self.seen.iter_mut().for_each(|s| *s = None);
        Ok(())
    }

    fn process(&mut self, port: u32, input: &mut Record) -> Result<(), OpError> {
        let slot = self
            .seen
            .get_mut(port as usize)
            .ok_or_else(|| OpError::Exec(format!("no input {}", port)))?;
        if slot.is_none() {
            *slot = Some(input.clone());
        }
        Ok(())
    }

    fn end(&mut self, outputs: &mut [Downstream]) -> Result<(), OpError> {
        for (port, slot) in self.seen.iter_mut().enumerate() {
            if let (Some(mut record), Some(out)) = (slot.take(), outputs.get_mut(port)) {
                out.add(&mut record)?;
            }
        }
        Ok(())
    }
}
