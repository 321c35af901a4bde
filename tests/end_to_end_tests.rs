//! Compile-then-run scenarios through the in-memory exchange.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use stagec_core::block::BlockPortRef;
use stagec_core::config::CompilerConfig;
use stagec_core::id::{BlockId, PortId};
use stagec_core::types::Scalar::{Null, Str, I32, I64};
use stagec_exec::{ExecError, LocalExchange, StageCompiler};

use common::{compile, env_for, join_with, parse, record, sorted, sorted_join, TOTALS};

fn store_totals() -> Vec<stagec_core::types::Record> {
    vec![
        record(vec![I32(1), I64(16)]),
        record(vec![I32(2), I64(8)]),
        record(vec![I32(3), Null]),
    ]
}

#[test]
fn fold_totals_match_with_and_without_combine() {
    let (parsed, compiled) = compile(TOTALS);
    assert!(compiled.combine_task().is_some());
    let combined = LocalExchange::new(&compiled).run(&parsed.inputs).unwrap();
    assert_eq!(sorted(combined.sinks["result1"].clone()), store_totals());
    assert_eq!(combined.stats.input_records, 6);
    assert_eq!(combined.stats.shuffled, 6);
    assert_eq!(combined.stats.combined, 3);
    assert_eq!(combined.stats.groups, 3);
    assert_eq!(combined.stats.sink_records, 3);

    let plain = TOTALS.replace("stage: 1\n", "stage: 1\nconfig: { combine: false }\n");
    let (parsed, compiled) = compile(&plain);
    assert!(compiled.combine_task().is_none());
    assert!(!compiled.manifest.combinable);
    let output = LocalExchange::new(&compiled).run(&parsed.inputs).unwrap();
    assert_eq!(sorted(output.sinks["result1"].clone()), store_totals());
    assert_eq!(output.stats.combined, 6);
    assert_eq!(output.stats.groups, 3);
}

#[test]
fn partition_count_does_not_change_results() {
    let (parsed, compiled) = compile(TOTALS);
    for partitions in [1, 2, 7] {
        let output = LocalExchange::new(&compiled)
            .with_partitions(partitions)
            .run(&parsed.inputs)
            .unwrap();
        assert_eq!(output.stats.partitions, partitions);
        assert_eq!(output.stats.groups, 3);
        assert_eq!(sorted(output.sinks["result1"].clone()), store_totals());
    }
}

#[test]
fn zero_partitions_fail_the_run() {
    let (parsed, compiled) = compile(TOTALS);
    let result = LocalExchange::new(&compiled)
        .with_partitions(0)
        .run(&parsed.inputs);
    assert!(matches!(result, Err(ExecError::Shuffle(_))));
}

#[test]
fn verified_sort_accepts_consistent_comparators() {
    let yaml = TOTALS.replace(
        "key: { group: [store] }",
        "key: { group: [store], order: [{ property: amount, direction: desc }] }",
    );
    let (parsed, compiled) = compile(&yaml);
    let output = LocalExchange::new(&compiled)
        .with_verification(true)
        .with_partitions(1)
        .run(&parsed.inputs)
        .unwrap();
    assert_eq!(sorted(output.sinks["result1"].clone()), store_totals());
}

#[test]
fn two_input_rendezvous_combines_both_segments() {
    let (parsed, compiled) = compile(&join_with("first"));
    let ports = vec![PortId::new(0), PortId::new(1)];
    assert_eq!(compiled.reduce_task().unwrap().ports(), ports);
    assert_eq!(compiled.combine_task().unwrap().ports(), ports);

    let output = LocalExchange::new(&compiled).run(&parsed.inputs).unwrap();
    assert_eq!(output.stats.shuffled, 6);
    assert_eq!(output.stats.combined, 4);
    assert_eq!(
        sorted(output.sinks["result1"].clone()),
        vec![
            record(vec![I32(1), Str("a".into())]),
            record(vec![I32(2), Str("b".into())]),
        ]
    );
    assert_eq!(
        sorted(output.sinks["result2"].clone()),
        vec![
            record(vec![I32(1), Str("x".into())]),
            record(vec![I32(3), Str("y".into())]),
        ]
    );
}

#[test]
fn groups_follow_each_segment_order_under_verification() {
    let (parsed, compiled) = compile(&sorted_join("first"));
    let output = LocalExchange::new(&compiled)
        .with_verification(true)
        .with_partitions(3)
        .run(&parsed.inputs)
        .unwrap();
    assert_eq!(output.stats.groups, 3);
    // first of each group: smallest `v` on the left, largest on the right
    assert_eq!(
        sorted(output.sinks["result1"].clone()),
        vec![
            record(vec![I32(1), Str("a".into())]),
            record(vec![I32(2), Str("c".into())]),
        ]
    );
    assert_eq!(
        sorted(output.sinks["result2"].clone()),
        vec![
            record(vec![I32(1), Str("z".into())]),
            record(vec![I32(3), Str("y".into())]),
        ]
    );
}

#[test]
fn cogroup_keeps_every_record_and_skips_combine() {
    let (parsed, compiled) = compile(&join_with("cogroup"));
    assert!(compiled.combine_task().is_none());
    assert!(compiled.combine_flow.is_none());

    let output = LocalExchange::new(&compiled).run(&parsed.inputs).unwrap();
    assert_eq!(output.stats.combined, output.stats.shuffled);
    let left = &parsed.inputs[&BlockPortRef::new(BlockId::new(1), 0)];
    let right = &parsed.inputs[&BlockPortRef::new(BlockId::new(1), 1)];
    assert_eq!(sorted(output.sinks["result1"].clone()), sorted(left.clone()));
    assert_eq!(sorted(output.sinks["result2"].clone()), sorted(right.clone()));
    // keys 1, 2 and 3
    assert_eq!(output.stats.groups, 3);
}

#[test]
fn short_records_fail_the_run_instead_of_panicking() {
    let (_, compiled) = compile(TOTALS);
    let mut inputs = std::collections::BTreeMap::new();
    inputs.insert(
        BlockPortRef::new(BlockId::new(1), 0),
        vec![record(vec![I32(1)]), record(vec![I32(1), I64(3)])],
    );
    let result = LocalExchange::new(&compiled).run(&inputs);
    assert!(matches!(result, Err(ExecError::Operator(_))));
}

#[test]
fn manifest_hashes_are_stable_across_compiles() {
    let (_, first) = compile(TOTALS);
    let (_, second) = compile(TOTALS);
    assert_ne!(first.manifest.id, second.manifest.id);
    assert_eq!(first.manifest.model_hash, second.manifest.model_hash);
    assert!(first.manifest.codec_hash.is_some());
    assert_eq!(first.manifest.codec_hash, second.manifest.codec_hash);
    assert_eq!(first.manifest.fingerprint(), second.manifest.fingerprint());
    assert_eq!(first.manifest.stage, 1);
    assert_eq!(first.manifest.map_units, 1);
    assert_eq!(first.manifest.reduce_units, 1);
    assert_eq!(first.manifest.segments, 1);
    assert!(first.manifest.finished_ms >= first.manifest.started_ms);
}

#[test]
fn explain_lists_units_segments_and_flows() {
    let (_, compiled) = compile(TOTALS);
    let text = compiled.explain();
    assert!(text.starts_with("Stage 1 Compilation Plan"));
    assert!(text.contains("Segments: 1"));
    assert!(text.contains("result1"));
    assert!(text.contains("Manifest"));
}

#[test]
fn invalid_config_is_rejected_before_analysis() {
    let parsed = parse(TOTALS);
    let config = CompilerConfig {
        partitions: 0,
        ..CompilerConfig::default()
    };
    let compiler = StageCompiler::new(env_for(&parsed, config));
    let err = compiler.compile(parsed.stage.clone()).unwrap_err();
    assert!(matches!(err, ExecError::Core(_)));
    assert!(!compiler.env().has_error());
}

#[test]
fn map_task_enforces_its_lifecycle() {
    let (_, compiled) = compile(TOTALS);
    let input = BlockPortRef::new(BlockId::new(1), 0);
    let mut row = record(vec![I32(1), I64(1)]);
    let ctx = || {
        compiled.context(
            Rc::new(RefCell::new(Vec::new())),
            vec![Rc::new(RefCell::new(Vec::new()))],
        )
    };

    let mut task = compiled.map_task();
    assert_eq!(task.inputs(), vec![input]);
    assert!(matches!(task.run(input, &mut row), Err(ExecError::Lifecycle(_))));

    task.setup(&ctx()).unwrap();
    assert!(matches!(task.setup(&ctx()), Err(ExecError::Lifecycle(_))));
    let stray = BlockPortRef::new(BlockId::new(1), 5);
    assert!(matches!(task.run(stray, &mut row), Err(ExecError::UnknownInput(p)) if p == stray));
    task.run(input, &mut row).unwrap();
    task.cleanup();

    // cleanup leaves the task reusable
    task.setup(&ctx()).unwrap();
    task.cleanup();
}
