use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use stagec_core::block::BlockPortRef;
use stagec_core::config::CompilerConfig;
use stagec_core::id::{BlockId, PortId};
use stagec_core::types::{Record, Scalar};
use stagec_exec::{CompiledStage, LocalExchange, StageCompiler};
use stagec_operators::Registry;
use stagec_planner::{parse_yaml_stage, CompileEnv};
use stagec_shuffle::{ByteComparator, ObjectComparator};

const STAGE: &str = r#"
stage: 1
shapes:
  - name: sale
    fields:
      - { name: store, type: Int32 }
      - { name: region, type: Utf8 }
      - { name: amount, type: Int64, nullable: true }
blocks:
  - id: 1
    side: map
    elements:
      - { name: read, op: identity, inputs: [{name: in, shape: sale}], outputs: [{name: out, shape: sale}] }
    inputs:
      - { port: read.in }
    outputs:
      - { port: read.out }
  - id: 2
    side: reduce
    elements:
      - name: total
        op: fold
        params: { sum: [amount] }
        inputs: [{ name: in, shape: sale, key: { group: [region, store], order: [{ property: amount, direction: desc }] } }]
        outputs: [{ name: out, shape: sale }]
    inputs:
      - { port: total.in }
    outputs:
      - { port: total.out, targets: [{block: 200, index: 0}] }
connections:
  - { from: {block: 1, index: 0}, to: {block: 2, index: 0} }
"#;

fn compiled() -> CompiledStage {
    let parsed = parse_yaml_stage(STAGE).unwrap();
    let env = CompileEnv::new(
        CompilerConfig::default(),
        Arc::new(Registry::with_builtins()),
        Arc::new(parsed.shapes.clone()),
    );
    StageCompiler::new(env).compile(parsed.stage).unwrap()
}

fn make_records(rows: usize) -> Vec<Record> {
    (0..rows)
        .map(|i| {
            Record::new(vec![
                Scalar::I32((i % 97) as i32),
                Scalar::Str(format!("region-{}", i % 5)),
                if i % 11 == 0 {
                    Scalar::Null
                } else {
                    Scalar::I64((i * 7919 % 1000) as i64)
                },
            ])
        })
        .collect()
}

fn make_keys(stage: &CompiledStage, rows: usize) -> Vec<Vec<u8>> {
    make_records(rows)
        .iter()
        .map(|r| {
            let key = stage.codec.keys.key_of(PortId::new(0), r).unwrap();
            stage.codec.keys.encode(&key).unwrap()
        })
        .collect()
}

fn bench_comparators(c: &mut Criterion) {
    let stage = compiled();
    let keys = make_keys(&stage, 4096);
    let decoded: Vec<_> = keys
        .iter()
        .map(|k| stage.codec.keys.decode(k).unwrap())
        .collect();

    c.bench_function("sort_bytes", |b| {
        b.iter(|| {
            let mut keys = keys.clone();
            keys.sort_by(|x, y| {
                stage
                    .codec
                    .sort
                    .try_compare_bytes(x, y)
                    .unwrap_or(Ordering::Equal)
            });
            keys
        })
    });
    c.bench_function("sort_objects", |b| {
        b.iter(|| {
            let mut keys = decoded.clone();
            keys.sort_by(|x, y| stage.codec.sort.try_compare(x, y).unwrap_or(Ordering::Equal));
            keys
        })
    });
}

fn bench_partitioner(c: &mut Criterion) {
    let stage = compiled();
    let keys = make_keys(&stage, 4096);
    c.bench_function("partition_bytes", |b| {
        b.iter(|| {
            keys.iter()
                .map(|k| stage.codec.partitioner.try_partition(k, 16).unwrap())
                .fold(0u64, |acc, p| acc + u64::from(p))
        })
    });
}

fn bench_exchange(c: &mut Criterion) {
    let stage = compiled();
    let mut inputs = BTreeMap::new();
    inputs.insert(BlockPortRef::new(BlockId::new(1), 0), make_records(4096));
    c.bench_function("local_exchange", |b| {
        b.iter(|| {
            let _ = LocalExchange::new(&stage).run(&inputs).unwrap();
        })
    });
}

criterion_group!(codec, bench_comparators, bench_partitioner);
criterion_group!(exchange, bench_exchange);
criterion_main!(codec, exchange);
