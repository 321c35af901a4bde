//! Stage passes sharing one diagnostic sink.

mod common;

use std::sync::Arc;

use stagec_core::block::StageBlock;
use stagec_core::config::CompilerConfig;
use stagec_core::diag::Diagnostics;
use stagec_core::flow::OperatorDesc;
use stagec_exec::{ExecError, StageCompiler};
use stagec_operators::registry::ProcessorRegistry;
use stagec_operators::traits::Processor;
use stagec_planner::{CompileEnv, PlanError};

use common::{parse, registry, TOTALS};

fn shared_compiler(yaml: &str, sink: &Arc<Diagnostics>) -> (StageCompiler, StageBlock) {
    let parsed = parse(yaml);
    let env = CompileEnv::new(
        CompilerConfig::default(),
        Arc::new(registry()),
        Arc::new(parsed.shapes.clone()),
    )
    .with_diagnostics(Arc::clone(sink));
    (StageCompiler::new(env), parsed.stage)
}

fn broken() -> String {
    TOTALS.replace("op: fold", "op: nosuch")
}

/// Reports an unrelated error on every lookup, the way a concurrent pass
/// would while this stage is being decomposed.
struct Interleaved {
    inner: stagec_operators::Registry,
    sink: Arc<Diagnostics>,
}

impl ProcessorRegistry for Interleaved {
    fn find(&self, desc: &OperatorDesc) -> Option<Arc<dyn Processor>> {
        self.sink.error("elsewhere", "unrelated stage failed");
        self.inner.find(desc)
    }
}

#[test]
fn foreign_errors_do_not_fail_a_clean_stage() {
    let sink = Arc::new(Diagnostics::new());
    let parsed = parse(TOTALS);
    let env = CompileEnv::new(
        CompilerConfig::default(),
        Arc::new(Interleaved {
            inner: registry(),
            sink: Arc::clone(&sink),
        }),
        Arc::new(parsed.shapes.clone()),
    )
    .with_diagnostics(Arc::clone(&sink));

    let compiled = StageCompiler::new(env).compile(parsed.stage).unwrap();
    assert_eq!(compiled.sink_names(), vec!["result1"]);
    assert!(sink.error_count() > 0);
    assert!(sink
        .error_messages()
        .iter()
        .all(|m| m == "unrelated stage failed"));
}

#[test]
fn broken_stage_counts_only_its_own_errors() {
    let sink = Arc::new(Diagnostics::new());
    sink.error("elsewhere", "earlier failure");
    let (compiler, stage) = shared_compiler(&broken(), &sink);

    let err = compiler.compile(stage).unwrap_err();
    assert!(
        matches!(
            err,
            ExecError::Plan(PlanError::Diagnosed {
                phase: "decompose",
                errors: 1
            })
        ),
        "{}",
        err
    );
    assert_eq!(sink.error_count(), 2);
}

#[test]
fn parallel_stages_share_one_sink() {
    const ROUNDS: usize = 200;
    let sink = Arc::new(Diagnostics::new());

    std::thread::scope(|s| {
        let clean = s.spawn(|| {
            (0..ROUNDS)
                .filter(|_| {
                    let (compiler, stage) = shared_compiler(TOTALS, &sink);
                    compiler.compile(stage).is_err()
                })
                .count()
        });
        let failing = s.spawn(|| {
            (0..ROUNDS)
                .filter(|_| {
                    let (compiler, stage) = shared_compiler(&broken(), &sink);
                    compiler.compile(stage).is_err()
                })
                .count()
        });
        assert_eq!(clean.join().unwrap(), 0);
        assert_eq!(failing.join().unwrap(), ROUNDS);
    });

    let messages = sink.error_messages();
    assert_eq!(messages.len(), ROUNDS);
    assert!(messages.iter().all(|m| m.contains("'nosuch'")));
}
