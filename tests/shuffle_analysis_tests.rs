//! Segment discovery: element/port numbering, terms, and reported mismatches.

mod common;

use stagec_core::id::{ElementId, PortId};
use stagec_exec::ExecError;
use stagec_shuffle::{Arrangement, ShuffleError};

const TWO_FOLDS: &str = r#"
shapes:
  - name: sale
    fields:
      - { name: store, type: Int32 }
      - { name: amount, type: Int64 }
blocks:
  - id: 1
    side: map
    elements:
      - { name: a, op: identity, inputs: [{name: in, shape: sale}], outputs: [{name: out, shape: sale}] }
      - { name: b, op: identity, inputs: [{name: in, shape: sale}], outputs: [{name: out, shape: sale}] }
    inputs:
      - { port: a.in }
      - { port: b.in }
    outputs:
      - { port: a.out }
      - { port: b.out }
  - id: 2
    side: reduce
    elements:
      - name: by_store
        op: fold
        params: { sum: [amount] }
        inputs: [{ name: in, shape: sale, key: { group: [store], order: [{ property: amount, direction: desc }] } }]
        outputs: [{ name: out, shape: sale }]
      - name: by_amount
        op: fold
        inputs: [{ name: in, shape: sale, key: { group: [amount] } }]
        outputs: [{ name: out, shape: sale }]
    inputs:
      - { port: by_store.in }
      - { port: by_amount.in }
    outputs:
      - { port: by_store.out }
      - { port: by_amount.out }
connections:
  - { from: {block: 1, index: 0}, to: {block: 2, index: 0} }
  - { from: {block: 1, index: 1}, to: {block: 2, index: 1} }
"#;

fn shuffle_failure(yaml: &str) -> (usize, Vec<String>) {
    let parsed = common::parse(yaml);
    let compiler = common::compiler_for(&parsed);
    match compiler.compile(parsed.stage.clone()) {
        Err(ExecError::Shuffle(ShuffleError::Diagnosed { phase, errors })) => {
            assert_eq!(phase, "shuffle");
            (errors, compiler.env().diagnostics.error_messages())
        }
        other => panic!("expected shuffle diagnostics, got {:?}", other.map(|c| c.manifest.stage)),
    }
}

#[test]
fn multi_input_rendezvous_shares_one_element_id() {
    let (_, compiled) = common::compile(&common::join_with("cogroup"));
    let segments = compiled.codec.model.segments();

    assert_eq!(segments.len(), 2);
    assert!(segments.iter().all(|s| s.element_id == ElementId::new(0)));
    assert_eq!(
        compiled.codec.model.port_ids(),
        vec![PortId::new(0), PortId::new(1)]
    );
    assert_eq!(segments[0].port.index, 0);
    assert_eq!(segments[1].port.index, 1);
    assert!(segments.iter().all(|s| s.consumed));
    assert_eq!(segments[0].element_name, "meet");
}

#[test]
fn elements_and_ports_are_numbered_in_input_order() {
    let (_, compiled) = common::compile(TWO_FOLDS);
    let segments = compiled.codec.model.segments();

    let ids: Vec<(u32, u32)> = segments
        .iter()
        .map(|s| (s.element_id.get(), s.port_id.get()))
        .collect();
    assert_eq!(ids, vec![(0, 0), (1, 1)]);
    assert_eq!(compiled.codec.model.by_element(ElementId::new(1)).count(), 1);
}

#[test]
fn grouping_terms_precede_sort_terms() {
    let (_, compiled) = common::compile(TWO_FOLDS);
    let terms = &compiled.codec.model.segments()[0].terms;

    assert_eq!(terms.len(), 2);
    assert_eq!(terms[0].term_id, 1);
    assert_eq!(terms[0].property, "store");
    assert_eq!(terms[0].arrangement, Arrangement::Grouping);
    assert_eq!(terms[1].term_id, 2);
    assert_eq!(terms[1].property, "amount");
    assert_eq!(terms[1].arrangement, Arrangement::Descending);
}

#[test]
fn incompatible_grouping_reports_one_error_per_element() {
    let yaml = common::join_with("cogroup").replace(
        "{ name: r, shape: kv, key: { group: [k] } }",
        "{ name: r, shape: kv, key: { group: [v] } }",
    );
    let (errors, messages) = shuffle_failure(&yaml);

    assert_eq!(errors, 1);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("meet"));
}

#[test]
fn unknown_key_property_is_reported() {
    let yaml = common::TOTALS.replace("group: [store]", "group: [region]");
    let (errors, messages) = shuffle_failure(&yaml);

    assert_eq!(errors, 1);
    assert!(messages[0].contains("region"));
}

#[test]
fn source_shape_must_match_target_shape() {
    let yaml = common::TOTALS
        .replace(
            "outputs: [{name: out, shape: sale}] }\n    inputs:",
            "outputs: [{name: out, shape: other}] }\n    inputs:",
        )
        .replace(
            "blocks:\n",
            "  - name: other\n    fields:\n      - { name: store, type: Int32 }\n      - { name: amount, type: Int64, nullable: true }\nblocks:\n",
        );
    let (errors, messages) = shuffle_failure(&yaml);

    assert_eq!(errors, 1);
    assert!(messages[0].contains("other"));
}

#[test]
fn map_only_stage_has_no_segments() {
    let (_, compiled) = common::compile(common::FANOUT);
    assert!(compiled.codec.model.is_empty());
    assert!(compiled.manifest.codec_hash.is_none());
    assert!(compiled.reduce_flow.is_none());
}
