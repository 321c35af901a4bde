//! Stage document parsing: shapes, ports, inline rows and config overrides.

mod common;

use stagec_core::prelude::{BlockId, BlockPortRef, CompilerConfig, ShapeRegistry};
use stagec_core::types::Scalar::{Null, I32, I64};
use stagec_planner::{parse_yaml_stage, DslError};

use common::{record, FANOUT, TOTALS};

fn invalid(yaml: &str) -> String {
    match parse_yaml_stage(yaml) {
        Err(DslError::Invalid(msg)) => msg,
        Err(other) => panic!("expected an invalid document, got {}", other),
        Ok(parsed) => panic!("stage {} parsed", parsed.stage.number),
    }
}

#[test]
fn rows_are_typed_by_the_input_shape() {
    let parsed = parse_yaml_stage(TOTALS).unwrap();
    let rows = &parsed.inputs[&BlockPortRef::new(BlockId::new(1), 0)];
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0], record(vec![I32(1), I64(10)]));
    assert_eq!(rows[3], record(vec![I32(3), Null]));
    assert!(parsed.shapes.shape("sale").is_some());
}

#[test]
fn blocks_are_split_by_side() {
    let parsed = parse_yaml_stage(TOTALS).unwrap();
    assert_eq!(parsed.stage.map_blocks.len(), 1);
    assert_eq!(parsed.stage.reduce_blocks.len(), 1);

    let parsed = parse_yaml_stage(FANOUT).unwrap();
    assert!(parsed.stage.reduce_blocks.is_empty());
    assert_eq!(parsed.stage.map_blocks[0].graph.wires().len(), 3);
}

#[test]
fn config_overrides_layer_over_defaults() {
    let yaml = TOTALS.replace(
        "stage: 1\n",
        "stage: 1\nconfig: { partitions: 9, verify_comparators: true }\n",
    );
    let parsed = parse_yaml_stage(&yaml).unwrap();
    let mut config = CompilerConfig::default();
    parsed.config.apply(&mut config);
    assert_eq!(config.partitions, 9);
    assert!(config.verify_comparators);
    assert!(config.combine);
    assert_eq!(config.name_prefix, "");
}

#[test]
fn unknown_field_type_is_rejected() {
    let msg = invalid(&TOTALS.replace("type: Int64", "type: Money"));
    assert!(msg.contains("Money"), "{}", msg);
}

#[test]
fn duplicate_shape_is_rejected() {
    let yaml = TOTALS.replace(
        "blocks:\n",
        "  - name: sale\n    fields: [{ name: x, type: Int32 }]\nblocks:\n",
    );
    let msg = invalid(&yaml);
    assert!(msg.contains("duplicate shape"), "{}", msg);
}

#[test]
fn duplicate_element_name_is_rejected() {
    let msg = invalid(&FANOUT.replace("name: keep,", "name: copy,"));
    assert!(msg.contains("duplicate element 'copy'"), "{}", msg);
}

#[test]
fn port_without_element_prefix_is_rejected() {
    let msg = invalid(&FANOUT.replace("to: keep.in", "to: keepin"));
    assert!(msg.contains("keepin"), "{}", msg);
}

#[test]
fn rows_for_unknown_input_are_rejected() {
    let msg = invalid(&TOTALS.replace("{ block: 1, index: 0, rows:", "{ block: 1, index: 3, rows:"));
    assert!(msg.contains("unknown block input"), "{}", msg);
}

#[test]
fn ill_typed_row_is_reported() {
    let yaml = TOTALS.replace("[[1, 10], [2, 7]", "[[\"one\", 10], [2, 7]");
    assert!(matches!(parse_yaml_stage(&yaml), Err(DslError::Core(_))));
}

#[test]
fn malformed_yaml_is_a_yaml_error() {
    assert!(matches!(
        parse_yaml_stage("blocks: [ {id: 1"),
        Err(DslError::Yaml(_))
    ));
}
