//! Human-readable rendering of a compiled stage.

use std::collections::BTreeSet;
use std::fmt::Write;

use stagec_core::id::NodeId;
use stagec_flow::{FlowNode, FragmentFlow};
use stagec_planner::model::Unit;
use stagec_shuffle::model::Segment;

use crate::compiler::CompiledStage;

pub fn render(compiled: &CompiledStage) -> String {
    let mut out = String::new();
    // Writing into a String never fails.
    let _ = write_plan(&mut out, compiled);
    out
}

fn write_plan(out: &mut String, compiled: &CompiledStage) -> std::fmt::Result {
    let model = &compiled.model;
    let title = format!("Stage {} Compilation Plan", model.number());
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", "=".repeat(title.len()))?;
    writeln!(out)?;

    writeln!(out, "Units:")?;
    for unit in model.units() {
        write_unit(out, unit)?;
    }
    writeln!(out)?;

    let segments = compiled.codec.model.segments();
    writeln!(out, "Segments: {}", segments.len())?;
    for segment in segments {
        write_segment(out, segment, &compiled.codec.combinable)?;
    }
    writeln!(out)?;

    writeln!(out, "Sinks:")?;
    for sink in model.sinks() {
        let outputs: Vec<String> = sink.outputs.iter().map(ToString::to_string).collect();
        let targets: Vec<String> = sink.targets.iter().map(ToString::to_string).collect();
        writeln!(
            out,
            "  {} <- [{}] -> [{}]",
            sink.name,
            outputs.join(", "),
            targets.join(", ")
        )?;
    }
    writeln!(out)?;

    writeln!(out, "Flows:")?;
    write_flow(out, "map", &compiled.map_flow)?;
    if let Some(flow) = &compiled.combine_flow {
        write_flow(out, "combine", flow)?;
    }
    if let Some(flow) = &compiled.reduce_flow {
        write_flow(out, "reduce", flow)?;
    }
    writeln!(out)?;

    let manifest = &compiled.manifest;
    writeln!(out, "Manifest:")?;
    writeln!(out, "  Model hash: {}", manifest.model_hash)?;
    if let Some(codec) = &manifest.codec_hash {
        writeln!(out, "  Codec hash: {}", codec)?;
    }
    writeln!(out, "  Compiler: {}", manifest.compiler_version)?;
    writeln!(
        out,
        "  Duration: {}ms",
        manifest.finished_ms.saturating_sub(manifest.started_ms)
    )?;
    Ok(())
}

fn write_unit(out: &mut String, unit: &Unit) -> std::fmt::Result {
    let inputs: Vec<String> = unit.inputs().iter().map(ToString::to_string).collect();
    let fragments: Vec<String> = unit.fragments().iter().map(|f| f.label()).collect();
    writeln!(
        out,
        "  {:?} #{} inputs [{}]: {}",
        unit.kind(),
        unit.serial().unwrap_or_default(),
        inputs.join(", "),
        fragments.join(" | ")
    )?;
    if unit.can_combine() {
        writeln!(out, "    combinable")?;
    }
    Ok(())
}

fn write_segment(
    out: &mut String,
    segment: &Segment,
    combinable: &BTreeSet<NodeId>,
) -> std::fmt::Result {
    writeln!(
        out,
        "  port {} element {} ({} {}) {} -> {}{}",
        segment.port_id,
        segment.element_id,
        segment.element_name,
        segment.port,
        segment.source_shape,
        segment.target_shape,
        if combinable.contains(&segment.element) {
            " [combine]"
        } else {
            ""
        }
    )?;
    for term in &segment.terms {
        writeln!(
            out,
            "    {}. {} {:?} {:?}",
            term.term_id, term.property, term.data_type, term.arrangement
        )?;
    }
    Ok(())
}

fn write_flow(out: &mut String, label: &str, flow: &FragmentFlow) -> std::fmt::Result {
    writeln!(out, "  {} ({} nodes):", label, flow.construction_order().len())?;
    for (i, key) in flow.construction_order().iter().enumerate() {
        let name = flow.name(*key).unwrap_or("?");
        let detail = match flow.node(*key) {
            Some(FlowNode::Line(f)) | Some(FlowNode::Rendezvous(f)) => f.label(),
            Some(FlowNode::Shuffle(_)) | Some(FlowNode::Output(_)) | None => key.to_string(),
        };
        writeln!(out, "    {}. {} = {}", i + 1, name, detail)?;
    }
    for slot in flow.resources() {
        writeln!(out, "    resource {}", slot.name)?;
    }
    Ok(())
}
