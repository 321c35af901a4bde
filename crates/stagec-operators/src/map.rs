//! Record-reshaping line parts: `project` (with optional renames) and `set`.

use std::collections::HashMap;

use stagec_core::types::{Record, Scalar};

use crate::traits::{BuildContext, LinePart, OpError, Processor, ProcessorKind};

/// Copies input properties into a record of the output shape, matching by
/// name. `renames` maps input names to output names.
#[derive(Debug, Default)]
pub struct Project;

impl Processor for Project {
    fn name(&self) -> &'static str {
        "project"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::LinePart
    }

    fn line_part(&self, ctx: &BuildContext<'_>) -> Result<Box<dyn LinePart>, OpError> {
        let input = ctx.input_schema(0)?;
        let output = ctx.output_schema(0)?;

        // Rename map: new_name -> old_name
        let mut renamed: HashMap<String, String> = HashMap::new();
        if let Some(obj) = ctx.desc().params.get("renames").and_then(|v| v.as_object()) {
            for (old, new) in obj {
                let new = new.as_str().ok_or_else(|| {
                    OpError::Build(format!("rename target for '{}' must be a string", old))
                })?;
                renamed.insert(new.to_string(), old.clone());
            }
        }

        let mut mapping = Vec::with_capacity(output.len());
        for field in &output.fields {
            let source = renamed.get(&field.name).unwrap_or(&field.name);
            let idx = input.index_of(source).ok_or_else(|| {
                OpError::Schema(format!(
                    "{}: output property '{}' has no source '{}'",
                    ctx.element.name, field.name, source
                ))
            })?;
            mapping.push(idx);
        }

        Ok(Box::new(ProjectOp {
            mapping,
            out: Record::empty(output),
        }))
    }
}

struct ProjectOp {
    mapping: Vec<usize>,
    out: Record,
}

impl LinePart for ProjectOp {
    fn apply<'a>(&'a mut self, input: &'a mut Record) -> Result<&'a mut Record, OpError> {
        for (dst, &src) in self.mapping.iter().enumerate() {
            let value = input
                .values
                .get(src)
                .ok_or_else(|| OpError::Exec(format!("input has no property {}", src)))?;
            self.out.values[dst].clone_from(value);
        }
        Ok(&mut self.out)
    }
}

/// Assigns a constant to one property, in place.
#[derive(Debug, Default)]
pub struct Set;

impl Processor for Set {
    fn name(&self) -> &'static str {
        "set"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::LinePart
    }

    fn line_part(&self, ctx: &BuildContext<'_>) -> Result<Box<dyn LinePart>, OpError> {
        let schema = ctx.input_schema(0)?;
        let column = ctx.param("column")?;
        let index = schema
            .index_of(column)
            .ok_or_else(|| OpError::Schema(format!("column '{}' not found", column)))?;
        let raw = ctx
            .desc()
            .params
            .get("value")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let value = Scalar::from_json(&raw, schema.fields[index].data_type)?;
        Ok(Box::new(SetOp { index, value }))
    }
}

struct SetOp {
    index: usize,
    value: Scalar,
}

impl LinePart for SetOp {
    fn apply<'a>(&'a mut self, input: &'a mut Record) -> Result<&'a mut Record, OpError> {
        input.set(self.index, self.value.clone())?;
        Ok(input)
    }
}
