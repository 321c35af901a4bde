//! `fold`: sums numeric properties over each key group.
//!
//! The first record of a group seeds the accumulator; later records add
//! their `sum` properties into it. Folding is associative, so the operator is
//! partial-combinable unless its description sets `partial: false`.

use stagec_core::flow::OperatorDesc;
use stagec_core::schema::DataType;
use stagec_core::types::{Record, Scalar};

use crate::collector::{Collector, Downstream};
use crate::traits::{BuildContext, OpError, Processor, ProcessorKind, Rendezvous};

#[derive(Debug, Default)]
pub struct Fold;

impl Processor for Fold {
    fn name(&self) -> &'static str {
        "fold"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Rendezvous
    }

    fn is_partial(&self, desc: &OperatorDesc) -> bool {
        desc.param_bool("partial").unwrap_or(true)
    }

    fn rendezvous(&self, ctx: &BuildContext<'_>) -> Result<Box<dyn Rendezvous>, OpError> {
        let element = ctx.element;
        if element.inputs.len() != 1 || element.outputs.len() != 1 {
            return Err(OpError::Build(format!(
                "fold {} needs exactly one input and one output",
                element.name
            )));
        }
        if element.inputs[0].shape != element.outputs[0].shape {
            return Err(OpError::Schema(format!(
                "fold {} must produce its input shape '{}'",
                element.name, element.inputs[0].shape
            )));
        }
        let schema = ctx.input_schema(0)?;
        let columns = ctx.desc().param_strings("sum").unwrap_or_default();
        let mut targets = Vec::with_capacity(columns.len());
        for col in &columns {
            let idx = schema
                .index_of(col)
                .ok_or_else(|| OpError::Schema(format!("column '{}' not found", col)))?;
            let dt = schema.fields[idx].data_type;
            if !matches!(
                dt,
                DataType::Int32 | DataType::Int64 | DataType::Float32 | DataType::Float64
            ) {
                return Err(OpError::Schema(format!(
                    "cannot sum column '{}' of type {:?}",
                    col, dt
                )));
            }
            targets.push(idx);
        }
        Ok(Box::new(FoldOp {
            targets,
            acc: None,
        }))
    }
}

struct FoldOp {
    targets: Vec<usize>,
    acc: Option<Record>,
}

impl Rendezvous for FoldOp {
    fn begin(&mut self) -> Result<(), OpError> {
        self.acc = None;
        Ok(())
    }

    fn process(&mut self, _port: u32, input: &mut Record) -> Result<(), OpError> {
        let Some(acc) = self.acc.as_mut() else {
            self.acc = Some(input.clone());
            return Ok(());
        };
        for &idx in &self.targets {
            let rhs = input
                .get(idx)
                .ok_or_else(|| OpError::Exec(format!("record has no property {}", idx)))?;
            let lhs = acc
                .get(idx)
                .ok_or_else(|| OpError::Exec(format!("group seed has no property {}", idx)))?;
            let sum = add(lhs, rhs)?;
            acc.set(idx, sum)?;
        }
        Ok(())
    }

    fn end(&mut self, outputs: &mut [Downstream]) -> Result<(), OpError> {
        let Some(mut acc) = self.acc.take() else {
            return Ok(());
        };
        match outputs.first_mut() {
            Some(out) => out.add(&mut acc),
            None => Ok(()),
        }
    }
}

fn add(lhs: &Scalar, rhs: &Scalar) -> Result<Scalar, OpError> {
    use Scalar::*;
    Ok(match (lhs, rhs) {
        (Null, v) | (v, Null) => v.clone(),
        (I32(a), I32(b)) => I32(a.wrapping_add(*b)),
        (I64(a), I64(b)) => I64(a.wrapping_add(*b)),
        (F32(a), F32(b)) => F32(a + b),
        (F64(a), F64(b)) => F64(a + b),
        (a, b) => {
            return Err(OpError::Exec(format!("cannot add {:?} and {:?}", a, b)));
        }
    })
}
