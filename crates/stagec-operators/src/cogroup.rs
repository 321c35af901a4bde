//! `cogroup`: collects one key group from every input and re-emits it.
//!
//! Records from input `i` leave through output `i` (or the last output when
//! there are fewer outputs than inputs). Not decomposable: a partial
//! application would split groups that must be seen whole.

use stagec_core::types::Record;

use crate::collector::{Collector, Downstream};
use crate::traits::{BuildContext, OpError, Processor, ProcessorKind, Rendezvous};

#[derive(Debug, Default)]
pub struct CoGroup;

impl Processor for CoGroup {
    fn name(&self) -> &'static str {
        "cogroup"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Rendezvous
    }

    fn rendezvous(&self, ctx: &BuildContext<'_>) -> Result<Box<dyn Rendezvous>, OpError> {
        let inputs = ctx.element.inputs.len();
        if inputs == 0 {
            return Err(OpError::Build(format!(
                "cogroup {} has no inputs",
                ctx.element.name
            )));
        }
        Ok(Box::new(CoGroupOp {
            buffers: vec![Vec::new(); inputs],
        }))
    }
}

struct CoGroupOp {
    buffers: Vec<Vec<Record>>,
}

impl Rendezvous for CoGroupOp {
    fn begin(&mut self) -> Result<(), OpError> {
        for buf in &mut self.buffers {
            buf.clear();
        }
        Ok(())
    }

    fn process(&mut self, port: u32, input: &mut Record) -> Result<(), OpError> {
        let buf = self
            .buffers
            .get_mut(port as usize)
            .ok_or_else(|| OpError::Exec(format!("cogroup has no input {}", port)))?;
        buf.push(input.clone());
        Ok(())
    }

    fn end(&mut self, outputs: &mut [Downstream]) -> Result<(), OpError> {
        if outputs.is_empty() {
            return Ok(());
        }
        let last = outputs.len() - 1;
        for (port, buf) in self.buffers.iter_mut().enumerate() {
            let out = &mut outputs[port.min(last)];
            for record in buf.iter_mut() {
                out.add(record)?;
            }
            buf.clear();
        }
        Ok(())
    }
}
