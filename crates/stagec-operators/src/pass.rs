//! Pass-through processors: `identity`, `pseudo`, and the placeholder used
//! when an operator has no registration.

use stagec_core::types::Record;

use crate::traits::{BuildContext, LinePart, OpError, Processor, ProcessorKind};

#[derive(Debug, Default)]
pub struct PassThrough;

impl LinePart for PassThrough {
    fn apply<'a>(&'a mut self, input: &'a mut Record) -> Result<&'a mut Record, OpError> {
        Ok(input)
    }
}

#[derive(Debug, Default)]
pub struct Identity;

impl Processor for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::LinePart
    }

    fn line_part(&self, _ctx: &BuildContext<'_>) -> Result<Box<dyn LinePart>, OpError> {
        Ok(Box::new(PassThrough))
    }
}

/// Structural placeholder (block boundaries, checkpoints).
#[derive(Debug, Default)]
pub struct Pseudo;

impl Processor for Pseudo {
    fn name(&self) -> &'static str {
        "pseudo"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Pseudo
    }

    fn line_part(&self, _ctx: &BuildContext<'_>) -> Result<Box<dyn LinePart>, OpError> {
        Ok(Box::new(PassThrough))
    }
}

/// Substituted for unregistered operators so analysis can continue.
#[derive(Debug, Default)]
pub struct Empty;

impl Processor for Empty {
    fn name(&self) -> &'static str {
        "empty"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Pseudo
    }

    fn line_part(&self, _ctx: &BuildContext<'_>) -> Result<Box<dyn LinePart>, OpError> {
        Ok(Box::new(PassThrough))
    }
}
