//! `lookup`: enriches a record from a side table.
//!
//! Parameters: `resource` (table name), `key` (property whose text form is
//! looked up), `target` (property receiving the parsed entry, or null when
//! the key is absent).

use stagec_core::types::{Record, Scalar};

use crate::resource::ResourceHandle;
use crate::traits::{BuildContext, LinePart, OpError, Processor, ProcessorKind};
use stagec_core::schema::DataType;

#[derive(Debug, Default)]
pub struct Lookup;

impl Processor for Lookup {
    fn name(&self) -> &'static str {
        "lookup"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::LinePart
    }

    fn line_part(&self, ctx: &BuildContext<'_>) -> Result<Box<dyn LinePart>, OpError> {
        let schema = ctx.input_schema(0)?;
        let key_col = ctx.param("key")?;
        let target_col = ctx.param("target")?;
        let key = schema
            .index_of(key_col)
            .ok_or_else(|| OpError::Schema(format!("column '{}' not found", key_col)))?;
        let target = schema
            .index_of(target_col)
            .ok_or_else(|| OpError::Schema(format!("column '{}' not found", target_col)))?;
        let table = ctx.resource(ctx.param("resource")?)?;
        Ok(Box::new(LookupOp {
            key,
            target,
            target_type: schema.fields[target].data_type,
            table,
        }))
    }
}

struct LookupOp {
    key: usize,
    target: usize,
    target_type: DataType,
    table: ResourceHandle,
}

impl LinePart for LookupOp {
    fn apply<'a>(&'a mut self, input: &'a mut Record) -> Result<&'a mut Record, OpError> {
        let probe = match input.get(self.key) {
            Some(Scalar::Null) | None => None,
            Some(Scalar::Str(s)) => Some(s.clone()),
            Some(Scalar::Bool(b)) => Some(b.to_string()),
            Some(Scalar::I32(v)) => Some(v.to_string()),
            Some(Scalar::I64(v)) => Some(v.to_string()),
            Some(other) => {
                return Err(OpError::Exec(format!("cannot look up by {:?}", other)));
            }
        };
        let value = match probe {
            Some(k) => {
                let table = self.table.borrow();
                match table.get(&k)? {
                    Some(text) => Scalar::parse_literal(text, self.target_type)?,
                    None => Scalar::Null,
                }
            }
            None => Scalar::Null,
        };
        input.set(self.target, value)?;
        Ok(input)
    }
}
