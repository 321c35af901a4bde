//! `branch`: routes each record by a simple predicate.
//!
//! Supports expressions of the form: "col OP literal" where OP ∈ {==, !=, <, <=, >, >=}.
//! Matching records go to output 0, the rest to output 1 (dropped if the
//! element declares a single output). Null properties never match.

use std::cmp::Ordering;

use stagec_core::schema::DataType;
use stagec_core::types::{scalar_cmp, Record, Scalar};

use crate::collector::{Collector, Downstream};
use crate::traits::{BuildContext, LineEnd, OpError, Processor, ProcessorKind};

#[derive(Debug, Default)]
pub struct Branch;

impl Processor for Branch {
    fn name(&self) -> &'static str {
        "branch"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::LineEnd
    }

    fn line_end(&self, ctx: &BuildContext<'_>) -> Result<Box<dyn LineEnd>, OpError> {
        let expr = ctx.param("expr")?;
        let (col, op, literal) = parse_simple_predicate(expr)?;
        let schema = ctx.input_schema(0)?;
        let index = schema
            .index_of(&col)
            .ok_or_else(|| OpError::Schema(format!("column '{}' not found", col)))?;
        let dtype = schema.fields[index].data_type;
        if dtype == DataType::Binary {
            return Err(OpError::Build("cannot branch on binary data".into()));
        }
        let literal = Scalar::parse_literal(&literal, dtype)?;
        Ok(Box::new(BranchOp {
            index,
            op,
            literal,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

struct BranchOp {
    index: usize,
    op: CmpOp,
    literal: Scalar,
}

impl BranchOp {
    fn matches(&self, record: &Record) -> Result<bool, OpError> {
        let value = record
            .get(self.index)
            .ok_or_else(|| OpError::Exec(format!("record has no property {}", self.index)))?;
        if value.is_null() || self.literal.is_null() {
            return Ok(false);
        }
        let ord = scalar_cmp(value, &self.literal);
        Ok(match self.op {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        })
    }
}

impl LineEnd for BranchOp {
    fn process(&mut self, input: &mut Record, outputs: &mut [Downstream]) -> Result<(), OpError> {
        let port = if self.matches(input)? { 0 } else { 1 };
        match outputs.get_mut(port) {
            Some(out) => out.add(input),
            None => Ok(()),
        }
    }
}

/// Parse a simple predicate like "age > 18" or "name == Alice"
fn parse_simple_predicate(expr: &str) -> Result<(String, CmpOp, String), OpError> {
    let ops = [
        ("==", CmpOp::Eq),
        ("!=", CmpOp::Ne),
        ("<=", CmpOp::Le),
        (">=", CmpOp::Ge),
        ("<", CmpOp::Lt),
        (">", CmpOp::Gt),
    ];

    for (text, op) in ops {
        if let Some(pos) = expr.find(text) {
            let col = expr[..pos].trim().to_string();
            let lit = expr[pos + text.len()..].trim().to_string();
            if col.is_empty() {
                break;
            }
            return Ok((col, op, lit));
        }
    }

    Err(OpError::Build(format!("unparseable predicate: {}", expr)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_char_operators_first() {
        let (col, op, lit) = parse_simple_predicate("age >= 18").unwrap();
        assert_eq!(col, "age");
        assert_eq!(op, CmpOp::Ge);
        assert_eq!(lit, "18");
        assert!(parse_simple_predicate("nonsense").is_err());
    }
}
