//! Lightweight logical values and records.
//!
//! Runtime operators move `Record`s by mutable reference; fan-out copies them
//! into scratch records with `Record::copy_from`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{DataType, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
}

impl Scalar {
    /// Natural type of a non-null value. `Null` has none.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(DataType::Boolean),
            Scalar::I32(_) => Some(DataType::Int32),
            Scalar::I64(_) => Some(DataType::Int64),
            Scalar::F32(_) => Some(DataType::Float32),
            Scalar::F64(_) => Some(DataType::Float64),
            Scalar::Str(_) => Some(DataType::Utf8),
            Scalar::Bin(_) => Some(DataType::Binary),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// True if this value may be stored in a property of type `dt`.
    pub fn conforms_to(&self, dt: DataType) -> bool {
        match (self, dt) {
            (Scalar::Null, _) => true,
            (Scalar::I64(_), DataType::Date64) => true,
            (v, dt) => v.data_type() == Some(dt),
        }
    }

    /// Convert a JSON literal into a value of type `dt`.
    pub fn from_json(value: &serde_json::Value, dt: DataType) -> Result<Scalar> {
        use serde_json::Value as J;
        let bad = || Error::Schema(format!("cannot read {} as {:?}", value, dt));
        Ok(match (value, dt) {
            (J::Null, _) => Scalar::Null,
            (J::Bool(b), DataType::Boolean) => Scalar::Bool(*b),
            (J::Number(n), DataType::Int32) => {
                let v = n.as_i64().ok_or_else(bad)?;
                Scalar::I32(i32::try_from(v).map_err(|_| bad())?)
            }
            (J::Number(n), DataType::Int64 | DataType::Date64) => {
                Scalar::I64(n.as_i64().ok_or_else(bad)?)
            }
            (J::Number(n), DataType::Float32) => Scalar::F32(n.as_f64().ok_or_else(bad)? as f32),
            (J::Number(n), DataType::Float64) => Scalar::F64(n.as_f64().ok_or_else(bad)?),
            (J::String(s), DataType::Utf8) => Scalar::Str(s.clone()),
            (J::String(s), DataType::Binary) => Scalar::Bin(s.as_bytes().to_vec()),
            (J::Array(items), DataType::Binary) => Scalar::Bin(
                items
                    .iter()
                    .map(|i| i.as_u64().and_then(|b| u8::try_from(b).ok()).ok_or_else(bad))
                    .collect::<Result<Vec<u8>>>()?,
            ),
            _ => return Err(bad()),
        })
    }

    /// Parse a textual literal (as written in operator parameters) into `dt`.
    pub fn parse_literal(text: &str, dt: DataType) -> Result<Scalar> {
        let bad = || Error::Schema(format!("cannot parse '{}' as {:?}", text, dt));
        if text == "null" {
            return Ok(Scalar::Null);
        }
        Ok(match dt {
            DataType::Boolean => Scalar::Bool(text.parse().map_err(|_| bad())?),
            DataType::Int32 => Scalar::I32(text.parse().map_err(|_| bad())?),
            DataType::Int64 | DataType::Date64 => Scalar::I64(text.parse().map_err(|_| bad())?),
            DataType::Float32 => Scalar::F32(text.parse().map_err(|_| bad())?),
            DataType::Float64 => Scalar::F64(text.parse().map_err(|_| bad())?),
            DataType::Utf8 => Scalar::Str(text.to_string()),
            DataType::Binary => Scalar::Bin(text.as_bytes().to_vec()),
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Scalar::Null => J::Null,
            Scalar::Bool(b) => J::Bool(*b),
            Scalar::I32(i) => J::from(*i),
            Scalar::I64(i) => J::from(*i),
            Scalar::F32(f) => serde_json::Number::from_f64(f64::from(*f))
                .map(J::Number)
                .unwrap_or(J::Null),
            Scalar::F64(f) => serde_json::Number::from_f64(*f)
                .map(J::Number)
                .unwrap_or(J::Null),
            Scalar::Str(s) => J::String(s.clone()),
            Scalar::Bin(b) => J::Array(b.iter().map(|x| J::from(*x)).collect()),
        }
    }
}

/// One record: positional values laid out by the record's shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub values: Vec<Scalar>,
}

impl Record {
    pub fn new(values: Vec<Scalar>) -> Self {
        Self { values }
    }

    /// All-null record for `schema`.
    pub fn empty(schema: &Schema) -> Self {
        Self {
            values: vec![Scalar::Null; schema.len()],
        }
    }

    pub fn get(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    pub fn set(&mut self, idx: usize, value: Scalar) -> Result<()> {
        let slot = self.values.get_mut(idx).ok_or_else(|| {
            Error::Schema(format!("property index {} out of range", idx))
        })?;
        *slot = value;
        Ok(())
    }

    /// Field-by-field copy reusing this record's allocations.
    pub fn copy_from(&mut self, other: &Record) {
        self.values.clone_from(&other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check arity and per-property types against `schema`.
    pub fn conforms_to(&self, schema: &Schema) -> bool {
        self.values.len() == schema.len()
            && self
                .values
                .iter()
                .zip(&schema.fields)
                .all(|(v, f)| v.conforms_to(f.data_type) && (f.nullable || !v.is_null()))
    }

    /// Read a JSON row (array in shape order) into a record.
    pub fn from_json_row(row: &serde_json::Value, schema: &Schema) -> Result<Record> {
        let items = row
            .as_array()
            .ok_or_else(|| Error::Schema(format!("row {} is not an array", row)))?;
        if items.len() != schema.len() {
            return Err(Error::Schema(format!(
                "row has {} values, shape has {} properties",
                items.len(),
                schema.len()
            )));
        }
        let values = items
            .iter()
            .zip(&schema.fields)
            .map(|(v, f)| Scalar::from_json(v, f.data_type))
            .collect::<Result<Vec<_>>>()?;
        Ok(Record { values })
    }

    pub fn to_json_row(&self) -> serde_json::Value {
        serde_json::Value::Array(self.values.iter().map(Scalar::to_json).collect())
    }
}

/// Compare two scalar tuples lexicographically for sorting.
pub fn scalar_tuple_cmp(a: &[Scalar], b: &[Scalar]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match scalar_cmp(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// Compare two scalars for sorting.
///
/// Nulls are sorted first, NaN sorts after every other float, and `-0.0 == 0.0`.
pub fn scalar_cmp(a: &Scalar, b: &Scalar) -> Ordering {
    use Scalar::*;

    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Bool(x), Bool(y)) => x.cmp(y),
        (I32(x), I32(y)) => x.cmp(y),
        (I64(x), I64(y)) => x.cmp(y),
        (F32(x), F32(y)) => float_cmp(f64::from(*x), f64::from(*y)),
        (F64(x), F64(y)) => float_cmp(*x, *y),
        (Str(x), Str(y)) => x.cmp(y),
        (Bin(x), Bin(y)) => x.cmp(y),
        // Mixed types: order by variant order
        _ => scalar_type_order(a).cmp(&scalar_type_order(b)),
    }
}

/// Float ordering shared by the object and byte comparators.
pub fn float_cmp(x: f64, y: f64) -> Ordering {
    if x.is_nan() && y.is_nan() {
        Ordering::Equal
    } else if x.is_nan() {
        Ordering::Greater
    } else if y.is_nan() {
        Ordering::Less
    } else {
        x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
}

/// Assign a numeric order to scalar types for mixed-type comparisons.
fn scalar_type_order(s: &Scalar) -> u8 {
    use Scalar::*;
    match s {
        Null => 0,
        Bool(_) => 1,
        I32(_) => 2,
        I64(_) => 3,
        F32(_) => 4,
        F64(_) => 5,
        Str(_) => 6,
        Bin(_) => 7,
    }
}
