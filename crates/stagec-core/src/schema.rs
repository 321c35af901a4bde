//! Record shapes. Pure data; the shuffle crate derives codecs from these.
//!
//! A *shape* is a named `Schema`. Key specifications refer to properties by
//! name; `ShapeRegistry` resolves them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Binary,
    /// Milliseconds since epoch, carried as `Scalar::I64`.
    Date64,
}

impl DataType {
    /// Parse the spellings accepted by the YAML DSL.
    pub fn parse(s: &str) -> Option<DataType> {
        Some(match s {
            "Boolean" | "bool" => DataType::Boolean,
            "Int32" | "i32" | "int32" => DataType::Int32,
            "Int64" | "i64" | "int64" => DataType::Int64,
            "Float32" | "f32" | "float32" => DataType::Float32,
            "Float64" | "f64" | "float64" => DataType::Float64,
            "Utf8" | "string" | "utf8" => DataType::Utf8,
            "Binary" | "bytes" => DataType::Binary,
            "Date64" | "date" => DataType::Date64,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Resolves record shapes by name.
///
/// Unknown shapes are `None`; callers report them on the diagnostic sink.
pub trait ShapeRegistry: Send + Sync {
    fn shape(&self, name: &str) -> Option<&Schema>;
}

/// Map-backed registry, the only implementation the compiler ships.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShapeCatalog {
    shapes: BTreeMap<String, Schema>,
}

impl ShapeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, schema: Schema) -> Option<Schema> {
        self.shapes.insert(name.into(), schema)
    }

    pub fn with(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.insert(name, schema);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.shapes.keys().map(|s| s.as_str())
    }
}

impl ShapeRegistry for ShapeCatalog {
    fn shape(&self, name: &str) -> Option<&Schema> {
        self.shapes.get(name)
    }
}
