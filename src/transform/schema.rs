//! Schema inference over loosely-typed records.
//!
//! Records arrive with whatever fields the remote dataset exposes. The
//! inferred [`TableSchema`] is the superset of their keys in first-seen order,
//! each typed by the widest kind of value observed.

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int32Builder, Int64Builder, StringBuilder,
    TimestampMicrosecondBuilder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::dates::parse_date;
use crate::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    Int32,
    Int64,
    Float64,
    Utf8,
    Timestamp,
}

impl ColumnType {
    pub fn to_arrow(self) -> DataType {
        match self {
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Int32 => DataType::Int32,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }

    /// Kind of a single non-null JSON value.
    fn of_value(value: &Value) -> Option<ColumnType> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnType::Boolean),
            Value::Number(n) if n.is_i64() => Some(ColumnType::Int64),
            Value::Number(_) => Some(ColumnType::Float64),
            Value::String(_) | Value::Array(_) | Value::Object(_) => Some(ColumnType::Utf8),
        }
    }

    /// Smallest type able to hold values of both kinds.
    fn widen(self, other: ColumnType) -> ColumnType {
        use ColumnType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Int64, Float64) | (Float64, Int64) => Float64,
            _ => Utf8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: ColumnType,
    pub nullable: bool,
}

/// Declared output schema: ordered column name → nullable scalar type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Replace the column with the same name in place, or append it.
    pub fn upsert(&mut self, spec: ColumnSpec) {
        match self.position(&spec.name) {
            Some(i) => self.columns[i] = spec,
            None => self.columns.push(spec),
        }
    }

    pub fn to_arrow(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(&c.name, c.data_type.to_arrow(), c.nullable))
            .collect();
        Arc::new(Schema::new(fields))
    }
}

/// Infer the superset schema of `records`.
///
/// Columns appear in order of first appearance. Every column is nullable
/// unless all records carry a non-null value for it. Columns that only ever
/// hold nulls are typed `Utf8`.
pub fn infer_schema(records: &[Record]) -> TableSchema {
    let mut columns: Vec<(String, Option<ColumnType>, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        for (key, value) in record {
            let slot = match index.get(key.as_str()) {
                Some(&slot) => slot,
                None => {
                    columns.push((key.clone(), None, 0));
                    index.insert(key.as_str(), columns.len() - 1);
                    columns.len() - 1
                }
            };

            let (_, kind, present) = &mut columns[slot];
            if let Some(observed) = ColumnType::of_value(value) {
                *present += 1;
                *kind = Some(match *kind {
                    Some(current) => current.widen(observed),
                    None => observed,
                });
            }
        }
    }

    TableSchema::new(
        columns
            .into_iter()
            .map(|(name, kind, present)| ColumnSpec {
                name,
                data_type: kind.unwrap_or(ColumnType::Utf8),
                nullable: present < records.len(),
            })
            .collect(),
    )
}

/// Build an Arrow column for `spec` from the given rows.
///
/// Values are coerced to the declared type; a value that cannot be
/// represented becomes null.
pub fn build_column(rows: &[&Record], spec: &ColumnSpec) -> ArrayRef {
    let values = rows.iter().map(|r| r.get(&spec.name));

    match spec.data_type {
        ColumnType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(rows.len());
            for value in values {
                builder.append_option(value.and_then(Value::as_bool));
            }
            Arc::new(builder.finish())
        }
        ColumnType::Int32 => {
            let mut builder = Int32Builder::with_capacity(rows.len());
            for value in values {
                builder.append_option(value.and_then(integer_value));
            }
            Arc::new(builder.finish())
        }
        ColumnType::Int64 => {
            let mut builder = Int64Builder::with_capacity(rows.len());
            for value in values {
                builder.append_option(value.and_then(Value::as_i64));
            }
            Arc::new(builder.finish())
        }
        ColumnType::Float64 => {
            let mut builder = Float64Builder::with_capacity(rows.len());
            for value in values {
                builder.append_option(value.and_then(Value::as_f64));
            }
            Arc::new(builder.finish())
        }
        ColumnType::Timestamp => {
            let mut builder = TimestampMicrosecondBuilder::with_capacity(rows.len());
            for value in values {
                builder.append_option(
                    value
                        .and_then(parse_date)
                        .map(|dt| dt.and_utc().timestamp_micros()),
                );
            }
            Arc::new(builder.finish())
        }
        ColumnType::Utf8 => {
            let mut builder = StringBuilder::with_capacity(rows.len(), rows.len() * 32);
            for value in values {
                builder.append_option(value.and_then(value_to_string));
            }
            Arc::new(builder.finish())
        }
    }
}

/// Integer reading of a value: integers, integral floats and integer strings.
pub fn integer_value(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).ok(),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i32::MIN as f64 && *f <= i32::MAX as f64)
                .map(|f| f as i32),
        },
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

/// String form of a JSON value; nested values are JSON encoded.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
