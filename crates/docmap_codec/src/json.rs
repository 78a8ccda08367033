//! Conversion between document values and plain JSON.
//!
//! Object ids render as their hex text, bytes as an array of numbers and
//! timestamps as epoch seconds.
//! Incoming JSON integers that fit in an `i64` stay integers; every other
//! number becomes a float.

use crate::error::CodecResult;
use crate::value::{Record, Value};
use serde_json::{Map, Number};

impl Value {
    /// Converts this value into a plain JSON tree.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) | Value::Timestamp(n) => serde_json::Value::Number((*n).into()),
            Value::Float(n) => Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => {
                serde_json::Value::Array(b.iter().map(|byte| (*byte).into()).collect())
            }
            Value::ObjectId(id) => serde_json::Value::String(id.to_hex()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(record_to_json(entries)),
        }
    }

    /// Builds a value from a plain JSON tree.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Converts a record into a JSON object.
#[must_use]
pub fn record_to_json(record: &Record) -> Map<String, serde_json::Value> {
    record
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect()
}

/// Renders a JSON tree as pretty-printed text with four-space indentation.
///
/// Object keys come out sorted because `serde_json` maps are ordered.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_pretty_json(json: &serde_json::Value) -> CodecResult<String> {
    use serde::Serialize;

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    json.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
