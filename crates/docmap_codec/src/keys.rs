//! Storage key escaping.
//!
//! Document stores reserve `$` and `.` in field names, while embedded maps
//! in the object model may use any text as a key. Before a record is
//! written every map key is rewritten with [`KEY_REPLACEMENTS`]; after it is
//! read the rewrite is undone.
//!
//! Only map keys are touched. String values pass through unchanged, and
//! sequences are walked so maps nested inside lists are escaped too.
//!
//! Keys that already contain an escape token (for example a literal
//! `&period;`) are outside the reversible domain.

use crate::value::{Record, Value};

/// Forbidden character to escape token, applied in order when escaping and
/// in reverse order when unescaping.
pub const KEY_REPLACEMENTS: [(&str, &str); 2] = [("$", "&dollar;"), (".", "&period;")];

/// Escapes a single key for storage.
#[must_use]
pub fn escape_key(key: &str) -> String {
    KEY_REPLACEMENTS
        .iter()
        .fold(key.to_string(), |acc, (raw, token)| acc.replace(raw, token))
}

/// Reverses [`escape_key`].
#[must_use]
pub fn unescape_key(key: &str) -> String {
    KEY_REPLACEMENTS
        .iter()
        .rev()
        .fold(key.to_string(), |acc, (raw, token)| acc.replace(token, raw))
}

/// Returns true if the key needs escaping before it can be stored.
#[must_use]
pub fn needs_escape(key: &str) -> bool {
    KEY_REPLACEMENTS.iter().any(|(raw, _)| key.contains(raw))
}

/// Escapes every map key in a value tree.
#[must_use]
pub fn escape_value(value: Value) -> Value {
    rewrite_value(value, &escape_key)
}

/// Unescapes every map key in a value tree.
#[must_use]
pub fn unescape_value(value: Value) -> Value {
    rewrite_value(value, &unescape_key)
}

/// Escapes every key of a record, recursively.
#[must_use]
pub fn escape_record(record: Record) -> Record {
    rewrite_record(record, &escape_key)
}

/// Unescapes every key of a record, recursively.
#[must_use]
pub fn unescape_record(record: Record) -> Record {
    rewrite_record(record, &unescape_key)
}

fn rewrite_record(record: Record, rewrite: &dyn Fn(&str) -> String) -> Record {
    record
        .into_iter()
        .map(|(k, v)| (rewrite(&k), rewrite_value(v, rewrite)))
        .collect()
}

fn rewrite_value(value: Value, rewrite: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Map(m) => Value::Map(rewrite_record(m, rewrite)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| rewrite_value(item, rewrite))
                .collect(),
        ),
        other => other,
    }
}
