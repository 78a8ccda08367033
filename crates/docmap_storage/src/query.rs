//! Filters, sort specifications and update documents.
//!
//! Filters are plain records compared by equality. A key may be a dotted
//! path into embedded maps, and a filter value matches an array field when
//! the array contains it.

use crate::index::SortDirection;
use docmap_codec::{Record, Value};
use std::cmp::Ordering;

/// Field name under which every record stores its primary key.
pub const PRIMARY_KEY: &str = "_id";

/// Options for [`crate::DocumentCollection::find`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Ordered sort keys; empty keeps insertion order.
    pub sort: Vec<(String, SortDirection)>,
    /// Number of leading matches to skip.
    pub skip: usize,
    /// Maximum number of records returned.
    pub limit: Option<usize>,
}

impl FindOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sort key.
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push((field.into(), direction));
        self
    }

    /// Sets the number of matches to skip.
    #[must_use]
    pub const fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Sets the maximum number of records returned.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A partial write: fields to set and fields to remove.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    /// Fields assigned by `$set`.
    pub set: Record,
    /// Fields removed by `$unset`.
    pub unset: Vec<String>,
}

impl Update {
    /// A `$set` of every field in `fields`.
    #[must_use]
    pub fn set(fields: Record) -> Self {
        Self {
            set: fields,
            unset: Vec::new(),
        }
    }

    /// An `$unset` of one field.
    pub fn unset(field: impl Into<String>) -> Self {
        Self {
            set: Record::new(),
            unset: vec![field.into()],
        }
    }

    /// Returns true if the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Applies the update to a record in place.
    pub fn apply(&self, record: &mut Record) {
        for (k, v) in &self.set {
            record.insert(k.clone(), v.clone());
        }
        for k in &self.unset {
            record.remove(k);
        }
    }
}

/// Resolves a dotted path inside a record.
#[must_use]
pub fn lookup_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = record.get(first)?;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Returns true if `record` satisfies every equality in `filter`.
#[must_use]
pub fn matches(record: &Record, filter: &Record) -> bool {
    filter
        .iter()
        .all(|(path, expected)| match lookup_path(record, path) {
            None => expected.is_null(),
            Some(Value::Array(items)) if !matches!(expected, Value::Array(_)) => {
                items.iter().any(|item| values_equal(item, expected))
            }
            Some(actual) => values_equal(actual, expected),
        })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a.cmp_total(b) == Ordering::Equal
}

/// Orders two records by a sort specification.
#[must_use]
pub fn compare_records(a: &Record, b: &Record, sort: &[(String, SortDirection)]) -> Ordering {
    for (path, direction) in sort {
        let av = lookup_path(a, path).unwrap_or(&Value::Null);
        let bv = lookup_path(b, path).unwrap_or(&Value::Null);
        let ord = match direction {
            SortDirection::Ascending => av.cmp_total(bv),
            SortDirection::Descending => bv.cmp_total(av),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: Vec<(&str, Value)>) -> Record {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn equality_match() {
        let rec = record(vec![("name", Value::from("bob")), ("age", Value::from(3))]);
        assert!(matches(&rec, &record(vec![("name", Value::from("bob"))])));
        assert!(!matches(&rec, &record(vec![("name", Value::from("al"))])));
        assert!(matches(&rec, &Record::new()));
    }

    #[test]
    fn integer_matches_equal_float() {
        let rec = record(vec![("n", Value::Integer(2))]);
        assert!(matches(&rec, &record(vec![("n", Value::Float(2.0))])));
    }

    #[test]
    fn missing_field_matches_null() {
        let rec = record(vec![("a", Value::from(1))]);
        assert!(matches(&rec, &record(vec![("b", Value::Null)])));
        assert!(!matches(&rec, &record(vec![("b", Value::from(1))])));
    }

    #[test]
    fn array_contains_match() {
        let rec = record(vec![("tags", Value::from(vec!["x", "y"]))]);
        assert!(matches(&rec, &record(vec![("tags", Value::from("y"))])));
        assert!(!matches(&rec, &record(vec![("tags", Value::from("z"))])));
        assert!(matches(
            &rec,
            &record(vec![("tags", Value::from(vec!["x", "y"]))])
        ));
    }

    #[test]
    fn dotted_path_match() {
        let rec = record(vec![(
            "data",
            Value::map([("height", Value::Float(100.0))]),
        )]);
        assert!(matches(
            &rec,
            &record(vec![("data.height", Value::Float(100.0))])
        ));
    }

    #[test]
    fn sort_by_multiple_keys() {
        let a = record(vec![("x", Value::from(1)), ("y", Value::from("b"))]);
        let b = record(vec![("x", Value::from(1)), ("y", Value::from("a"))]);
        let sort = vec![
            ("x".to_string(), SortDirection::Ascending),
            ("y".to_string(), SortDirection::Descending),
        ];
        assert_eq!(compare_records(&a, &b, &sort), Ordering::Less);
    }

    #[test]
    fn update_apply() {
        let mut rec = record(vec![("a", Value::from(1)), ("b", Value::from(2))]);
        Update::set(record(vec![("a", Value::from(5))])).apply(&mut rec);
        Update::unset("b").apply(&mut rec);
        assert_eq!(rec, record(vec![("a", Value::from(5))]));
    }
}
