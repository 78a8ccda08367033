//! Index declarations.

use std::fmt;

/// Direction of an index key or a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// Returns the conventional numeric form (`1` or `-1`).
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }

    /// Parses the numeric form; any negative number is descending.
    #[must_use]
    pub const fn from_i32(n: i32) -> Self {
        if n < 0 {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// Options attached to an index declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexOptions {
    /// Whether the index rejects duplicate keys.
    pub unique: bool,
    /// Whether records missing every indexed field are skipped.
    pub sparse: bool,
    /// Explicit index name; generated from the keys when absent.
    pub name: Option<String>,
}

impl IndexOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Makes the index sparse.
    #[must_use]
    pub fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }

    /// Sets an explicit index name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Specification of one single-field or compound index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Ordered index keys.
    pub keys: Vec<(String, SortDirection)>,
    /// Index options.
    pub options: IndexOptions,
}

impl IndexSpec {
    /// An ascending index on one field.
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            keys: vec![(name.into(), SortDirection::Ascending)],
            options: IndexOptions::default(),
        }
    }

    /// A compound index over several keys.
    pub fn compound<K: Into<String>>(keys: impl IntoIterator<Item = (K, SortDirection)>) -> Self {
        Self {
            keys: keys.into_iter().map(|(k, d)| (k.into(), d)).collect(),
            options: IndexOptions::default(),
        }
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the index name: the explicit one, or `field_dir` segments
    /// joined by `_` (for example `subject_-1_body_-1`).
    #[must_use]
    pub fn name(&self) -> String {
        if let Some(name) = &self.options.name {
            return name.clone();
        }
        self.keys
            .iter()
            .map(|(field, dir)| format!("{field}_{dir}"))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// The implicit primary key index every collection carries.
    #[must_use]
    pub fn primary() -> Self {
        Self::field("_id").with_options(IndexOptions::new().unique().named("_id_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_field_name() {
        assert_eq!(IndexSpec::field("username").name(), "username_1");
    }

    #[test]
    fn compound_name() {
        let spec = IndexSpec::compound([
            ("subject", SortDirection::Descending),
            ("body", SortDirection::Descending),
        ]);
        assert_eq!(spec.name(), "subject_-1_body_-1");
    }

    #[test]
    fn explicit_name_wins() {
        let spec = IndexSpec::field("a").with_options(IndexOptions::new().named("by_a"));
        assert_eq!(spec.name(), "by_a");
    }

    #[test]
    fn direction_numeric_form() {
        assert_eq!(SortDirection::from_i32(-1), SortDirection::Descending);
        assert_eq!(SortDirection::from_i32(1), SortDirection::Ascending);
        assert_eq!(SortDirection::Descending.as_i32(), -1);
    }

    #[test]
    fn primary_index_is_unique() {
        let primary = IndexSpec::primary();
        assert!(primary.options.unique);
        assert_eq!(primary.name(), "_id_");
    }
}
