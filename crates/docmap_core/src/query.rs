//! Field-equality queries over an entity type.

use crate::reference::Assign;
use docmap_storage::{FindOptions, SortDirection};

/// An equality query in logical field names.
///
/// Documents given as values match by id, `id` addresses the primary key,
/// and dotted paths reach into nested maps.
///
/// # Example
///
/// ```rust
/// use docmap_core::Query;
/// use docmap_storage::SortDirection;
///
/// let query = Query::new()
///     .eq("lang", "en")
///     .sort("username", SortDirection::Ascending)
///     .limit(10);
/// assert_eq!(query.conditions().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    conditions: Vec<(String, Assign)>,
    sort: Vec<(String, SortDirection)>,
    skip: usize,
    limit: Option<usize>,
}

impl Query {
    /// A query matching every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A query for one id.
    #[must_use]
    pub fn by_id(id: impl Into<Assign>) -> Self {
        Self::new().eq(crate::schema::ID_FIELD, id)
    }

    /// Adds an equality condition.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Assign>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Adds a sort key.
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push((field.into(), direction));
        self
    }

    /// Skips the first `n` matches.
    #[must_use]
    pub const fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    /// Returns at most `n` matches.
    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Returns the equality conditions.
    #[must_use]
    pub fn conditions(&self) -> &[(String, Assign)] {
        &self.conditions
    }

    /// Returns true if the query is exactly one `id` condition.
    #[must_use]
    pub fn is_by_id(&self) -> bool {
        matches!(self.conditions.as_slice(), [(field, _)] if field == crate::schema::ID_FIELD)
    }

    pub(crate) fn into_parts(self) -> (Vec<(String, Assign)>, FindOptions) {
        let mut options = FindOptions::new().skip(self.skip);
        if let Some(limit) = self.limit {
            options = options.limit(limit);
        }
        for (field, direction) in self.sort {
            options = options.sort(storage_path(&field), direction);
        }
        (self.conditions, options)
    }
}

/// Maps a logical field path to its storage path.
pub(crate) fn storage_path(field: &str) -> String {
    let (head, rest) = match field.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (field, None),
    };
    let head = if head == crate::schema::ID_FIELD {
        docmap_storage::PRIMARY_KEY
    } else {
        head
    };
    match rest {
        Some(rest) => format!("{head}.{rest}"),
        None => head.to_string(),
    }
}
