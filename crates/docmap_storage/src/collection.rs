//! Document collection trait definition.

use crate::error::StorageResult;
use crate::index::IndexSpec;
use crate::query::{FindOptions, Update};
use docmap_codec::Record;
use std::collections::BTreeMap;

/// A handle to one collection of a document store.
///
/// Collections store records whose keys are already in storage form: the
/// primary key lives under `_id` and no key contains `.` or starts with `$`.
/// Collections do not know about schemas, references or identity caching.
///
/// # Invariants
///
/// - `find_one` and `find` return copies; mutating them never touches storage
/// - `update` modifies at most one record (the first match)
/// - `ensure_index` is idempotent
/// - Implementations must be `Send + Sync`; every call may block on I/O
///
/// # Implementors
///
/// - [`super::InMemoryCollection`] - For testing and ephemeral stores
pub trait DocumentCollection: Send + Sync {
    /// Returns the collection name.
    fn name(&self) -> &str;

    /// Returns the first record matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn find_one(&self, filter: &Record) -> StorageResult<Option<Record>>;

    /// Returns every record matching `filter`, sorted and windowed by `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn find(&self, filter: &Record, options: &FindOptions) -> StorageResult<Cursor>;

    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The record has no `_id`
    /// - A key is not legal in storage
    /// - A unique index would be violated
    fn insert(&self, record: Record) -> StorageResult<()>;

    /// Applies `update` to the first record matching `filter`.
    ///
    /// Returns the number of records modified (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns an error if a key is illegal or a unique index would be violated.
    fn update(&self, filter: &Record, update: &Update) -> StorageResult<u64>;

    /// Deletes every record matching `filter`.
    ///
    /// Returns the number of records deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn remove(&self, filter: &Record) -> StorageResult<u64>;

    /// Counts records matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn count(&self, filter: &Record) -> StorageResult<u64>;

    /// Creates the index if it does not exist yet and returns its name.
    ///
    /// # Errors
    ///
    /// Returns an error if the declaration is invalid or existing records
    /// violate a requested unique constraint.
    fn ensure_index(&self, index: &IndexSpec) -> StorageResult<String>;

    /// Returns every index by name, including the implicit `_id_` index.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn index_information(&self) -> StorageResult<BTreeMap<String, IndexSpec>>;
}

/// Records returned by [`DocumentCollection::find`].
#[derive(Debug)]
pub struct Cursor {
    records: std::vec::IntoIter<Record>,
}

impl Cursor {
    /// Wraps an already-materialized result set.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into_iter(),
        }
    }
}

impl Iterator for Cursor {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl ExactSizeIterator for Cursor {}
