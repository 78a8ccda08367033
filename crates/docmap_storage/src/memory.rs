//! In-memory document collection.

use crate::collection::{Cursor, DocumentCollection};
use crate::error::{StorageError, StorageResult};
use crate::index::IndexSpec;
use crate::query::{compare_records, lookup_path, matches, FindOptions, Update, PRIMARY_KEY};
use docmap_codec::{Record, Value};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::trace;

/// An in-memory document collection.
///
/// Records are kept in insertion order and every read hands out a deep
/// copy. Key legality and unique indexes are enforced the way a real
/// document store would, so callers that forget to escape keys fail here.
///
/// Suitable for:
/// - Unit and integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// All state sits behind a `RwLock`; the collection can be shared across
/// threads behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use docmap_codec::{ObjectId, Record, Value};
/// use docmap_storage::{DocumentCollection, InMemoryCollection};
///
/// let users = InMemoryCollection::new("user");
/// let mut record = Record::new();
/// record.insert("_id".into(), Value::ObjectId(ObjectId::new()));
/// record.insert("username".into(), Value::from("bob"));
/// users.insert(record).unwrap();
/// assert_eq!(users.count(&Record::new()).unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct InMemoryCollection {
    name: String,
    state: RwLock<State>,
}

#[derive(Debug)]
struct State {
    records: Vec<Record>,
    indexes: BTreeMap<String, IndexSpec>,
}

impl InMemoryCollection {
    /// Creates an empty collection.
    pub fn new(name: impl Into<String>) -> Self {
        let primary = IndexSpec::primary();
        let mut indexes = BTreeMap::new();
        indexes.insert(primary.name(), primary);
        Self {
            name: name.into(),
            state: RwLock::new(State {
                records: Vec::new(),
                indexes,
            }),
        }
    }

    /// Returns copies of every stored record, in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.state.read().records.clone()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Returns true if the collection holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every record and every index except `_id_`.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.records.clear();
        state.indexes.retain(|name, _| name == "_id_");
    }
}

impl DocumentCollection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_one(&self, filter: &Record) -> StorageResult<Option<Record>> {
        let state = self.state.read();
        Ok(state.records.iter().find(|r| matches(r, filter)).cloned())
    }

    fn find(&self, filter: &Record, options: &FindOptions) -> StorageResult<Cursor> {
        let state = self.state.read();
        let mut found: Vec<Record> = state
            .records
            .iter()
            .filter(|r| matches(r, filter))
            .cloned()
            .collect();
        drop(state);

        if !options.sort.is_empty() {
            found.sort_by(|a, b| compare_records(a, b, &options.sort));
        }
        let limit = options.limit.unwrap_or(usize::MAX);
        let window = found.into_iter().skip(options.skip).take(limit).collect();
        Ok(Cursor::new(window))
    }

    fn insert(&self, record: Record) -> StorageResult<()> {
        if !record.contains_key(PRIMARY_KEY) {
            return Err(StorageError::MissingId);
        }
        check_keys(&record)?;

        let mut state = self.state.write();
        check_unique(&state, &record, None)?;
        trace!(collection = %self.name, "insert");
        state.records.push(record);
        Ok(())
    }

    fn update(&self, filter: &Record, update: &Update) -> StorageResult<u64> {
        check_keys(&update.set)?;

        let mut state = self.state.write();
        let Some(pos) = state.records.iter().position(|r| matches(r, filter)) else {
            return Ok(0);
        };

        let mut updated = state.records[pos].clone();
        update.apply(&mut updated);
        check_unique(&state, &updated, Some(pos))?;
        trace!(collection = %self.name, "update");
        state.records[pos] = updated;
        Ok(1)
    }

    fn remove(&self, filter: &Record) -> StorageResult<u64> {
        let mut state = self.state.write();
        let before = state.records.len();
        state.records.retain(|r| !matches(r, filter));
        let removed = (before - state.records.len()) as u64;
        trace!(collection = %self.name, removed, "remove");
        Ok(removed)
    }

    fn count(&self, filter: &Record) -> StorageResult<u64> {
        let state = self.state.read();
        Ok(state.records.iter().filter(|r| matches(r, filter)).count() as u64)
    }

    fn ensure_index(&self, index: &IndexSpec) -> StorageResult<String> {
        if index.keys.is_empty() {
            return Err(StorageError::invalid_index("index has no keys"));
        }
        let name = index.name();

        let mut state = self.state.write();
        if let Some(existing) = state.indexes.get(&name) {
            if existing.keys != index.keys {
                return Err(StorageError::invalid_index(format!(
                    "index {name} already exists with different keys"
                )));
            }
            return Ok(name);
        }

        if index.options.unique {
            for (i, a) in state.records.iter().enumerate() {
                for b in &state.records[i + 1..] {
                    if let (Some(ka), Some(kb)) = (index_key(index, a), index_key(index, b)) {
                        if keys_equal(&ka, &kb) {
                            return Err(StorageError::duplicate_key(&name, render_key(&ka)));
                        }
                    }
                }
            }
        }

        trace!(collection = %self.name, index = %name, "ensure_index");
        state.indexes.insert(name.clone(), index.clone());
        Ok(name)
    }

    fn index_information(&self) -> StorageResult<BTreeMap<String, IndexSpec>> {
        Ok(self.state.read().indexes.clone())
    }
}

fn check_keys(record: &Record) -> StorageResult<()> {
    for (key, value) in record {
        if key.contains('.') || key.starts_with('$') {
            return Err(StorageError::invalid_key(key));
        }
        check_value_keys(value)?;
    }
    Ok(())
}

fn check_value_keys(value: &Value) -> StorageResult<()> {
    match value {
        Value::Map(m) => check_keys(m),
        Value::Array(items) => items.iter().try_for_each(check_value_keys),
        _ => Ok(()),
    }
}

fn index_key(index: &IndexSpec, record: &Record) -> Option<Vec<Value>> {
    let values: Vec<Option<&Value>> = index
        .keys
        .iter()
        .map(|(path, _)| lookup_path(record, path))
        .collect();
    if index.options.sparse && values.iter().all(Option::is_none) {
        return None;
    }
    Some(
        values
            .into_iter()
            .map(|v| v.cloned().unwrap_or(Value::Null))
            .collect(),
    )
}

fn keys_equal(a: &[Value], b: &[Value]) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| x.cmp_total(y) == Ordering::Equal)
}

fn render_key(key: &[Value]) -> String {
    key.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn check_unique(state: &State, candidate: &Record, skip: Option<usize>) -> StorageResult<()> {
    for (name, index) in &state.indexes {
        if !index.options.unique {
            continue;
        }
        let Some(key) = index_key(index, candidate) else {
            continue;
        };
        let clash = state
            .records
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .filter_map(|(_, r)| index_key(index, r))
            .any(|other| keys_equal(&key, &other));
        if clash {
            return Err(StorageError::duplicate_key(name, render_key(&key)));
        }
    }
    Ok(())
}
