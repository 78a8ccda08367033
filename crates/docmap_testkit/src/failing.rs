//! A document store that fails on demand.
//!
//! Wraps [`InMemoryStore`]; while the shared switch is on, every
//! collection call returns [`StorageError::Unavailable`] without touching
//! the stored records.

use docmap_codec::Record;
use docmap_storage::{
    Cursor, DocumentCollection, DocumentStore, FindOptions, InMemoryCollection, InMemoryStore,
    IndexSpec, StorageError, StorageResult, Update,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared failure switch and call counter.
#[derive(Debug, Default)]
struct Switch {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl Switch {
    fn check(&self, op: &str) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(format!("{op}: injected failure")));
        }
        Ok(())
    }
}

/// A store whose collections can be switched into failure.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: InMemoryStore,
    switch: Arc<Switch>,
}

impl FailingStore {
    /// Creates a store that starts out healthy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns injected failures on or off.
    pub fn set_failing(&self, failing: bool) {
        self.switch.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the number of collection calls made so far.
    pub fn calls(&self) -> usize {
        self.switch.calls.load(Ordering::SeqCst)
    }

    /// Returns the underlying in-memory collection, bypassing failures.
    pub fn memory_collection(&self, name: &str) -> Arc<InMemoryCollection> {
        self.inner.memory_collection(name)
    }
}

impl DocumentStore for FailingStore {
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        Arc::new(FailingCollection {
            inner: self.inner.memory_collection(name),
            switch: Arc::clone(&self.switch),
        })
    }
}

/// A collection that delegates to memory unless its store is failing.
#[derive(Debug)]
pub struct FailingCollection {
    inner: Arc<InMemoryCollection>,
    switch: Arc<Switch>,
}

impl DocumentCollection for FailingCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn find_one(&self, filter: &Record) -> StorageResult<Option<Record>> {
        self.switch.check("find_one")?;
        self.inner.find_one(filter)
    }

    fn find(&self, filter: &Record, options: &FindOptions) -> StorageResult<Cursor> {
        self.switch.check("find")?;
        self.inner.find(filter, options)
    }

    fn insert(&self, record: Record) -> StorageResult<()> {
        self.switch.check("insert")?;
        self.inner.insert(record)
    }

    fn update(&self, filter: &Record, update: &Update) -> StorageResult<u64> {
        self.switch.check("update")?;
        self.inner.update(filter, update)
    }

    fn remove(&self, filter: &Record) -> StorageResult<u64> {
        self.switch.check("remove")?;
        self.inner.remove(filter)
    }

    fn count(&self, filter: &Record) -> StorageResult<u64> {
        self.switch.check("count")?;
        self.inner.count(filter)
    }

    fn ensure_index(&self, index: &IndexSpec) -> StorageResult<String> {
        self.switch.check("ensure_index")?;
        self.inner.ensure_index(index)
    }

    fn index_information(&self) -> StorageResult<BTreeMap<String, IndexSpec>> {
        self.switch.check("index_information")?;
        self.inner.index_information()
    }
}
