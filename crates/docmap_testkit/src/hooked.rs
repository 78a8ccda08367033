//! A document store that runs a callback after each insert.
//!
//! Lets a test act in the window between a record reaching storage and the
//! insert call returning to the mapper.

use docmap_codec::Record;
use docmap_storage::{
    Cursor, DocumentCollection, DocumentStore, FindOptions, InMemoryCollection, InMemoryStore,
    IndexSpec, StorageResult, Update,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

type InsertHook = Arc<dyn Fn(&Record) + Send + Sync>;

/// A store whose collections call a hook once a record is stored.
#[derive(Default)]
pub struct HookedStore {
    inner: InMemoryStore,
    after_insert: Arc<Mutex<Option<InsertHook>>>,
}

impl HookedStore {
    /// Creates a store without a hook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `hook` with each stored record right after every insert.
    pub fn set_after_insert<F>(&self, hook: F)
    where
        F: Fn(&Record) + Send + Sync + 'static,
    {
        *self.after_insert.lock() = Some(Arc::new(hook));
    }

    /// Removes the hook.
    pub fn clear_hook(&self) {
        self.after_insert.lock().take();
    }
}

impl fmt::Debug for HookedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookedStore")
            .field("inner", &self.inner)
            .field("hooked", &self.after_insert.lock().is_some())
            .finish()
    }
}

impl DocumentStore for HookedStore {
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        Arc::new(HookedCollection {
            inner: self.inner.memory_collection(name),
            after_insert: Arc::clone(&self.after_insert),
        })
    }
}

struct HookedCollection {
    inner: Arc<InMemoryCollection>,
    after_insert: Arc<Mutex<Option<InsertHook>>>,
}

impl DocumentCollection for HookedCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn find_one(&self, filter: &Record) -> StorageResult<Option<Record>> {
        self.inner.find_one(filter)
    }

    fn find(&self, filter: &Record, options: &FindOptions) -> StorageResult<Cursor> {
        self.inner.find(filter, options)
    }

    fn insert(&self, record: Record) -> StorageResult<()> {
        self.inner.insert(record.clone())?;
        // Cloned out so the hook may call back into this store.
        let hook = self.after_insert.lock().clone();
        if let Some(hook) = hook {
            hook(&record);
        }
        Ok(())
    }

    fn update(&self, filter: &Record, update: &Update) -> StorageResult<u64> {
        self.inner.update(filter, update)
    }

    fn remove(&self, filter: &Record) -> StorageResult<u64> {
        self.inner.remove(filter)
    }

    fn count(&self, filter: &Record) -> StorageResult<u64> {
        self.inner.count(filter)
    }

    fn ensure_index(&self, index: &IndexSpec) -> StorageResult<String> {
        self.inner.ensure_index(index)
    }

    fn index_information(&self) -> StorageResult<BTreeMap<String, IndexSpec>> {
        self.inner.index_information()
    }
}
