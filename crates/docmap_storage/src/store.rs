//! Document stores: named sets of collections.

use crate::collection::DocumentCollection;
use crate::memory::InMemoryCollection;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A database handle that opens collections by name.
///
/// Opening the same name twice must return handles to the same
/// underlying collection.
pub trait DocumentStore: Send + Sync {
    /// Returns the collection called `name`, creating it if needed.
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection>;
}

/// A store of [`InMemoryCollection`]s.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: Mutex<HashMap<String, Arc<InMemoryCollection>>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the concrete collection, creating it if needed.
    pub fn memory_collection(&self, name: &str) -> Arc<InMemoryCollection> {
        Arc::clone(
            self.collections
                .lock()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(InMemoryCollection::new(name))),
        )
    }

    /// Returns the names of every opened collection, sorted.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl DocumentStore for InMemoryStore {
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        self.memory_collection(name)
    }
}
