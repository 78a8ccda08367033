//! Per-entity-type identity cache.
//!
//! While enabled, every id loaded or created through an entity type maps to
//! exactly one live [`Document`]. Two reads of the same id observe the same
//! instance and each other's in-memory edits.

use crate::document::Document;
use crate::error::{OdmError, OdmResult};
use docmap_codec::{ObjectId, Value};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// A hashable primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdKey {
    /// Object id (the generated default).
    ObjectId(ObjectId),
    /// Text id.
    Text(String),
    /// Integer id.
    Integer(i64),
}

impl IdKey {
    /// Builds a key from an id value. Other value types cannot be ids.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::ObjectId(id) => Some(IdKey::ObjectId(*id)),
            Value::Text(s) => Some(IdKey::Text(s.clone())),
            Value::Integer(n) => Some(IdKey::Integer(*n)),
            _ => None,
        }
    }

    /// Returns the key as a value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            IdKey::ObjectId(id) => Value::ObjectId(*id),
            IdKey::Text(s) => Value::Text(s.clone()),
            IdKey::Integer(n) => Value::Integer(*n),
        }
    }
}

impl fmt::Display for IdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdKey::ObjectId(id) => write!(f, "{id}"),
            IdKey::Text(s) => f.write_str(s),
            IdKey::Integer(n) => write!(f, "{n}"),
        }
    }
}

/// Identity map from id to live document.
///
/// Lookups and insertions happen under one lock, so two threads loading the
/// same id end up sharing whichever instance was admitted first.
pub struct IdentityCache {
    entity: String,
    enabled: AtomicBool,
    entries: Mutex<HashMap<IdKey, Document>>,
}

impl IdentityCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(entity: impl Into<String>, enabled: bool) -> Self {
        Self {
            entity: entity.into(),
            enabled: AtomicBool::new(enabled),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if the cache admits documents.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enables or disables the cache. Disabling also clears it.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        if !enabled {
            self.clear();
        }
    }

    /// Returns the cached document for `key`.
    #[must_use]
    pub fn get(&self, key: &IdKey) -> Option<Document> {
        if !self.is_enabled() {
            return None;
        }
        self.entries.lock().get(key).cloned()
    }

    /// Inserts or replaces the entry for the document's id.
    ///
    /// # Errors
    ///
    /// Returns `CacheDisabled` if the cache is disabled.
    pub fn put(&self, doc: Document) -> OdmResult<()> {
        if !self.is_enabled() {
            return Err(OdmError::CacheDisabled {
                entity: self.entity.clone(),
            });
        }
        self.entries.lock().insert(doc.id_key().clone(), doc);
        Ok(())
    }

    /// Returns the cached instance for the document's id, admitting `doc`
    /// first if there is none. A disabled cache returns `doc` unchanged.
    #[must_use]
    pub fn admit(&self, doc: Document) -> Document {
        if !self.is_enabled() {
            return doc;
        }
        self.entries
            .lock()
            .entry(doc.id_key().clone())
            .or_insert(doc)
            .clone()
    }

    /// Claims the entry for a document about to be inserted, so readers
    /// that load the record before the insert returns get `doc`.
    ///
    /// Returns false, changing nothing, if the cache is disabled or the id
    /// already has an entry.
    pub(crate) fn reserve(&self, doc: &Document) -> bool {
        if !self.is_enabled() {
            return false;
        }
        match self.entries.lock().entry(doc.id_key().clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(doc.clone());
                true
            }
        }
    }

    /// Drops the entry for the document's id if it holds `doc` itself.
    pub(crate) fn release(&self, doc: &Document) {
        let mut entries = self.entries.lock();
        if entries.get(doc.id_key()).is_some_and(|cached| cached.ptr_eq(doc)) {
            entries.remove(doc.id_key());
        }
    }

    /// Puts `doc` in place of any entry for its id. No-op when disabled.
    pub(crate) fn replace(&self, doc: Document) {
        if self.is_enabled() {
            self.entries.lock().insert(doc.id_key().clone(), doc);
        }
    }

    /// Removes and returns the entry for `key`.
    pub fn evict(&self, key: &IdKey) -> Option<Document> {
        self.entries.lock().remove(key)
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Returns the number of cached documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCache")
            .field("entity", &self.entity)
            .field("enabled", &self.is_enabled())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_keys() {
        let oid = ObjectId::new();
        assert_eq!(
            IdKey::from_value(&Value::ObjectId(oid)),
            Some(IdKey::ObjectId(oid))
        );
        assert_eq!(
            IdKey::from_value(&Value::from("bob")),
            Some(IdKey::Text("bob".into()))
        );
        assert_eq!(IdKey::from_value(&Value::Float(1.0)), None);
        assert_eq!(IdKey::Integer(7).to_value(), Value::Integer(7));
        assert_eq!(IdKey::Text("bob".into()).to_string(), "bob");
    }

    #[test]
    fn disabled_cache_is_empty() {
        let cache = IdentityCache::new("User", false);
        assert!(!cache.is_enabled());
        assert!(cache.get(&IdKey::Integer(1)).is_none());
        assert!(cache.is_empty());
    }
}
