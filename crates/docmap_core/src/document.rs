//! Live documents.

use crate::cache::IdKey;
use crate::entity::EntityType;
use crate::error::{OdmError, OdmResult};
use crate::reference::{to_storage_form, Assign, Field};
use crate::reflist::RefList;
use crate::schema::{SchemaNode, ID_FIELD};
use crate::validate::Validator;
use docmap_codec::{escape_key, escape_value, to_pretty_json, Record, Value};
use docmap_storage::Update;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Lifecycle state of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocState {
    /// Built and validated but never written.
    Constructed,
    /// Written to storage.
    Persisted,
    /// Being refreshed from storage.
    Reloading,
    /// Deleted; every further operation fails.
    Removed,
}

/// A validated record of one entity type.
///
/// `Document` is a cheap handle: clones share the same record. While the
/// entity type's identity cache is enabled, every load of an id returns a
/// handle to the same instance, so edits through one handle are visible
/// through all of them.
///
/// Reads of reference fields return live documents, see [`Document::get`].
#[derive(Clone)]
pub struct Document {
    inner: Arc<Inner>,
}

struct Inner {
    entity: EntityType,
    id: Value,
    key: IdKey,
    record: Mutex<Record>,
    state: Mutex<DocState>,
}

impl Document {
    pub(crate) fn new(entity: EntityType, record: Record, state: DocState) -> OdmResult<Self> {
        let id = record
            .get(ID_FIELD)
            .cloned()
            .ok_or_else(|| OdmError::required_missing(entity.name(), ID_FIELD))?;
        let key = IdKey::from_value(&id).ok_or_else(|| {
            OdmError::type_mismatch(entity.name(), ID_FIELD, "id", id.type_name())
        })?;
        Ok(Self {
            inner: Arc::new(Inner {
                entity,
                id,
                key,
                record: Mutex::new(record),
                state: Mutex::new(state),
            }),
        })
    }

    /// Returns the primary key.
    #[must_use]
    pub fn id(&self) -> &Value {
        &self.inner.id
    }

    /// Returns the primary key in hashable form.
    #[must_use]
    pub fn id_key(&self) -> &IdKey {
        &self.inner.key
    }

    /// Returns the entity type this document belongs to.
    #[must_use]
    pub fn entity_type(&self) -> &EntityType {
        &self.inner.entity
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> DocState {
        *self.inner.state.lock()
    }

    /// Returns true once the document has been removed.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.state() == DocState::Removed
    }

    /// Returns true if both handles point at the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns a copy of the record in logical form.
    #[must_use]
    pub fn record(&self) -> Record {
        self.inner.record.lock().clone()
    }

    /// Returns the raw stored value of a field without resolving
    /// references.
    #[must_use]
    pub fn value(&self, field: &str) -> Option<Value> {
        self.inner.record.lock().get(field).cloned()
    }

    /// Reads a field.
    ///
    /// Scalar references resolve to the target document; lists of
    /// references resolve to a [`RefList`]. An absent field, or an optional
    /// reference whose target is gone, reads as [`Field::NoValue`].
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` for undeclared names, `NotFound` when a
    /// required reference points at a missing document, and
    /// `DocumentRemoved` after removal.
    pub fn get(&self, field: &str) -> OdmResult<Field> {
        self.ensure_live()?;
        let entity = self.entity_type();
        let node = self.node(field)?;
        let value = self.value(field);

        let Some((descriptor, is_list)) = node.reference_field() else {
            return Ok(value.map_or(Field::NoValue, Field::Value));
        };
        let target_ref = descriptor
            .value_type()
            .reference_target()
            .ok_or_else(|| OdmError::invalid_schema(entity.name(), "reference without target"))?;
        let target = target_ref.resolve(entity)?;

        if is_list {
            let ids = match value {
                Some(Value::Array(ids)) => ids,
                None | Some(Value::Null) => Vec::new(),
                Some(other) => return Ok(Field::Value(other)),
            };
            let items = ids
                .iter()
                .map(|id| target.fetch(id.clone()))
                .collect::<OdmResult<Vec<_>>>()?;
            return Ok(Field::References(RefList::new(
                self.clone(),
                field.to_string(),
                target.name().to_string(),
                items,
            )));
        }

        match value {
            None | Some(Value::Null) => Ok(Field::NoValue),
            Some(id @ Value::ObjectId(_)) => match target.get_by_id(id.clone())? {
                Some(doc) => Ok(Field::Entity(doc)),
                None if descriptor.is_required() => {
                    Err(OdmError::not_found(target.name(), id.to_string()))
                }
                None => Ok(Field::NoValue),
            },
            Some(other) => Ok(Field::Value(other)),
        }
    }

    /// Assigns a field in memory after validating it.
    ///
    /// Documents assigned to reference fields are stored as their ids.
    /// Assigning null clears an optional field. Call [`Document::save`] to
    /// persist.
    ///
    /// # Errors
    ///
    /// Returns a validation error and leaves the document unchanged, or
    /// `ImmutableId` when trying to change the id.
    pub fn set(&self, field: &str, value: impl Into<Assign>) -> OdmResult<()> {
        self.ensure_live()?;
        let stored = self.convert(field, value.into())?;
        let mut record = self.inner.record.lock();
        match stored {
            Some(value) => {
                record.insert(field.to_string(), value);
            }
            None => {
                record.remove(field);
            }
        }
        Ok(())
    }

    /// Appends one item to a list field in memory.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the field is not a list or the item
    /// does not satisfy the item descriptor.
    pub fn push(&self, field: &str, item: impl Into<Assign>) -> OdmResult<()> {
        self.ensure_live()?;
        let entity = self.entity_type().name();
        let node = self.node(field)?;
        let Some(item_node) = node.list_item() else {
            return Err(OdmError::type_mismatch(entity, field, "list field", "scalar field"));
        };
        let path = format!("{field}.*");
        let value = to_storage_form(entity, &path, item_node, item.into())?.unwrap_or(Value::Null);
        Validator::new(entity).validate_node(&path, item_node, &value)?;

        let mut record = self.inner.record.lock();
        let slot = record
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match slot.as_array_mut() {
            Some(items) => {
                items.push(value);
                Ok(())
            }
            None => Err(OdmError::type_mismatch(
                entity,
                field,
                "array",
                slot.type_name(),
            )),
        }
    }

    /// Writes the whole document to storage.
    ///
    /// A constructed document is inserted and admitted to the identity
    /// cache; a persisted one is validated and overwritten.
    ///
    /// # Errors
    ///
    /// Returns a validation or storage error, `NotFound` if the stored
    /// record disappeared, or `DocumentRemoved`.
    pub fn save(&self) -> OdmResult<()> {
        let entity = self.entity_type();
        match self.state() {
            DocState::Removed => Err(self.removed_error()),
            DocState::Constructed => {
                let cache = entity.cache();
                let record = self.record();
                let reserved = cache.reserve(self);
                if let Err(e) = entity.insert_record(&record) {
                    if reserved {
                        cache.release(self);
                    }
                    return Err(e);
                }
                *self.inner.state.lock() = DocState::Persisted;
                if !reserved {
                    // The insert succeeded, so any entry held for this id was stale.
                    cache.replace(self.clone());
                }
                Ok(())
            }
            DocState::Persisted | DocState::Reloading => {
                let record = self.record();
                entity.overwrite_record(&record)
            }
        }
    }

    /// Applies several assignments, validates the whole resulting record
    /// and writes it back.
    ///
    /// Either every change is applied or none is. A constructed document
    /// is only changed in memory.
    ///
    /// # Errors
    ///
    /// Returns a validation or storage error and leaves the document
    /// unchanged.
    pub fn update<K, V>(&self, changes: impl IntoIterator<Item = (K, V)>) -> OdmResult<()>
    where
        K: Into<String>,
        V: Into<Assign>,
    {
        self.ensure_live()?;
        let entity = self.entity_type();

        let mut applied = Vec::new();
        for (field, value) in changes {
            let field: String = field.into();
            let stored = self.convert(&field, value.into())?;
            applied.push((field, stored));
        }

        let mut record = self.inner.record.lock();
        let mut candidate = record.clone();
        for (field, stored) in applied {
            match stored {
                Some(value) => candidate.insert(field, value),
                None => candidate.remove(&field),
            };
        }

        if self.state() == DocState::Constructed {
            Validator::new(entity.name()).validate(entity.schema(), &candidate)?;
        } else {
            entity.overwrite_record(&candidate)?;
        }
        *record = candidate;
        Ok(())
    }

    /// Assigns one field and writes only that field.
    ///
    /// # Errors
    ///
    /// Returns a validation or storage error and leaves the document
    /// unchanged.
    pub fn update_field(&self, field: &str, value: impl Into<Assign>) -> OdmResult<()> {
        self.ensure_live()?;
        let entity = self.entity_type();
        let stored = self.convert(field, value.into())?;

        let mut record = self.inner.record.lock();
        if self.state() != DocState::Constructed {
            let update = match &stored {
                Some(value) => {
                    let mut set = Record::new();
                    set.insert(escape_key(field), escape_value(value.clone()));
                    Update::set(set)
                }
                None => Update::unset(escape_key(field)),
            };
            entity.write_update(self.id(), &update)?;
        }
        match stored {
            Some(value) => record.insert(field.to_string(), value),
            None => record.remove(field),
        };
        Ok(())
    }

    /// Removes an optional field in memory and in storage.
    ///
    /// # Errors
    ///
    /// Returns `RequiredFieldMissing` for `id` and required fields.
    pub fn unset_field(&self, field: &str) -> OdmResult<()> {
        self.ensure_live()?;
        let entity = self.entity_type();
        let node = self.node(field)?;
        if field == ID_FIELD || node.is_required() {
            return Err(OdmError::required_missing(entity.name(), field));
        }

        let mut record = self.inner.record.lock();
        if self.state() != DocState::Constructed {
            entity.write_update(self.id(), &Update::unset(escape_key(field)))?;
        }
        record.remove(field);
        Ok(())
    }

    /// Replaces the in-memory record with the stored one.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the record is no longer stored.
    pub fn reload(&self) -> OdmResult<()> {
        let entity = self.entity_type();
        let previous = {
            let mut state = self.inner.state.lock();
            match *state {
                DocState::Removed => return Err(self.removed_error()),
                DocState::Constructed => {
                    return Err(OdmError::not_found(entity.name(), self.id().to_string()))
                }
                previous => {
                    *state = DocState::Reloading;
                    previous
                }
            }
        };

        let loaded = entity.load_record(self.id());
        let result = match loaded {
            Ok(Some(record)) => {
                *self.inner.record.lock() = record;
                Ok(())
            }
            Ok(None) => Err(OdmError::not_found(entity.name(), self.id().to_string())),
            Err(e) => Err(e),
        };

        let mut state = self.inner.state.lock();
        if *state == DocState::Reloading {
            *state = if result.is_ok() {
                DocState::Persisted
            } else {
                previous
            };
        }
        result
    }

    /// Deletes the document from storage and evicts it from the cache.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or `DocumentRemoved` if already removed.
    pub fn remove(&self) -> OdmResult<()> {
        let entity = self.entity_type();
        let state = self.state();
        if state == DocState::Removed {
            return Err(self.removed_error());
        }
        if state == DocState::Constructed {
            entity.cache().release(self);
        } else {
            entity.delete_stored(self.id())?;
            entity.cache().evict(self.id_key());
        }
        self.mark_removed();
        debug!(entity = entity.name(), id = %self.id(), "removed document");
        Ok(())
    }

    /// Converts the document into plain JSON.
    ///
    /// Ids render as hex text. If the entity type follows references,
    /// referenced documents are nested in place of their ids; a reference
    /// back to a document already being rendered stays an id.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference target type cannot be resolved or
    /// a lookup fails.
    pub fn to_plain(&self) -> OdmResult<serde_json::Value> {
        self.plain_with(&mut HashSet::new())
    }

    /// Renders [`Document::to_plain`] as indented JSON text.
    ///
    /// # Errors
    ///
    /// Same as [`Document::to_plain`].
    pub fn to_json_string(&self) -> OdmResult<String> {
        Ok(to_pretty_json(&self.to_plain()?)?)
    }

    /// Returns the route of this document.
    #[must_use]
    pub fn path(&self) -> String {
        self.entity_type().doc_path_for(None, Some(self.id()))
    }

    fn plain_with(&self, visiting: &mut HashSet<(String, IdKey)>) -> OdmResult<serde_json::Value> {
        let entity = self.entity_type();
        let record = self.record();
        if !entity.follows_references() {
            return Ok(Value::Map(record).to_json());
        }

        let marker = (entity.name().to_string(), self.id_key().clone());
        visiting.insert(marker.clone());
        let mut out = serde_json::Map::new();
        for (name, value) in &record {
            let reference = entity
                .schema()
                .get(name)
                .and_then(SchemaNode::reference_field)
                .and_then(|(descriptor, is_list)| {
                    descriptor
                        .value_type()
                        .reference_target()
                        .map(|target| (target, is_list))
                });
            let json = match (reference, value) {
                (Some((target, true)), Value::Array(ids)) => {
                    let target = target.resolve(entity)?;
                    let items = ids
                        .iter()
                        .map(|id| follow(&target, id, visiting))
                        .collect::<OdmResult<Vec<_>>>()?;
                    serde_json::Value::Array(items)
                }
                (Some((target, false)), id) => follow(&target.resolve(entity)?, id, visiting)?,
                _ => value.to_json(),
            };
            out.insert(name.clone(), json);
        }
        visiting.remove(&marker);
        Ok(serde_json::Value::Object(out))
    }

    fn node(&self, field: &str) -> OdmResult<&SchemaNode> {
        let entity = self.entity_type();
        entity
            .schema()
            .get(field)
            .ok_or_else(|| OdmError::unknown_field(entity.name(), field))
    }

    /// Converts and validates one assignment without applying it.
    fn convert(&self, field: &str, value: Assign) -> OdmResult<Option<Value>> {
        let entity = self.entity_type();
        let node = self.node(field)?;
        if field == ID_FIELD {
            let id = entity.coerce_id(value.into_query_value())?;
            if &id != self.id() {
                return Err(OdmError::ImmutableId {
                    entity: entity.name().to_string(),
                });
            }
            return Ok(Some(id));
        }
        let stored = to_storage_form(entity.name(), field, node, value)?;
        if let Some(value) = &stored {
            Validator::new(entity.name()).validate_node(field, node, value)?;
        }
        Ok(stored)
    }

    pub(crate) fn ensure_live(&self) -> OdmResult<()> {
        if self.is_removed() {
            return Err(self.removed_error());
        }
        Ok(())
    }

    pub(crate) fn mark_removed(&self) {
        *self.inner.state.lock() = DocState::Removed;
    }

    /// Runs `f` on the record under its lock.
    pub(crate) fn with_record<R>(&self, f: impl FnOnce(&mut Record) -> R) -> OdmResult<R> {
        self.ensure_live()?;
        let mut record = self.inner.record.lock();
        Ok(f(&mut *record))
    }

    fn removed_error(&self) -> OdmError {
        OdmError::removed(self.entity_type().name(), self.id().to_string())
    }
}

fn follow(
    target: &EntityType,
    id: &Value,
    visiting: &mut HashSet<(String, IdKey)>,
) -> OdmResult<serde_json::Value> {
    let Some(key) = IdKey::from_value(id) else {
        return Ok(id.to_json());
    };
    if visiting.contains(&(target.name().to_string(), key)) {
        return Ok(id.to_json());
    }
    match target.get_by_id(id.clone())? {
        Some(doc) => doc.plain_with(visiting),
        None => Ok(id.to_json()),
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.entity_type().name() == other.entity_type().name() && self.id_key() == other.id_key()
    }
}

impl Eq for Document {}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.entity_type().name(), self.id_key())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = Value::Map(self.record()).to_json();
        let text = to_pretty_json(&json).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}
