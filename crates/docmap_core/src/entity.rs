//! Entity types: a schema bound to a collection, with an identity cache.

use crate::cache::{IdKey, IdentityCache};
use crate::document::{DocState, Document};
use crate::error::{OdmError, OdmResult};
use crate::query::{storage_path, Query};
use crate::reference::{to_storage_form, Assign};
use crate::registry::RegistryShared;
use crate::schema::{FieldDescriptor, FieldType, Schema, SchemaNode, ID_FIELD};
use crate::validate::Validator;
use docmap_codec::{
    escape_key, escape_record, escape_value, unescape_record, ObjectId, Record, Value,
};
use docmap_storage::{Cursor, DocumentCollection, FindOptions, IndexSpec, Update, PRIMARY_KEY};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// One kind of record: a schema, a collection, index declarations and an
/// identity cache.
///
/// `EntityType` is a cheap handle; clones refer to the same type. Types
/// are created by [`crate::Registry::register`].
#[derive(Clone)]
pub struct EntityType {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    name: String,
    schema: Schema,
    collection: Arc<dyn DocumentCollection>,
    indexes: Vec<IndexSpec>,
    cache: IdentityCache,
    follow_references: AtomicBool,
    path_prefix: String,
    registry: Weak<RegistryShared>,
}

/// A non-owning reference to an entity type.
#[derive(Clone)]
pub(crate) struct WeakEntityType(Weak<Inner>);

impl WeakEntityType {
    pub(crate) fn upgrade(&self) -> Option<EntityType> {
        self.0.upgrade().map(|inner| EntityType { inner })
    }
}

impl EntityType {
    /// Starts the definition of an entity type.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name)
    }

    pub(crate) fn from_parts(
        builder: EntityTypeBuilder,
        schema: Schema,
        collection: Arc<dyn DocumentCollection>,
        cache_enabled: bool,
        follow_references: bool,
        path_prefix: String,
        registry: Weak<RegistryShared>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache: IdentityCache::new(builder.name.clone(), cache_enabled),
                name: builder.name,
                schema,
                collection,
                indexes: builder.indexes,
                follow_references: AtomicBool::new(follow_references),
                path_prefix,
                registry,
            }),
        }
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the schema, including the `id` field.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// Returns the storage collection.
    #[must_use]
    pub fn collection(&self) -> &Arc<dyn DocumentCollection> {
        &self.inner.collection
    }

    /// Returns the declared indexes.
    #[must_use]
    pub fn indexes(&self) -> &[IndexSpec] {
        &self.inner.indexes
    }

    /// Returns the identity cache.
    #[must_use]
    pub fn cache(&self) -> &IdentityCache {
        &self.inner.cache
    }

    /// Returns true if reads go through the identity cache.
    #[must_use]
    pub fn is_cache_enabled(&self) -> bool {
        self.inner.cache.is_enabled()
    }

    /// Enables or disables the identity cache. Disabling clears it.
    pub fn set_cache_enabled(&self, enabled: bool) {
        debug!(entity = %self.name(), enabled, "identity cache toggled");
        self.inner.cache.set_enabled(enabled);
    }

    /// Returns true if `to_plain` nests referenced documents.
    #[must_use]
    pub fn follows_references(&self) -> bool {
        self.inner.follow_references.load(Ordering::Acquire)
    }

    /// Sets whether `to_plain` nests referenced documents.
    pub fn set_follow_references(&self, follow: bool) {
        self.inner
            .follow_references
            .store(follow, Ordering::Release);
    }

    /// Returns true if both handles refer to the same type.
    #[must_use]
    pub fn ptr_eq(&self, other: &EntityType) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakEntityType {
        WeakEntityType(Arc::downgrade(&self.inner))
    }

    /// Looks up another type in the registry this type belongs to.
    pub(crate) fn lookup(&self, name: &str) -> Option<EntityType> {
        self.inner.registry.upgrade()?.get(name)
    }

    /// Returns true if both types were registered with the same registry.
    pub(crate) fn same_registry(&self, other: &EntityType) -> bool {
        Weak::ptr_eq(&self.inner.registry, &other.inner.registry)
    }

    /// Validates fields into a document without writing it.
    ///
    /// Defaults are filled, documents given for reference fields become
    /// their ids and a fresh id is generated if none is given. Call
    /// [`Document::save`] to insert the result.
    ///
    /// # Errors
    ///
    /// Returns a validation error. Nothing is written.
    pub fn build<K, V>(&self, fields: impl IntoIterator<Item = (K, V)>) -> OdmResult<Document>
    where
        K: Into<String>,
        V: Into<Assign>,
    {
        let name = self.name();
        let schema = self.schema();
        let mut record = Record::new();
        for (field, value) in fields {
            let field: String = field.into();
            let value: Assign = value.into();
            let node = schema
                .get(&field)
                .ok_or_else(|| OdmError::unknown_field(name, field.as_str()))?;
            if field == ID_FIELD {
                let id = self.coerce_id(value.into_query_value())?;
                record.insert(field, id);
                continue;
            }
            if let Some(stored) = to_storage_form(name, &field, node, value)? {
                record.insert(field, stored);
            }
        }

        schema.fill_defaults(&mut record);
        Validator::new(name).validate(schema, &record)?;
        Document::new(self.clone(), record, DocState::Constructed)
    }

    /// Validates, inserts and caches a new document.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any write, or a storage error
    /// (for example a unique index violation).
    ///
    /// # Example
    ///
    /// ```rust
    /// use docmap_core::{EntityType, FieldDescriptor, Registry};
    ///
    /// let registry = Registry::in_memory();
    /// let users = registry
    ///     .register(EntityType::builder("User").field("username", FieldDescriptor::text()))
    ///     .unwrap();
    /// let bob = users.create([("username", "bob")]).unwrap();
    /// let again = users.get_by_id(bob.id().clone()).unwrap().unwrap();
    /// assert!(again.ptr_eq(&bob));
    /// ```
    pub fn create<K, V>(&self, fields: impl IntoIterator<Item = (K, V)>) -> OdmResult<Document>
    where
        K: Into<String>,
        V: Into<Assign>,
    {
        let doc = self.build(fields)?;
        doc.save()?;
        debug!(entity = %self.name(), id = %doc.id(), "created document");
        Ok(doc)
    }

    /// Returns the first document matching `query`.
    ///
    /// A query for exactly one id is answered from the identity cache
    /// when possible, without touching storage.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` for undeclared query fields, `TypeMismatch`
    /// for an unusable id, or a storage error.
    pub fn get(&self, query: Query) -> OdmResult<Option<Document>> {
        if query.is_by_id() && self.is_cache_enabled() {
            if let Some((_, id)) = query.conditions().first() {
                let id = self.coerce_id(id.clone().into_query_value())?;
                if let Some(doc) = IdKey::from_value(&id).and_then(|k| self.cache().get(&k)) {
                    trace!(entity = %self.name(), id = %id, "identity cache hit");
                    return Ok(Some(doc));
                }
            }
        }

        let (conditions, options) = query.into_parts();
        let filter = self.storage_filter(conditions)?;
        let mut cursor = self
            .collection()
            .find(&filter, &options.limit(1))?;
        cursor.next().map(|stored| self.materialize(stored)).transpose()
    }

    /// Returns the document with the given id.
    ///
    /// # Errors
    ///
    /// Same as [`EntityType::get`].
    pub fn get_by_id(&self, id: impl Into<Assign>) -> OdmResult<Option<Document>> {
        self.get(Query::by_id(id))
    }

    /// Returns the document with the given id, or `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such document exists, or any error of
    /// [`EntityType::get`].
    pub fn fetch(&self, id: impl Into<Assign>) -> OdmResult<Document> {
        let id = id.into();
        let shown = id.clone().into_query_value().to_string();
        self.get_by_id(id)?
            .ok_or_else(|| OdmError::not_found(self.name(), shown))
    }

    /// Streams every document matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be translated or run.
    pub fn find(&self, query: Query) -> OdmResult<Documents> {
        let (conditions, options) = query.into_parts();
        let filter = self.storage_filter(conditions)?;
        let cursor = self.collection().find(&filter, &options)?;
        Ok(Documents {
            entity: self.clone(),
            cursor,
        })
    }

    /// Collects every document matching `query`.
    ///
    /// # Errors
    ///
    /// Same as [`EntityType::find`].
    pub fn list(&self, query: Query) -> OdmResult<Vec<Document>> {
        self.find(query)?.collect()
    }

    /// Counts documents matching `query` without loading them.
    ///
    /// # Errors
    ///
    /// Same as [`EntityType::find`].
    pub fn count(&self, query: Query) -> OdmResult<u64> {
        let (conditions, _) = query.into_parts();
        let filter = self.storage_filter(conditions)?;
        Ok(self.collection().count(&filter)?)
    }

    /// Deletes every document matching `query` and evicts it from the
    /// identity cache. Cached instances are marked removed.
    ///
    /// Returns the number of deleted records.
    ///
    /// # Errors
    ///
    /// Same as [`EntityType::find`]. Records deleted before a storage
    /// failure stay deleted.
    pub fn remove(&self, query: Query) -> OdmResult<u64> {
        let (conditions, _) = query.into_parts();
        let filter = self.storage_filter(conditions)?;
        let ids: Vec<Value> = self
            .collection()
            .find(&filter, &FindOptions::new())?
            .filter_map(|mut stored| stored.remove(PRIMARY_KEY))
            .collect();

        let mut removed = 0;
        for id in ids {
            removed += self.collection().remove(&id_filter(id.clone()))?;
            if let Some(doc) = IdKey::from_value(&id).and_then(|k| self.cache().evict(&k)) {
                doc.mark_removed();
            }
        }
        debug!(entity = %self.name(), removed, "removed documents");
        Ok(removed)
    }

    /// Puts a document into the identity cache, replacing any instance
    /// cached for the same id.
    ///
    /// # Errors
    ///
    /// Returns `CacheDisabled` when caching is off, or `TypeMismatch` for a
    /// document of another type.
    pub fn add_to_cache(&self, doc: &Document) -> OdmResult<()> {
        if doc.entity_type().name() != self.name() {
            return Err(OdmError::type_mismatch(
                self.name(),
                ID_FIELD,
                format!("{} document", self.name()),
                format!("{} document", doc.entity_type().name()),
            ));
        }
        self.cache().put(doc.clone())
    }

    /// Returns every index of the collection by name.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn index_information(&self) -> OdmResult<BTreeMap<String, IndexSpec>> {
        Ok(self.collection().index_information()?)
    }

    /// Issues `ensure_index` for every declaration.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn ensure_indexes(&self) -> OdmResult<()> {
        for index in self.indexes() {
            let name = self.collection().ensure_index(index)?;
            debug!(entity = %self.name(), index = %name, "ensured index");
        }
        Ok(())
    }

    /// Starts a new cache epoch: clears the cache and re-ensures indexes.
    ///
    /// # Errors
    ///
    /// Returns a storage error from index creation.
    pub fn reset(&self) -> OdmResult<()> {
        self.cache().clear();
        self.ensure_indexes()
    }

    /// Route of a single document: `/<type>/<oid>`, optionally followed by
    /// an action name. With an id, `<oid>` is replaced by it.
    #[must_use]
    pub fn doc_path_for(&self, name: Option<&str>, id: Option<&Value>) -> String {
        let mut path = format!("{}/{}/<oid>", self.inner.path_prefix, self.route_name());
        if let Some(name) = name {
            path = format!("{path}/{name}");
        }
        match id {
            Some(id) => path.replace("<oid>", &id.to_string()),
            None => path,
        }
    }

    /// Route of the collection: `/<type>/`, optionally followed by an
    /// action name.
    #[must_use]
    pub fn static_path_for(&self, name: Option<&str>) -> String {
        let path = format!("{}/{}/", self.inner.path_prefix, self.route_name());
        match name {
            Some(name) => format!("{path}{name}"),
            None => path,
        }
    }

    fn route_name(&self) -> String {
        self.name().to_lowercase()
    }

    /// Checks a logical id, parsing text into an object id when the id
    /// field is object id typed.
    pub(crate) fn coerce_id(&self, id: Value) -> OdmResult<Value> {
        let declared = self
            .schema()
            .get(ID_FIELD)
            .and_then(SchemaNode::as_field)
            .map(FieldDescriptor::value_type);

        let id = match (declared, id) {
            (Some(FieldType::ObjectId), Value::Text(text)) => ObjectId::parse_str(&text)
                .map(Value::ObjectId)
                .map_err(|_| OdmError::type_mismatch(self.name(), ID_FIELD, "object id", "text"))?,
            (_, id) => id,
        };
        if IdKey::from_value(&id).is_none() {
            return Err(OdmError::type_mismatch(
                self.name(),
                ID_FIELD,
                "id",
                id.type_name(),
            ));
        }
        Ok(id)
    }

    pub(crate) fn insert_record(&self, record: &Record) -> OdmResult<()> {
        Validator::new(self.name()).validate(self.schema(), record)?;
        self.collection().insert(self.to_storage(record))?;
        Ok(())
    }

    /// Replaces the stored record with `record` in a single update.
    pub(crate) fn overwrite_record(&self, record: &Record) -> OdmResult<()> {
        Validator::new(self.name()).validate(self.schema(), record)?;
        let mut set = self.to_storage(record);
        let id = set
            .remove(PRIMARY_KEY)
            .ok_or_else(|| OdmError::required_missing(self.name(), ID_FIELD))?;
        let unset = self
            .schema()
            .iter()
            .filter(|(name, _)| *name != ID_FIELD && !record.contains_key(*name))
            .map(|(name, _)| escape_key(name))
            .collect();
        self.write_update(&id, &Update { set, unset })
    }

    pub(crate) fn write_update(&self, id: &Value, update: &Update) -> OdmResult<()> {
        let modified = self.collection().update(&id_filter(id.clone()), update)?;
        if modified == 0 {
            return Err(OdmError::not_found(self.name(), id.to_string()));
        }
        trace!(entity = %self.name(), id = %id, "wrote update");
        Ok(())
    }

    pub(crate) fn load_record(&self, id: &Value) -> OdmResult<Option<Record>> {
        let stored = self.collection().find_one(&id_filter(id.clone()))?;
        debug!(entity = %self.name(), id = %id, found = stored.is_some(), "reloaded document");
        Ok(stored.map(|stored| self.from_storage(stored)))
    }

    pub(crate) fn delete_stored(&self, id: &Value) -> OdmResult<()> {
        self.collection().remove(&id_filter(id.clone()))?;
        Ok(())
    }

    /// Wraps a stored record, or returns the cached instance for its id.
    fn materialize(&self, stored: Record) -> OdmResult<Document> {
        let key = stored.get(PRIMARY_KEY).and_then(IdKey::from_value);
        if let Some(doc) = key.and_then(|k| self.cache().get(&k)) {
            trace!(entity = %self.name(), id = %doc.id(), "identity cache hit");
            return Ok(doc);
        }
        let doc = Document::new(self.clone(), self.from_storage(stored), DocState::Persisted)?;
        Ok(self.cache().admit(doc))
    }

    fn to_storage(&self, record: &Record) -> Record {
        let mut stored = escape_record(record.clone());
        if let Some(id) = stored.remove(ID_FIELD) {
            stored.insert(PRIMARY_KEY.to_string(), id);
        }
        stored
    }

    /// Decodes keys, restores `id`, fills defaults and coerces numbers.
    fn from_storage(&self, stored: Record) -> Record {
        let mut record = unescape_record(stored);
        if let Some(id) = record.remove(PRIMARY_KEY) {
            record.insert(ID_FIELD.to_string(), id);
        }
        self.schema().fill_defaults(&mut record);
        self.schema().coerce_numbers(&mut record);
        record
    }

    fn storage_filter(&self, conditions: Vec<(String, Assign)>) -> OdmResult<Record> {
        let mut filter = Record::new();
        for (field, value) in conditions {
            let head = field.split('.').next().unwrap_or_default();
            if !self.schema().contains(head) {
                return Err(OdmError::unknown_field(self.name(), field));
            }
            let mut value = value.into_query_value();
            if field == ID_FIELD {
                value = self.coerce_id(value)?;
            }
            filter.insert(storage_path(&field), escape_value(value));
        }
        Ok(filter)
    }
}

fn id_filter(id: Value) -> Record {
    let mut filter = Record::new();
    filter.insert(PRIMARY_KEY.to_string(), id);
    filter
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name())
            .field("collection", &self.collection().name())
            .field("fields", &self.schema().len())
            .field("cache", self.cache())
            .finish()
    }
}

/// Documents streamed by [`EntityType::find`].
pub struct Documents {
    entity: EntityType,
    cursor: Cursor,
}

impl Iterator for Documents {
    type Item = OdmResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let stored = self.cursor.next()?;
        Some(self.entity.materialize(stored))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.cursor.size_hint()
    }
}

impl fmt::Debug for Documents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Documents")
            .field("entity", &self.entity.name())
            .field("remaining", &self.cursor.len())
            .finish()
    }
}

/// Definition of an entity type, consumed by [`crate::Registry::register`].
///
/// # Example
///
/// ```rust
/// use docmap_core::{EntityType, FieldDescriptor};
/// use docmap_storage::{IndexOptions, IndexSpec, SortDirection};
///
/// let email = EntityType::builder("Email")
///     .field("user", FieldDescriptor::reference_to("User"))
///     .field("subject", FieldDescriptor::text())
///     .field("body", FieldDescriptor::text())
///     .index("user")
///     .index_with(IndexSpec::compound([
///         ("subject", SortDirection::Descending),
///         ("body", SortDirection::Descending),
///     ]));
/// assert_eq!(email.name(), "Email");
/// ```
#[derive(Debug, Clone)]
pub struct EntityTypeBuilder {
    pub(crate) name: String,
    pub(crate) schema: Schema,
    pub(crate) indexes: Vec<IndexSpec>,
    pub(crate) collection: Option<String>,
    pub(crate) cache_enabled: Option<bool>,
    pub(crate) follow_references: Option<bool>,
}

impl EntityTypeBuilder {
    /// Starts a definition with an empty schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(),
            indexes: Vec::new(),
            collection: None,
            cache_enabled: None,
            follow_references: None,
        }
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces the schema.
    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field: FieldDescriptor) -> Self {
        self.schema.insert(name, SchemaNode::Field(field));
        self
    }

    /// Adds any schema node.
    #[must_use]
    pub fn node(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.schema.insert(name, node);
        self
    }

    /// Adds a required nested schema.
    #[must_use]
    pub fn nested(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.schema.insert(name, SchemaNode::from(schema));
        self
    }

    /// Adds a list whose items follow `item`.
    #[must_use]
    pub fn list(mut self, name: impl Into<String>, item: impl Into<SchemaNode>) -> Self {
        self.schema.insert(name, SchemaNode::list_of(item));
        self
    }

    /// Declares an ascending single-field index.
    #[must_use]
    pub fn index(self, field: impl Into<String>) -> Self {
        self.index_with(IndexSpec::field(field))
    }

    /// Declares an index with explicit keys and options.
    #[must_use]
    pub fn index_with(mut self, index: IndexSpec) -> Self {
        if !self.indexes.iter().any(|i| i.name() == index.name()) {
            self.indexes.push(index);
        }
        self
    }

    /// Copies the fields and indexes of `parent`.
    ///
    /// Fields already declared on this builder win over the parent's.
    #[must_use]
    pub fn extend(mut self, parent: &EntityType) -> Self {
        for (name, node) in parent.schema().iter() {
            if !self.schema.contains(name) {
                self.schema.insert(name, node.clone());
            }
        }
        for index in parent.indexes() {
            self = self.index_with(index.clone());
        }
        self
    }

    /// Overrides the collection name (the lower-cased type name by default).
    #[must_use]
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Overrides the registry's cache default.
    #[must_use]
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = Some(enabled);
        self
    }

    /// Overrides the registry's follow-references default.
    #[must_use]
    pub fn follow_references(mut self, follow: bool) -> Self {
        self.follow_references = Some(follow);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::schema::FieldDescriptor;
    use docmap_storage::{IndexOptions, SortDirection};

    fn users(registry: &Registry) -> EntityType {
        registry
            .register(
                EntityType::builder("User")
                    .field("username", FieldDescriptor::text())
                    .field("lang", FieldDescriptor::text().default_value("en"))
                    .field("age", FieldDescriptor::integer().optional())
                    .index_with(
                        IndexSpec::field("username").with_options(IndexOptions::new().unique()),
                    ),
            )
            .unwrap()
    }

    fn stored(entity: &EntityType) -> Vec<Record> {
        entity
            .collection()
            .find(&Record::new(), &FindOptions::new())
            .unwrap()
            .collect()
    }

    #[test]
    fn create_fills_defaults_and_stores_under_id() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        let bob = users.create([("username", "bob")]).unwrap();

        assert_eq!(bob.state(), DocState::Persisted);
        assert_eq!(bob.value("lang"), Some(Value::from("en")));
        assert!(matches!(bob.id(), Value::ObjectId(_)));

        let records = stored(&users);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get(PRIMARY_KEY), Some(bob.id()));
        assert!(!records[0].contains_key(ID_FIELD));
        assert_eq!(records[0]["lang"], Value::from("en"));
    }

    #[test]
    fn create_rejects_before_writing() {
        let registry = Registry::in_memory();
        let users = users(&registry);

        let err = users
            .create([("username", "x"), ("extra", "y")])
            .unwrap_err();
        assert!(matches!(err, OdmError::UnknownField { .. }));

        let err = users.create([("age", 3)]).unwrap_err();
        assert!(matches!(err, OdmError::RequiredFieldMissing { .. }));

        let err = users.create([("username", 3)]).unwrap_err();
        assert!(matches!(err, OdmError::TypeMismatch { .. }));

        assert!(stored(&users).is_empty());
    }

    #[test]
    fn unique_index_violation_is_a_storage_error() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        users.create([("username", "bob")]).unwrap();
        let err = users.create([("username", "bob")]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Storage);
        assert_eq!(users.cache().len(), 1);
    }

    #[test]
    fn failed_insert_keeps_the_cached_instance() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        let bob = users.create([("username", "bob")]).unwrap();

        let clash = users
            .build([("id", Assign::from(bob.id().clone())), ("username", "other".into())])
            .unwrap();
        assert_eq!(clash.save().unwrap_err().kind(), crate::ErrorKind::Storage);
        assert_eq!(clash.state(), DocState::Constructed);

        let cached = users.get_by_id(bob.id().clone()).unwrap().unwrap();
        assert!(cached.ptr_eq(&bob));
        assert_eq!(cached.value("username"), Some(Value::from("bob")));
    }

    #[test]
    fn create_is_the_cached_instance() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        let bob = users.create([("username", "bob")]).unwrap();
        let found = users
            .get(Query::new().eq("username", "bob"))
            .unwrap()
            .unwrap();
        assert!(found.ptr_eq(&bob));
        assert!(users.cache().get(bob.id_key()).unwrap().ptr_eq(&bob));
    }

    #[test]
    fn build_does_not_write() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        let draft = users.build([("username", "draft")]).unwrap();

        assert_eq!(draft.state(), DocState::Constructed);
        assert!(stored(&users).is_empty());
        assert!(users.get_by_id(draft.id().clone()).unwrap().is_none());

        draft.save().unwrap();
        assert_eq!(draft.state(), DocState::Persisted);
        let loaded = users.get_by_id(draft.id().clone()).unwrap().unwrap();
        assert!(loaded.ptr_eq(&draft));
    }

    #[test]
    fn get_by_id_uses_cache() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        let bob = users.create([("username", "bob")]).unwrap();

        // Served from the cache even though storage no longer has it.
        users.collection().remove(&Record::new()).unwrap();
        let cached = users.get_by_id(bob.id().clone()).unwrap().unwrap();
        assert!(cached.ptr_eq(&bob));
    }

    #[test]
    fn text_ids_are_parsed() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        let bob = users.create([("username", "bob")]).unwrap();

        let text = bob.id().to_string();
        let found = users.get_by_id(text.as_str()).unwrap().unwrap();
        assert!(found.ptr_eq(&bob));

        let err = users.get_by_id("not-an-id").unwrap_err();
        assert!(matches!(err, OdmError::TypeMismatch { .. }));
    }

    #[test]
    fn fetch_distinguishes_not_found() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        let err = users.fetch(ObjectId::new()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn find_sorts_and_shares_instances() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        let carol = users.create([("username", "carol")]).unwrap();
        users.create([("username", "alice")]).unwrap();
        users.create([("username", "bob")]).unwrap();

        let names: Vec<String> = users
            .list(Query::new().sort("username", SortDirection::Ascending))
            .unwrap()
            .iter()
            .map(|d| d.value("username").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);

        let found = users
            .find(Query::new().eq("username", "carol"))
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert!(found.ptr_eq(&carol));

        let page = users
            .list(
                Query::new()
                    .sort("username", SortDirection::Descending)
                    .skip(1)
                    .limit(1),
            )
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].value("username"), Some(Value::from("bob")));
    }

    #[test]
    fn count_and_remove() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        let bob = users.create([("username", "bob")]).unwrap();
        users.create([("username", "alice")]).unwrap();

        assert_eq!(users.count(Query::new()).unwrap(), 2);
        assert_eq!(users.count(Query::new().eq("lang", "en")).unwrap(), 2);

        assert_eq!(users.remove(Query::new().eq("username", "bob")).unwrap(), 1);
        assert!(bob.is_removed());
        assert!(users.cache().get(bob.id_key()).is_none());
        assert_eq!(users.count(Query::new()).unwrap(), 1);
    }

    #[test]
    fn unknown_query_fields_rejected() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        let err = users.count(Query::new().eq("nickname", "b")).unwrap_err();
        assert!(matches!(err, OdmError::UnknownField { .. }));
    }

    #[test]
    fn schema_migration_on_read() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        let id = ObjectId::new();
        let mut legacy = Record::new();
        legacy.insert(PRIMARY_KEY.to_string(), Value::ObjectId(id));
        legacy.insert("username".to_string(), Value::from("old"));
        users.collection().insert(legacy).unwrap();

        let doc = users.fetch(id).unwrap();
        assert_eq!(doc.value("lang"), Some(Value::from("en")));
        assert!(!stored(&users)[0].contains_key("lang"));
    }

    #[test]
    fn stored_floats_read_back_as_truncated_integers() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        for (name, age) in [("whole", 42.0), ("fraction", 42.5)] {
            let id = ObjectId::new();
            let mut legacy = Record::new();
            legacy.insert(PRIMARY_KEY.to_string(), Value::ObjectId(id));
            legacy.insert("username".to_string(), Value::from(name));
            legacy.insert("age".to_string(), Value::Float(age));
            users.collection().insert(legacy).unwrap();

            let doc = users.fetch(id).unwrap();
            assert_eq!(doc.value("age"), Some(Value::Integer(42)));
            doc.save().unwrap();
        }
        assert!(stored(&users)
            .iter()
            .all(|record| record["age"] == Value::Integer(42)));
    }

    #[test]
    fn add_to_cache_requires_enabled_cache() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        let bob = users.create([("username", "bob")]).unwrap();

        users.set_cache_enabled(false);
        assert!(matches!(
            users.add_to_cache(&bob),
            Err(OdmError::CacheDisabled { .. })
        ));

        users.set_cache_enabled(true);
        users.add_to_cache(&bob).unwrap();
        assert!(users.get_by_id(bob.id().clone()).unwrap().unwrap().ptr_eq(&bob));
    }

    #[test]
    fn route_templates() {
        let registry = Registry::in_memory();
        let users = users(&registry);
        assert_eq!(users.doc_path_for(None, None), "/user/<oid>");
        assert_eq!(users.doc_path_for(Some("avatar"), None), "/user/<oid>/avatar");
        assert_eq!(
            users.doc_path_for(None, Some(&Value::from("abc"))),
            "/user/abc"
        );
        assert_eq!(users.static_path_for(None), "/user/");
        assert_eq!(users.static_path_for(Some("search")), "/user/search");
    }
}
