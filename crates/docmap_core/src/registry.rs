//! The registry of entity types.

use crate::config::RegistryConfig;
use crate::entity::{EntityType, EntityTypeBuilder};
use crate::error::{OdmError, OdmResult};
use docmap_storage::{DocumentStore, InMemoryStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Every entity type of one application, bound to one document store.
///
/// `Registry` is a cheap handle; clones share the same types. Deferred
/// references ([`crate::FieldDescriptor::reference_to`]) resolve through
/// the registry their owning type was registered with.
///
/// Registration runs schema checks and index creation before the type is
/// visible to lookups, so a type returned by [`Registry::get`] is ready
/// for CRUD.
///
/// # Example
///
/// ```rust
/// use docmap_core::{EntityType, FieldDescriptor, Registry};
///
/// let registry = Registry::in_memory();
/// registry
///     .register(EntityType::builder("User").field("username", FieldDescriptor::text()))
///     .unwrap();
/// let users = registry.get("User").unwrap();
/// assert!(users.schema().contains("id"));
/// ```
#[derive(Clone)]
pub struct Registry {
    shared: Arc<RegistryShared>,
}

pub(crate) struct RegistryShared {
    config: RegistryConfig,
    store: Arc<dyn DocumentStore>,
    types: RwLock<BTreeMap<String, EntityType>>,
}

impl RegistryShared {
    pub(crate) fn get(&self, name: &str) -> Option<EntityType> {
        self.types.read().get(name).cloned()
    }
}

impl Drop for RegistryShared {
    fn drop(&mut self) {
        // Cached documents hold their entity type; clearing breaks the cycle.
        for entity in self.types.get_mut().values() {
            entity.cache().clear();
        }
    }
}

impl Registry {
    /// Creates a registry over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: RegistryConfig) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                config,
                store,
                types: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    /// Creates a registry over a fresh [`InMemoryStore`] with default
    /// configuration.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()), RegistryConfig::default())
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.shared.config
    }

    /// Returns the document store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.shared.store
    }

    /// Registers an entity type.
    ///
    /// Checks the schema, injects or checks the `id` field, opens the
    /// collection and ensures every declared index.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateEntityType`, `InvalidSchema`,
    /// `PrimaryKeyMisconfigured`, or a storage error from index creation.
    pub fn register(&self, builder: EntityTypeBuilder) -> OdmResult<EntityType> {
        let config = &self.shared.config;
        let mut types = self.shared.types.write();
        if types.contains_key(builder.name()) {
            return Err(OdmError::DuplicateEntityType {
                name: builder.name().to_string(),
            });
        }

        let mut schema = builder.schema.clone();
        schema.check(builder.name())?;
        schema.ensure_primary_key(builder.name())?;

        let collection_name = builder
            .collection
            .clone()
            .unwrap_or_else(|| builder.name().to_lowercase());
        let collection = self.shared.store.collection(&collection_name);
        let cache_enabled = builder.cache_enabled.unwrap_or(config.cache_enabled);
        let follow_references = builder
            .follow_references
            .unwrap_or(config.follow_references);

        let entity = EntityType::from_parts(
            builder,
            schema,
            collection,
            cache_enabled,
            follow_references,
            config.path_prefix.clone(),
            Arc::downgrade(&self.shared),
        );
        if config.ensure_indexes {
            entity.ensure_indexes()?;
        }

        types.insert(entity.name().to_string(), entity.clone());
        info!(
            entity = %entity.name(),
            collection = %collection_name,
            fields = entity.schema().len(),
            "registered entity type"
        );
        Ok(entity)
    }

    /// Returns the entity type called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<EntityType> {
        self.shared.get(name)
    }

    /// Returns the entity type called `name`, or `UnknownEntityType`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntityType` if no such type is registered.
    pub fn entity(&self, name: &str) -> OdmResult<EntityType> {
        self.get(name).ok_or_else(|| OdmError::UnknownEntityType {
            name: name.to_string(),
        })
    }

    /// Returns every registered type, ordered by name.
    #[must_use]
    pub fn entity_types(&self) -> Vec<EntityType> {
        self.shared.types.read().values().cloned().collect()
    }

    /// Starts a new cache epoch for every registered type: caches are
    /// cleared and indexes re-ensured.
    ///
    /// # Errors
    ///
    /// Returns the first storage error from index creation.
    pub fn reset_caches(&self) -> OdmResult<()> {
        let types = self.entity_types();
        for entity in &types {
            entity.reset()?;
        }
        debug!(types = types.len(), "reset identity caches");
        Ok(())
    }

    /// Enables the identity cache of every registered type.
    pub fn enable_cache(&self) {
        for entity in self.entity_types() {
            entity.set_cache_enabled(true);
        }
    }

    /// Disables (and clears) the identity cache of every registered type.
    pub fn disable_cache(&self) {
        for entity in self.entity_types() {
            entity.set_cache_enabled(false);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.shared.config)
            .field("types", &self.shared.types.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Assign;
    use crate::schema::{FieldDescriptor, SchemaNode};
    use docmap_storage::{IndexOptions, IndexSpec, SortDirection};

    fn user() -> EntityTypeBuilder {
        EntityType::builder("User")
            .field("username", FieldDescriptor::text())
            .index_with(IndexSpec::field("username").with_options(IndexOptions::new().unique()))
    }

    #[test]
    fn register_and_lookup() {
        let registry = Registry::in_memory();
        let users = registry.register(user()).unwrap();

        assert!(registry.get("User").unwrap().ptr_eq(&users));
        assert!(registry.get("Nobody").is_none());
        assert!(matches!(
            registry.entity("Nobody"),
            Err(OdmError::UnknownEntityType { .. })
        ));
        assert_eq!(users.collection().name(), "user");
        assert!(users.schema().contains("id"));
    }

    #[test]
    fn duplicate_names_rejected() {
        let registry = Registry::in_memory();
        registry.register(user()).unwrap();
        assert!(matches!(
            registry.register(user()),
            Err(OdmError::DuplicateEntityType { .. })
        ));
    }

    #[test]
    fn definition_errors_leave_nothing_registered() {
        let registry = Registry::in_memory();
        let bad_list = EntityType::builder("Post").node("tags", SchemaNode::List(Vec::new()));
        assert!(matches!(
            registry.register(bad_list),
            Err(OdmError::InvalidSchema { .. })
        ));

        let bad_id = EntityType::builder("Tag").field("id", FieldDescriptor::text());
        assert!(matches!(
            registry.register(bad_id),
            Err(OdmError::PrimaryKeyMisconfigured { .. })
        ));

        assert!(registry.entity_types().is_empty());
    }

    #[test]
    fn indexes_ensured_at_registration() {
        let registry = Registry::in_memory();
        let emails = registry
            .register(
                EntityType::builder("Email")
                    .field("subject", FieldDescriptor::text())
                    .field("body", FieldDescriptor::text())
                    .index("subject")
                    .index_with(IndexSpec::compound([
                        ("subject", SortDirection::Descending),
                        ("body", SortDirection::Descending),
                    ])),
            )
            .unwrap();

        let names: Vec<String> = emails.index_information().unwrap().into_keys().collect();
        assert_eq!(names, vec!["_id_", "subject_-1_body_-1", "subject_1"]);
    }

    #[test]
    fn ensure_indexes_can_be_skipped() {
        let registry = Registry::new(
            Arc::new(InMemoryStore::new()),
            RegistryConfig::new().ensure_indexes(false),
        );
        let users = registry.register(user()).unwrap();
        assert_eq!(users.index_information().unwrap().len(), 1);

        registry.reset_caches().unwrap();
        assert_eq!(users.index_information().unwrap().len(), 2);
    }

    #[test]
    fn config_defaults_flow_into_types() {
        let registry = Registry::new(
            Arc::new(InMemoryStore::new()),
            RegistryConfig::new()
                .cache_enabled(false)
                .follow_references(true),
        );
        let users = registry.register(user()).unwrap();
        assert!(!users.is_cache_enabled());
        assert!(users.follows_references());

        let tags = registry
            .register(
                EntityType::builder("Tag")
                    .field("label", FieldDescriptor::text())
                    .cache_enabled(true),
            )
            .unwrap();
        assert!(tags.is_cache_enabled());

        registry.enable_cache();
        assert!(users.is_cache_enabled());
        registry.disable_cache();
        assert!(!tags.is_cache_enabled());
    }

    #[test]
    fn extend_copies_fields_and_indexes() {
        let registry = Registry::in_memory();
        let users = registry.register(user()).unwrap();
        let farmers = registry
            .register(
                EntityType::builder("Farmer")
                    .extend(&users)
                    .field("farm_name", FieldDescriptor::text())
                    .index("farm_name"),
            )
            .unwrap();

        assert!(farmers.schema().contains("username"));
        assert!(farmers.schema().contains("farm_name"));
        assert_eq!(farmers.collection().name(), "farmer");
        let names: Vec<String> = farmers.index_information().unwrap().into_keys().collect();
        assert_eq!(names, vec!["_id_", "farm_name_1", "username_1"]);
    }

    #[test]
    fn shared_definitions_resolve_within_each_registry() {
        let first = Registry::in_memory();
        let second = Registry::in_memory();
        let first_users = first.register(user()).unwrap();
        second.register(user()).unwrap();

        // One builder, cloned into both registries; the bound reference
        // points at the first registry's type.
        let email = EntityType::builder("Email")
            .field("user", FieldDescriptor::reference_to("User"))
            .field("cc", FieldDescriptor::reference(&first_users).optional());
        let first_emails = first.register(email.clone()).unwrap();
        let second_emails = second.register(email).unwrap();

        let ann = first_users.create([("username", "ann")]).unwrap();
        let first_mail = first_emails.create([("user", &ann)]).unwrap();
        let owner = first_mail.get("user").unwrap().into_entity().unwrap();
        assert!(owner.ptr_eq(&ann));

        let second_users = second.entity("User").unwrap();
        let bob = second_users.create([("username", "bob")]).unwrap();
        let second_mail = second_emails
            .create([("user", Assign::from(&bob)), ("cc", Assign::from(&bob))])
            .unwrap();
        for field in ["user", "cc"] {
            let owner = second_mail.get(field).unwrap().into_entity().unwrap();
            assert!(owner.ptr_eq(&bob));
        }
    }
}
