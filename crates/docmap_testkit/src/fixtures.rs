//! Sample entity types and registry helpers.
//!
//! [`Models`] registers one of each shape the mapper supports against a
//! fresh in-memory store, so tests can start from a known set of types.

use docmap_core::{
    EntityType, EntityTypeBuilder, FieldDescriptor, Registry, RegistryConfig, Schema,
};
use docmap_storage::{DocumentStore, InMemoryStore, IndexOptions, IndexSpec, SortDirection};
use std::sync::Arc;

/// Pattern used by [`Models::email_entry`] addresses.
pub const EMAIL_PATTERN: &str = r"[^@]+@[^@]+\.[^@]+";

/// A registry with the sample entity types registered.
pub struct Models {
    /// The registry every type belongs to.
    pub registry: Registry,
    /// The backing store.
    pub store: Arc<InMemoryStore>,
    /// `User`: required `username` with a unique index.
    pub user: EntityType,
    /// `UserAfterChanges`: `User` plus `lang` defaulting to `"en"`, over
    /// the same collection.
    pub user_after_changes: EntityType,
    /// `Farmer`: extends `User` with an indexed `farm_name`.
    pub farmer: EntityType,
    /// `Email`: references a `User`, with `subject` and `body`.
    pub email: EntityType,
    /// `EmbedDoc`: a free-form `data` map.
    pub embed_doc: EntityType,
    /// `EmbedDocWithValidation`: a nested `data` schema of floats.
    pub embed_doc_with_validation: EntityType,
    /// `SchemaWithList`: a list of `User` references and a list of integers.
    pub schema_with_list: EntityType,
    /// `EmailEntry`: an `address` matching [`EMAIL_PATTERN`].
    pub email_entry: EntityType,
}

impl Models {
    /// Registers the sample types with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Registers the sample types with `config`.
    pub fn with_config(config: RegistryConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let registry = Registry::new(Arc::clone(&store) as Arc<dyn DocumentStore>, config);
        let register = |builder: EntityTypeBuilder| {
            registry
                .register(builder)
                .expect("Failed to register type")
        };

        let user = register(
            EntityType::builder("User")
                .field("username", FieldDescriptor::text())
                .index_with(IndexSpec::field("username").with_options(IndexOptions::new().unique())),
        );
        let user_after_changes = register(
            EntityType::builder("UserAfterChanges")
                .collection("user")
                .field("username", FieldDescriptor::text())
                .field("lang", FieldDescriptor::text().default_value("en")),
        );
        let farmer = register(
            EntityType::builder("Farmer")
                .extend(&user)
                .field("farm_name", FieldDescriptor::text())
                .index("farm_name"),
        );
        let email = register(
            EntityType::builder("Email")
                .field("user", FieldDescriptor::reference(&user))
                .field("subject", FieldDescriptor::text())
                .field("body", FieldDescriptor::text())
                .index("user")
                .index_with(IndexSpec::compound([
                    ("subject", SortDirection::Descending),
                    ("body", SortDirection::Descending),
                ])),
        );
        let embed_doc = register(EntityType::builder("EmbedDoc").field("data", FieldDescriptor::map()));
        let embed_doc_with_validation = register(
            EntityType::builder("EmbedDocWithValidation").nested(
                "data",
                Schema::new()
                    .field("height", FieldDescriptor::float())
                    .field("weight", FieldDescriptor::float()),
            ),
        );
        let schema_with_list = register(
            EntityType::builder("SchemaWithList")
                .list("users", FieldDescriptor::reference(&user))
                .list("numbers", FieldDescriptor::integer()),
        );
        let email_entry = register(
            EntityType::builder("EmailEntry").field(
                "address",
                FieldDescriptor::text()
                    .pattern(EMAIL_PATTERN)
                    .expect("Invalid email pattern"),
            ),
        );

        Self {
            registry,
            store,
            user,
            user_after_changes,
            farmer,
            email,
            embed_doc,
            embed_doc_with_validation,
            schema_with_list,
            email_entry,
        }
    }

    /// Returns the raw stored records of a collection, in insertion order.
    pub fn stored(&self, collection: &str) -> Vec<docmap_codec::Record> {
        self.store.memory_collection(collection).records()
    }
}

impl Default for Models {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a fresh set of sample models.
///
/// # Example
///
/// ```rust
/// use docmap_testkit::with_models;
///
/// with_models(|models| {
///     models.user.create([("username", "bob")]).unwrap();
/// });
/// ```
pub fn with_models<F, R>(f: F) -> R
where
    F: FnOnce(&Models) -> R,
{
    let models = Models::new();
    f(&models)
}
