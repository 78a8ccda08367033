//! Storage failures surface as errors and leave no partial state.

use docmap_core::{EntityType, ErrorKind, FieldDescriptor, Query, Registry, RegistryConfig};
use docmap_storage::{DocumentStore, IndexOptions, IndexSpec};
use docmap_testkit::prelude::*;
use std::sync::Arc;

fn setup() -> (Arc<FailingStore>, Registry, EntityType) {
    init_tracing();
    let store = Arc::new(FailingStore::new());
    let registry = Registry::new(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        RegistryConfig::default(),
    );
    let users = registry
        .register(
            EntityType::builder("User")
                .field("username", FieldDescriptor::text())
                .index_with(IndexSpec::field("username").with_options(IndexOptions::new().unique())),
        )
        .unwrap();
    (store, registry, users)
}

#[test]
fn failed_insert_is_not_cached() {
    let (store, _registry, users) = setup();
    store.set_failing(true);
    let err = users.create([("username", "bob")]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(users.cache().is_empty());

    store.set_failing(false);
    assert_eq!(users.count(Query::new()).unwrap(), 0);
}

#[test]
fn failed_save_keeps_stored_record() {
    let (store, _registry, users) = setup();
    let bob = users.create([("username", "bob")]).unwrap();

    bob.set("username", "robert").unwrap();
    store.set_failing(true);
    assert_eq!(bob.save().unwrap_err().kind(), ErrorKind::Storage);
    assert_eq!(bob.update([("username", "rob")]).unwrap_err().kind(), ErrorKind::Storage);
    assert_eq!(bob.reload().unwrap_err().kind(), ErrorKind::Storage);
    assert_eq!(bob.state(), docmap_core::DocState::Persisted);

    store.set_failing(false);
    let stored = store.memory_collection("user").records();
    assert_eq!(stored[0]["username"], docmap_codec::Value::from("bob"));
}

#[test]
fn lookups_propagate_failures() {
    let (store, _registry, users) = setup();
    store.set_failing(true);
    assert_eq!(
        users.get(Query::new().eq("username", "bob")).unwrap_err().kind(),
        ErrorKind::Storage
    );
    assert!(users.find(Query::new()).is_err());
    assert!(users.remove(Query::new()).is_err());
}

#[test]
fn failed_registration_registers_nothing() {
    let (store, registry, _users) = setup();
    store.set_failing(true);
    let err = registry
        .register(
            EntityType::builder("Tag")
                .field("label", FieldDescriptor::text())
                .index("label"),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(registry.get("Tag").is_none());
}
