//! Create, query and remove through entity types.

use docmap_codec::Value;
use docmap_core::{Assign, OdmError, Query, RegistryConfig};
use docmap_storage::{SortDirection, PRIMARY_KEY};
use docmap_testkit::prelude::*;

#[test]
fn create_then_query() {
    init_tracing();
    let models = Models::new();
    for name in ["carol", "alice", "bob"] {
        models.user.create([("username", name)]).unwrap();
    }

    let bob = models
        .user
        .get(Query::new().eq("username", "bob"))
        .unwrap()
        .unwrap();
    assert_eq!(bob.value("username"), Some(Value::from("bob")));
    assert!(models.user.get(Query::new().eq("username", "dave")).unwrap().is_none());

    let names: Vec<String> = models
        .user
        .list(Query::new().sort("username", SortDirection::Ascending))
        .unwrap()
        .iter()
        .map(|u| u.value("username").unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["alice", "bob", "carol"]);
    assert_eq!(models.user.count(Query::new()).unwrap(), 3);
}

#[test]
fn stored_form_uses_primary_key() {
    let models = Models::new();
    let bob = models.user.create([("username", "bob")]).unwrap();

    let stored = models.stored("user");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get(PRIMARY_KEY), Some(bob.id()));
    assert!(!stored[0].contains_key("id"));
}

#[test]
fn unknown_field_is_rejected_without_write() {
    let models = Models::new();
    let err = models
        .user
        .create([("username", "bob"), ("nickname", "b")])
        .unwrap_err();
    assert!(matches!(err, OdmError::UnknownField { ref field, .. } if field == "nickname"));
    assert!(err.is_validation());
    assert!(models.stored("user").is_empty());
}

#[test]
fn unique_username() {
    let models = Models::new();
    models.user.create([("username", "bob")]).unwrap();
    let err = models.user.create([("username", "bob")]).unwrap_err();
    assert!(matches!(err, OdmError::Storage(_)));
    assert_eq!(models.stored("user").len(), 1);
}

#[test]
fn query_by_referenced_document() {
    let models = Models::new();
    let bob = models.user.create([("username", "bob")]).unwrap();
    let alice = models.user.create([("username", "alice")]).unwrap();
    for (owner, subject) in [(&bob, "one"), (&bob, "two"), (&alice, "three")] {
        models
            .email
            .create([
                ("user", Assign::from(owner)),
                ("subject", subject.into()),
                ("body", "...".into()),
            ])
            .unwrap();
    }

    assert_eq!(models.email.count(Query::new().eq("user", &bob)).unwrap(), 2);
    assert_eq!(
        models
            .email
            .count(Query::new().eq("user", bob.id().clone()))
            .unwrap(),
        2
    );
    assert_eq!(models.email.remove(Query::new().eq("user", &alice)).unwrap(), 1);
    assert_eq!(models.email.count(Query::new()).unwrap(), 2);
}

#[test]
fn remove_by_query_marks_cached_documents() {
    let models = Models::new();
    let bob = models.user.create([("username", "bob")]).unwrap();
    let keep = models.user.create([("username", "keep")]).unwrap();

    assert_eq!(models.user.remove(Query::new().eq("username", "bob")).unwrap(), 1);
    assert!(bob.is_removed());
    assert!(!keep.is_removed());
    assert!(models.user.get_by_id(bob.id().clone()).unwrap().is_none());
}

#[test]
fn route_templates_with_prefix() {
    let models = Models::with_config(RegistryConfig::new().path_prefix("/api/"));
    assert_eq!(models.user.static_path_for(None), "/api/user/");
    assert_eq!(models.user.static_path_for(Some("new")), "/api/user/new");
    assert_eq!(
        models.user.doc_path_for(Some("edit"), None),
        "/api/user/<oid>/edit"
    );

    let bob = models.user.create([("username", "bob")]).unwrap();
    assert_eq!(bob.path(), format!("/api/user/{}", bob.id()));
    assert_eq!(
        models.email_entry.static_path_for(None),
        "/api/emailentry/"
    );
}
