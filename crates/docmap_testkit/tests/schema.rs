//! Schema evolution, nested validation, lists, patterns and key escaping.

use docmap_codec::{Record, Value};
use docmap_core::{Assign, OdmError, Query};
use docmap_storage::{DocumentCollection, PRIMARY_KEY};
use docmap_testkit::prelude::*;

fn no_fields() -> Vec<(&'static str, Assign)> {
    Vec::new()
}

#[test]
fn new_fields_are_filled_on_read() {
    let models = Models::new();
    let bob = models.user.create([("username", "bob")]).unwrap();

    let migrated = models.user_after_changes.fetch(bob.id().clone()).unwrap();
    assert_eq!(migrated.value("lang"), Some(Value::from("en")));
    assert!(!models.stored("user")[0].contains_key("lang"));

    migrated.save().unwrap();
    assert_eq!(models.stored("user")[0]["lang"], Value::from("en"));
}

#[test]
fn nested_schema_is_validated() {
    let models = Models::new();
    let kind = &models.embed_doc_with_validation;

    let err = kind.create(no_fields()).unwrap_err();
    assert!(matches!(err, OdmError::RequiredFieldMissing { ref field, .. } if field == "data.height"));

    let err = kind
        .create([(
            "data",
            Value::map([("height", Value::Integer(180)), ("weight", Value::Float(70.5))]),
        )])
        .unwrap_err();
    assert!(matches!(err, OdmError::TypeMismatch { ref field, .. } if field == "data.height"));

    let err = kind
        .create([(
            "data",
            Value::map([
                ("height", Value::Float(1.8)),
                ("weight", Value::Float(70.5)),
                ("age", Value::Integer(3)),
            ]),
        )])
        .unwrap_err();
    assert!(matches!(err, OdmError::UnknownField { ref field, .. } if field == "data.age"));

    kind.create([(
        "data",
        Value::map([("height", Value::Float(1.8)), ("weight", Value::Float(70.5))]),
    )])
    .unwrap();
    assert_eq!(models.stored("embeddocwithvalidation").len(), 1);
}

#[test]
fn reserved_characters_in_map_keys_are_escaped() {
    let models = Models::new();
    let data = Value::map([("a.b", Value::from("c")), ("$x", Value::from(1))]);
    let doc = models.embed_doc.create([("data", data.clone())]).unwrap();

    assert_eq!(
        models.stored("embeddoc")[0]["data"],
        Value::map([("a&period;b", Value::from("c")), ("&dollar;x", Value::from(1))])
    );

    models.registry.reset_caches().unwrap();
    let reread = models.embed_doc.fetch(doc.id().clone()).unwrap();
    assert!(!reread.ptr_eq(&doc));
    assert_eq!(reread.value("data"), Some(data));
}

#[test]
fn escaped_keys_survive_partial_updates() {
    let models = Models::new();
    let doc = models
        .embed_doc
        .create([("data", Value::map([("k", Value::from(1))]))])
        .unwrap();
    doc.update_field("data", Value::map([("v1.2", Value::from(true))]))
        .unwrap();

    assert_eq!(
        models.stored("embeddoc")[0]["data"],
        Value::map([("v1&period;2", Value::from(true))])
    );
}

#[test]
fn typed_lists() {
    let models = Models::new();
    let kind = &models.schema_with_list;

    let empty = kind.create(no_fields()).unwrap();
    assert_eq!(empty.value("numbers"), Some(Value::Array(Vec::new())));
    assert_eq!(empty.value("users"), Some(Value::Array(Vec::new())));

    let err = kind
        .create([("numbers", Value::from(vec![Value::from(1), Value::from("two")]))])
        .unwrap_err();
    assert!(matches!(err, OdmError::TypeMismatch { ref field, .. } if field == "numbers.1"));

    let doc = kind.create([("numbers", Value::from(vec![1, 2, 3]))]).unwrap();
    doc.push("numbers", 4).unwrap();
    doc.save().unwrap();
    let stored = models
        .stored("schemawithlist")
        .into_iter()
        .find(|r| r.get(PRIMARY_KEY) == Some(doc.id()))
        .unwrap();
    assert_eq!(stored["numbers"], Value::from(vec![1, 2, 3, 4]));
}

#[test]
fn whole_floats_in_integer_lists_read_back_as_integers() {
    let models = Models::new();
    let mut record = Record::new();
    let id = Value::ObjectId(docmap_codec::ObjectId::new());
    record.insert(PRIMARY_KEY.to_string(), id.clone());
    record.insert(
        "numbers".to_string(),
        Value::Array(vec![Value::Float(1.0), Value::Float(2.0)]),
    );
    models
        .store
        .memory_collection("schemawithlist")
        .insert(record)
        .unwrap();

    let doc = models.schema_with_list.fetch(id).unwrap();
    assert_eq!(doc.value("numbers"), Some(Value::from(vec![1, 2])));
    assert_eq!(doc.value("users"), Some(Value::Array(Vec::new())));
}

#[test]
fn pattern_fields() {
    let models = Models::new();
    models
        .email_entry
        .create([("address", "bob@example.com")])
        .unwrap();

    for bad in ["not-an-email", "@example.com", "bob@example"] {
        let err = models.email_entry.create([("address", bad)]).unwrap_err();
        assert!(
            matches!(err, OdmError::DisallowedValue { .. }),
            "{bad} should be rejected"
        );
    }
    assert_eq!(models.email_entry.count(Query::new()).unwrap(), 1);
}

#[test]
fn subtypes_extend_their_parent() {
    let models = Models::new();
    let farmer = models
        .farmer
        .create([("username", "old macdonald"), ("farm_name", "the farm")])
        .unwrap();
    assert_eq!(farmer.entity_type().name(), "Farmer");
    assert_eq!(models.stored("farmer").len(), 1);
    assert!(models.stored("user").is_empty());

    let err = models.farmer.create([("username", "x")]).unwrap_err();
    assert!(matches!(err, OdmError::RequiredFieldMissing { ref field, .. } if field == "farm_name"));

    let indexes: Vec<String> = models
        .farmer
        .collection()
        .index_information()
        .unwrap()
        .into_keys()
        .collect();
    assert_eq!(indexes, vec!["_id_", "farm_name_1", "username_1"]);
}

#[test]
fn timestamp_fields_store_epoch_seconds() {
    use docmap_core::{EntityType, FieldDescriptor, Registry};
    use docmap_storage::SortDirection;
    use std::time::{Duration, UNIX_EPOCH};

    let registry = Registry::in_memory();
    let events = registry
        .register(
            EntityType::builder("Event")
                .field("name", FieldDescriptor::text())
                .field("at", FieldDescriptor::timestamp()),
        )
        .unwrap();

    let late = events
        .create([
            ("name", Assign::from("late")),
            ("at", Assign::from(UNIX_EPOCH + Duration::from_secs(200))),
        ])
        .unwrap();
    events
        .create([("name", Assign::from("early")), ("at", Value::Timestamp(100).into())])
        .unwrap();
    assert!(events.create([("name", "bad"), ("at", "yesterday")]).is_err());

    let ordered: Vec<_> = events
        .list(Query::new().sort("at", SortDirection::Ascending))
        .unwrap()
        .iter()
        .map(|doc| doc.value("name"))
        .collect();
    assert_eq!(ordered, [Some(Value::from("early")), Some(Value::from("late"))]);

    registry.reset_caches().unwrap();
    let reread = events.fetch(late.id().clone()).unwrap();
    assert_eq!(reread.value("at"), Some(Value::Timestamp(200)));
    assert_eq!(reread.to_plain().unwrap()["at"], serde_json::json!(200));
}
