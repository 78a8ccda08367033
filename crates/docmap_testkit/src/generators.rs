//! Property-based test generators using proptest.
//!
//! Provides strategies for generating ids, map keys and values in the
//! shapes the mapper stores.

use docmap_codec::{ObjectId, Record, Value};
use proptest::prelude::*;

/// Strategy for generating object ids.
pub fn object_id_strategy() -> impl Strategy<Value = ObjectId> {
    prop::array::uniform16(any::<u8>()).prop_map(ObjectId::from_bytes)
}

/// Strategy for generating usernames.
pub fn username_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating map keys that may contain `$` and `.`.
pub fn awkward_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z$.]{1,12}").expect("Invalid regex")
}

/// Strategy for generating scalar values.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e6f64..1.0e6f64).prop_map(Value::Float),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
        object_id_strategy().prop_map(Value::ObjectId),
        any::<i64>().prop_map(Value::Timestamp),
    ]
}

/// Strategy for generating nested values whose map keys may need escaping.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(awkward_key_strategy(), inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// Strategy for generating an embedded `data` map.
pub fn data_map_strategy() -> impl Strategy<Value = Record> {
    prop::collection::btree_map(awkward_key_strategy(), value_strategy(), 0..6)
}
