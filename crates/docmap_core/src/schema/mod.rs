//! Schema definitions.
//!
//! A [`Schema`] maps field names to [`SchemaNode`]s. A node is a field
//! descriptor, a nested schema, or a list whose single element describes
//! every item.

mod field;
mod type_ref;

pub use field::{DefaultValue, FieldDescriptor, FieldType};
pub use type_ref::TypeRef;

use crate::error::{OdmError, OdmResult};
use docmap_codec::{Record, Value};
use std::collections::BTreeMap;

/// Name of the logical primary key field.
pub const ID_FIELD: &str = "id";

/// One entry of a schema.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    /// A scalar or reference field.
    Field(FieldDescriptor),
    /// An embedded map validated against its own schema.
    Nested {
        /// The embedded schema.
        schema: Schema,
        /// Whether the map must be present.
        required: bool,
    },
    /// A list; the single element describes every item.
    List(Vec<SchemaNode>),
}

impl SchemaNode {
    /// A list node whose items follow `item`.
    #[must_use]
    pub fn list_of(item: impl Into<SchemaNode>) -> Self {
        SchemaNode::List(vec![item.into()])
    }

    /// Returns the field descriptor, if this is a field node.
    #[must_use]
    pub fn as_field(&self) -> Option<&FieldDescriptor> {
        match self {
            SchemaNode::Field(field) => Some(field),
            _ => None,
        }
    }

    /// Returns the item descriptor, if this is a well-formed list node.
    #[must_use]
    pub fn list_item(&self) -> Option<&SchemaNode> {
        match self {
            SchemaNode::List(items) if items.len() == 1 => items.first(),
            _ => None,
        }
    }

    /// Returns true if the node must be present in a valid record.
    #[must_use]
    pub fn is_required(&self) -> bool {
        match self {
            SchemaNode::Field(field) => field.is_required(),
            SchemaNode::Nested { required, .. } => *required,
            SchemaNode::List(_) => false,
        }
    }

    /// Returns the reference field descriptor for a scalar reference or a
    /// list of references.
    pub(crate) fn reference_field(&self) -> Option<(&FieldDescriptor, bool)> {
        match self {
            SchemaNode::Field(field) if field.value_type().is_reference() => Some((field, false)),
            SchemaNode::List(_) => match self.list_item() {
                Some(SchemaNode::Field(field)) if field.value_type().is_reference() => {
                    Some((field, true))
                }
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<FieldDescriptor> for SchemaNode {
    fn from(field: FieldDescriptor) -> Self {
        SchemaNode::Field(field)
    }
}

impl From<Schema> for SchemaNode {
    fn from(schema: Schema) -> Self {
        SchemaNode::Nested {
            schema,
            required: true,
        }
    }
}

/// A mapping from field names to schema nodes.
///
/// # Example
///
/// ```rust
/// use docmap_core::{FieldDescriptor, Schema};
///
/// let schema = Schema::new()
///     .field("username", FieldDescriptor::text())
///     .nested(
///         "data",
///         Schema::new()
///             .field("height", FieldDescriptor::float())
///             .field("weight", FieldDescriptor::float()),
///     )
///     .list("numbers", FieldDescriptor::integer());
/// assert_eq!(schema.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    nodes: BTreeMap<String, SchemaNode>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing any node with the same name.
    #[must_use]
    pub fn field(self, name: impl Into<String>, field: FieldDescriptor) -> Self {
        self.node(name, SchemaNode::Field(field))
    }

    /// Adds a required nested schema.
    #[must_use]
    pub fn nested(self, name: impl Into<String>, schema: Schema) -> Self {
        self.node(name, SchemaNode::from(schema))
    }

    /// Adds an optional nested schema.
    #[must_use]
    pub fn optional_nested(self, name: impl Into<String>, schema: Schema) -> Self {
        self.node(
            name,
            SchemaNode::Nested {
                schema,
                required: false,
            },
        )
    }

    /// Adds a list whose items follow `item`.
    #[must_use]
    pub fn list(self, name: impl Into<String>, item: impl Into<SchemaNode>) -> Self {
        self.node(name, SchemaNode::list_of(item))
    }

    /// Adds any node.
    #[must_use]
    pub fn node(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.nodes.insert(name.into(), node);
        self
    }

    /// Inserts a node in place.
    pub fn insert(&mut self, name: impl Into<String>, node: SchemaNode) {
        self.nodes.insert(name.into(), node);
    }

    /// Returns the node for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.nodes.get(name)
    }

    /// Returns true if `name` is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Iterates over declared fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.nodes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no fields are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Checks the definition itself: every list node must have exactly one
    /// item descriptor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` naming the offending path.
    pub fn check(&self, entity: &str) -> OdmResult<()> {
        self.check_at(entity, "")
    }

    fn check_at(&self, entity: &str, prefix: &str) -> OdmResult<()> {
        for (name, node) in &self.nodes {
            check_node(entity, &join_path(prefix, name), node)?;
        }
        Ok(())
    }

    /// Injects the generated `id` field, or checks a declared one.
    ///
    /// # Errors
    ///
    /// Returns `PrimaryKeyMisconfigured` if `id` is declared without a
    /// default factory.
    pub(crate) fn ensure_primary_key(&mut self, entity: &str) -> OdmResult<()> {
        match self.nodes.get(ID_FIELD) {
            None => {
                self.insert(ID_FIELD, FieldDescriptor::generated_id().into());
                Ok(())
            }
            Some(SchemaNode::Field(field))
                if field.default().is_some_and(DefaultValue::is_factory) =>
            {
                Ok(())
            }
            Some(_) => Err(OdmError::PrimaryKeyMisconfigured {
                entity: entity.to_string(),
            }),
        }
    }

    /// Fills absent fields with their defaults.
    ///
    /// Absent lists become empty, absent required nested maps become empty
    /// maps, and present nested maps are filled recursively.
    pub fn fill_defaults(&self, record: &mut Record) {
        for (name, node) in &self.nodes {
            match node {
                SchemaNode::Field(field) => {
                    if !record.contains_key(name) {
                        if let Some(default) = field.default() {
                            record.insert(name.clone(), default.produce());
                        }
                    }
                }
                SchemaNode::Nested { schema, required } => match record.get_mut(name) {
                    Some(Value::Map(inner)) => schema.fill_defaults(inner),
                    Some(_) => {}
                    None if *required => {
                        let mut inner = Record::new();
                        schema.fill_defaults(&mut inner);
                        record.insert(name.clone(), Value::Map(inner));
                    }
                    None => {}
                },
                SchemaNode::List(_) => {
                    record
                        .entry(name.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                }
            }
        }
    }

    /// Turns whole floats stored under integer fields back into integers.
    pub fn coerce_numbers(&self, record: &mut Record) {
        for (name, node) in &self.nodes {
            let Some(value) = record.get_mut(name) else {
                continue;
            };
            match node {
                SchemaNode::Field(field) => coerce_value(field, value),
                SchemaNode::Nested { schema, .. } => {
                    if let Value::Map(inner) = value {
                        schema.coerce_numbers(inner);
                    }
                }
                SchemaNode::List(_) => {
                    if let (Some(SchemaNode::Field(field)), Value::Array(items)) =
                        (node.list_item(), value)
                    {
                        for item in items {
                            coerce_value(field, item);
                        }
                    }
                }
            }
        }
    }
}

// Floats under integer fields are truncated toward zero. Non-finite or
// out-of-range floats stay as they are and fail validation on write.
fn coerce_value(field: &FieldDescriptor, value: &mut Value) {
    if let (FieldType::Integer, Value::Float(n)) = (field.value_type(), &*value) {
        let whole = n.trunc();
        if whole.is_finite() && whole.abs() < i64::MAX as f64 {
            *value = Value::Integer(whole as i64);
        }
    }
}

fn check_node(entity: &str, path: &str, node: &SchemaNode) -> OdmResult<()> {
    match node {
        SchemaNode::Field(_) => Ok(()),
        SchemaNode::Nested { schema, .. } => schema.check_at(entity, path),
        SchemaNode::List(items) => match items.as_slice() {
            [item] => check_node(entity, path, item),
            _ => Err(OdmError::invalid_schema(
                entity,
                format!(
                    "list field {path} takes exactly one item descriptor, got {}",
                    items.len()
                ),
            )),
        },
    }
}

pub(crate) fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_schema() -> Schema {
        Schema::new()
            .field("username", FieldDescriptor::text())
            .field("lang", FieldDescriptor::text().default_value("en"))
    }

    #[test]
    fn injects_generated_id() {
        let mut schema = user_schema();
        schema.ensure_primary_key("User").unwrap();

        let id = schema.get(ID_FIELD).and_then(SchemaNode::as_field).unwrap();
        assert!(!id.is_required());
        assert!(id.default().is_some_and(DefaultValue::is_factory));
    }

    #[test]
    fn declared_id_needs_factory() {
        let mut schema = user_schema().field("id", FieldDescriptor::text());
        assert!(matches!(
            schema.ensure_primary_key("User"),
            Err(OdmError::PrimaryKeyMisconfigured { .. })
        ));

        let mut schema = user_schema().field("id", FieldDescriptor::text().default_value("x"));
        assert!(schema.ensure_primary_key("User").is_err());

        let mut schema = user_schema().field(
            "id",
            FieldDescriptor::text().default_with(|| Value::from("generated")),
        );
        assert!(schema.ensure_primary_key("User").is_ok());
    }

    #[test]
    fn list_arity_is_checked() {
        let empty = Schema::new().node("tags", SchemaNode::List(Vec::new()));
        assert!(matches!(
            empty.check("Post"),
            Err(OdmError::InvalidSchema { .. })
        ));

        let two = Schema::new().node(
            "tags",
            SchemaNode::List(vec![
                FieldDescriptor::text().into(),
                FieldDescriptor::integer().into(),
            ]),
        );
        assert!(two.check("Post").is_err());

        let nested = Schema::new().nested(
            "meta",
            Schema::new().node("bad", SchemaNode::List(Vec::new())),
        );
        let err = nested.check("Post").unwrap_err();
        assert!(err.to_string().contains("meta.bad"));

        assert!(Schema::new()
            .list("tags", FieldDescriptor::text())
            .check("Post")
            .is_ok());
    }

    #[test]
    fn fill_defaults_recurses() {
        let schema = Schema::new()
            .field("lang", FieldDescriptor::text().default_value("en"))
            .field("nick", FieldDescriptor::text().optional())
            .list("numbers", FieldDescriptor::integer())
            .nested(
                "data",
                Schema::new().field("unit", FieldDescriptor::text().default_value("kg")),
            )
            .optional_nested("extra", Schema::new());

        let mut record = Record::new();
        schema.fill_defaults(&mut record);

        assert_eq!(record["lang"], Value::from("en"));
        assert_eq!(record["numbers"], Value::Array(Vec::new()));
        assert_eq!(record["data"], Value::map([("unit", Value::from("kg"))]));
        assert!(!record.contains_key("nick"));
        assert!(!record.contains_key("extra"));
    }

    #[test]
    fn fill_defaults_keeps_present_values() {
        let schema = user_schema();
        let mut record = Record::new();
        record.insert("lang".into(), "fr".into());
        schema.fill_defaults(&mut record);
        assert_eq!(record["lang"], Value::from("fr"));
    }

    #[test]
    fn integer_fields_truncate_floats() {
        let schema = Schema::new()
            .field("count", FieldDescriptor::integer())
            .field("ratio", FieldDescriptor::float())
            .list("numbers", FieldDescriptor::integer());

        let mut record = Record::new();
        record.insert("count".into(), Value::Float(3.0));
        record.insert("ratio".into(), Value::Float(3.0));
        record.insert(
            "numbers".into(),
            Value::Array(vec![
                Value::Float(1.0),
                Value::Float(1.5),
                Value::Float(-2.7),
                Value::Float(f64::NAN),
            ]),
        );
        schema.coerce_numbers(&mut record);

        assert_eq!(record["count"], Value::Integer(3));
        assert_eq!(record["ratio"], Value::Float(3.0));
        let Value::Array(numbers) = &record["numbers"] else {
            panic!("numbers should stay a list");
        };
        assert_eq!(
            numbers[..3],
            [Value::Integer(1), Value::Integer(1), Value::Integer(-2)]
        );
        assert!(matches!(numbers[3], Value::Float(n) if n.is_nan()));

        let mut record = Record::new();
        record.insert("count".into(), Value::Float(42.5));
        schema.coerce_numbers(&mut record);
        assert_eq!(record["count"], Value::Integer(42));
    }
}
