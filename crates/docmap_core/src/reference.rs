//! Reference conversion between documents and stored ids.
//!
//! On the way in, documents assigned to reference fields become their ids.
//! On the way out, stored ids become live documents through the target
//! type's identity cache.

use crate::document::Document;
use crate::error::{OdmError, OdmResult};
use crate::reflist::RefList;
use crate::schema::SchemaNode;
use docmap_codec::{ObjectId, Record, Value};
use std::fmt;
use std::time::SystemTime;

/// A value assigned to a field.
#[derive(Debug, Clone)]
pub enum Assign {
    /// A plain value, stored as is.
    Value(Value),
    /// A document, stored as its id in reference fields.
    Entity(Document),
    /// A list of assignments, for list fields.
    List(Vec<Assign>),
}

impl Assign {
    /// Converts to a value for use in a query filter. Documents become
    /// their ids.
    #[must_use]
    pub fn into_query_value(self) -> Value {
        match self {
            Assign::Value(value) => value,
            Assign::Entity(doc) => doc.id().clone(),
            Assign::List(items) => {
                Value::Array(items.into_iter().map(Assign::into_query_value).collect())
            }
        }
    }
}

impl From<Value> for Assign {
    fn from(value: Value) -> Self {
        Assign::Value(value)
    }
}

impl From<Document> for Assign {
    fn from(doc: Document) -> Self {
        Assign::Entity(doc)
    }
}

impl From<&Document> for Assign {
    fn from(doc: &Document) -> Self {
        Assign::Entity(doc.clone())
    }
}

impl From<Vec<Document>> for Assign {
    fn from(docs: Vec<Document>) -> Self {
        Assign::List(docs.into_iter().map(Assign::Entity).collect())
    }
}

impl From<&[Document]> for Assign {
    fn from(docs: &[Document]) -> Self {
        Assign::List(docs.iter().map(Assign::from).collect())
    }
}

impl From<Option<Document>> for Assign {
    fn from(doc: Option<Document>) -> Self {
        doc.map_or(Assign::Value(Value::Null), Assign::Entity)
    }
}

impl From<Vec<Value>> for Assign {
    fn from(values: Vec<Value>) -> Self {
        Assign::Value(Value::Array(values))
    }
}

macro_rules! assign_from_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Assign {
                fn from(value: $t) -> Self {
                    Assign::Value(Value::from(value))
                }
            }
        )*
    };
}

assign_from_value!(bool, i64, i32, u32, f64, String, &str, ObjectId, Record, SystemTime, ());

/// A field read from a document.
#[derive(Debug)]
pub enum Field {
    /// A stored value.
    Value(Value),
    /// The document a scalar reference points at.
    Entity(Document),
    /// The documents a list of references points at.
    References(RefList),
    /// The field is absent, or an optional reference has no target.
    ///
    /// Falsy, and rendered as the empty string.
    NoValue,
}

impl Field {
    /// Returns true for [`Field::NoValue`].
    #[must_use]
    pub fn is_no_value(&self) -> bool {
        matches!(self, Field::NoValue)
    }

    /// Truthiness: `NoValue`, null, `false`, zero and empty text,
    /// arrays, maps and reference lists are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Field::NoValue => false,
            Field::Entity(_) => true,
            Field::References(list) => !list.is_empty(),
            Field::Value(value) => match value {
                Value::Null => false,
                Value::Bool(b) => *b,
                Value::Integer(n) => *n != 0,
                Value::Float(n) => *n != 0.0,
                Value::Text(s) => !s.is_empty(),
                Value::Bytes(b) => !b.is_empty(),
                Value::ObjectId(_) | Value::Timestamp(_) => true,
                Value::Array(items) => !items.is_empty(),
                Value::Map(entries) => !entries.is_empty(),
            },
        }
    }

    /// Returns the stored value, if this is a plain value.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Converts into the stored value, if this is a plain value.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the text, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_text)
    }

    /// Returns the referenced document, if any.
    #[must_use]
    pub fn as_entity(&self) -> Option<&Document> {
        match self {
            Field::Entity(doc) => Some(doc),
            _ => None,
        }
    }

    /// Converts into the referenced document, if any.
    #[must_use]
    pub fn into_entity(self) -> Option<Document> {
        match self {
            Field::Entity(doc) => Some(doc),
            _ => None,
        }
    }

    /// Converts into the reference list proxy, if this is one.
    #[must_use]
    pub fn into_references(self) -> Option<RefList> {
        match self {
            Field::References(list) => Some(list),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(value) => write!(f, "{value}"),
            Field::Entity(doc) => write!(f, "{doc:?}"),
            Field::References(list) => f.debug_list().entries(list.iter()).finish(),
            Field::NoValue => Ok(()),
        }
    }
}

/// Converts an assignment into the form stored under `node`.
///
/// Returns `None` when the assignment clears an optional field.
pub(crate) fn to_storage_form(
    entity: &str,
    path: &str,
    node: &SchemaNode,
    assign: Assign,
) -> OdmResult<Option<Value>> {
    match (node, assign) {
        (_, Assign::Value(Value::Null)) => {
            if !node.is_required() {
                Ok(None)
            } else if matches!(node.reference_field(), Some((_, false))) {
                Err(OdmError::dangling_reference(entity, path))
            } else {
                Ok(Some(Value::Null))
            }
        }
        (_, Assign::Value(value)) => Ok(Some(value)),
        (SchemaNode::Field(field), Assign::Entity(doc)) => {
            let Some(target) = field.value_type().reference_target() else {
                return Err(OdmError::type_mismatch(
                    entity,
                    path,
                    field.value_type().describe(),
                    format!("{} document", doc.entity_type().name()),
                ));
            };
            if target.name() != doc.entity_type().name() {
                return Err(OdmError::type_mismatch(
                    entity,
                    path,
                    field.value_type().describe(),
                    format!("{} document", doc.entity_type().name()),
                ));
            }
            doc.ensure_live()?;
            Ok(Some(doc.id().clone()))
        }
        (SchemaNode::List(_), Assign::List(items)) => {
            let Some(item) = node.list_item() else {
                return Err(OdmError::invalid_schema(
                    entity,
                    format!("list field {path} takes exactly one item descriptor"),
                ));
            };
            let values = items
                .into_iter()
                .enumerate()
                .map(|(i, a)| {
                    to_storage_form(entity, &format!("{path}.{i}"), item, a)
                        .map(|v| v.unwrap_or(Value::Null))
                })
                .collect::<OdmResult<Vec<_>>>()?;
            Ok(Some(Value::Array(values)))
        }
        (_, Assign::List(items)) => {
            let values = items
                .into_iter()
                .map(|a| match a {
                    Assign::Entity(doc) => Err(OdmError::type_mismatch(
                        entity,
                        path,
                        "value",
                        format!("{} document", doc.entity_type().name()),
                    )),
                    other => Ok(other.into_query_value()),
                })
                .collect::<OdmResult<Vec<_>>>()?;
            Ok(Some(Value::Array(values)))
        }
        (_, Assign::Entity(doc)) => Err(OdmError::type_mismatch(
            entity,
            path,
            match node {
                SchemaNode::List(_) => "array",
                _ => "map",
            },
            format!("{} document", doc.entity_type().name()),
        )),
    }
}
