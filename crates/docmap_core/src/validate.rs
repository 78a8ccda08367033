//! Record validation against a schema.

use crate::error::{OdmError, OdmResult};
use crate::schema::{join_path, Schema, SchemaNode};
use docmap_codec::{Record, Value};

/// Checks records for one entity type.
///
/// The schema is closed: keys it does not declare are rejected. Errors
/// name the dotted path of the offending field.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    entity: &'a str,
}

impl<'a> Validator<'a> {
    /// Creates a validator that reports errors against `entity`.
    #[must_use]
    pub fn new(entity: &'a str) -> Self {
        Self { entity }
    }

    /// Validates a whole record.
    ///
    /// # Errors
    ///
    /// Returns the first violation found: `UnknownField`,
    /// `RequiredFieldMissing`, `TypeMismatch`, `DisallowedValue` or
    /// `InvalidSchema`.
    pub fn validate(&self, schema: &Schema, record: &Record) -> OdmResult<()> {
        self.validate_at(schema, record, "")
    }

    fn validate_at(&self, schema: &Schema, record: &Record, prefix: &str) -> OdmResult<()> {
        if let Some(unknown) = record.keys().find(|k| !schema.contains(k)) {
            return Err(OdmError::unknown_field(
                self.entity,
                join_path(prefix, unknown),
            ));
        }

        for (name, node) in schema.iter() {
            let path = join_path(prefix, name);
            match record.get(name) {
                Some(value) => self.validate_node(&path, node, value)?,
                None if node.is_required() => {
                    return Err(OdmError::required_missing(self.entity, path));
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Validates one value against one node.
    ///
    /// # Errors
    ///
    /// Same as [`Validator::validate`].
    pub fn validate_node(&self, path: &str, node: &SchemaNode, value: &Value) -> OdmResult<()> {
        match node {
            SchemaNode::Field(field) => field.check_at(self.entity, path, value),
            SchemaNode::Nested { schema, .. } => match value {
                Value::Map(inner) => self.validate_at(schema, inner, path),
                other => Err(self.mismatch(path, "map", other)),
            },
            SchemaNode::List(items) => {
                let [item] = items.as_slice() else {
                    return Err(OdmError::invalid_schema(
                        self.entity,
                        format!(
                            "list field {path} takes exactly one item descriptor, got {}",
                            items.len()
                        ),
                    ));
                };
                let Value::Array(values) = value else {
                    return Err(self.mismatch(path, "array", value));
                };
                values
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, v)| self.validate_node(&format!("{path}.{i}"), item, v))
            }
        }
    }

    fn mismatch(&self, path: &str, expected: &str, found: &Value) -> OdmError {
        OdmError::type_mismatch(self.entity, path, expected, found.type_name())
    }
}
