//! Field descriptors.

use crate::entity::EntityType;
use crate::error::{OdmError, OdmResult};
use crate::schema::TypeRef;
use docmap_codec::{ObjectId, Value};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Declared type of a scalar field.
#[derive(Clone)]
pub enum FieldType {
    /// Any value, including null.
    Any,
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Integer,
    /// Floating point. Integers are not accepted.
    Float,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Bytes,
    /// Object id.
    ObjectId,
    /// Point in time, stored as epoch seconds.
    Timestamp,
    /// Free-form map.
    Map,
    /// Free-form array.
    List,
    /// The object id of another entity type's document.
    Reference(TypeRef),
}

impl FieldType {
    /// Returns true if `value` is an instance of this type.
    ///
    /// References accept only object ids; wrappers are converted before
    /// validation.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldType::Any, _)
                | (FieldType::Bool, Value::Bool(_))
                | (FieldType::Integer, Value::Integer(_))
                | (FieldType::Float, Value::Float(_))
                | (FieldType::Text, Value::Text(_))
                | (FieldType::Bytes, Value::Bytes(_))
                | (FieldType::ObjectId | FieldType::Reference(_), Value::ObjectId(_))
                | (FieldType::Timestamp, Value::Timestamp(_))
                | (FieldType::Map, Value::Map(_))
                | (FieldType::List, Value::Array(_))
        )
    }

    /// Returns the reference target, if this is a reference type.
    #[must_use]
    pub fn reference_target(&self) -> Option<&TypeRef> {
        match self {
            FieldType::Reference(target) => Some(target),
            _ => None,
        }
    }

    /// Returns true for reference types.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Reference(_))
    }

    /// Describes the type for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            FieldType::Any => "any".to_string(),
            FieldType::Bool => "bool".to_string(),
            FieldType::Integer => "integer".to_string(),
            FieldType::Float => "float".to_string(),
            FieldType::Text => "text".to_string(),
            FieldType::Bytes => "bytes".to_string(),
            FieldType::ObjectId => "object id".to_string(),
            FieldType::Timestamp => "timestamp".to_string(),
            FieldType::Map => "map".to_string(),
            FieldType::List => "array".to_string(),
            FieldType::Reference(target) => format!("object id of {}", target.name()),
        }
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Default value for an absent field.
#[derive(Clone)]
pub enum DefaultValue {
    /// A constant, cloned for every record.
    Constant(Value),
    /// A generator called once per record.
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Produces the default.
    #[must_use]
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Constant(value) => value.clone(),
            DefaultValue::Factory(factory) => factory(),
        }
    }

    /// Returns true for generator defaults.
    #[must_use]
    pub fn is_factory(&self) -> bool {
        matches!(self, DefaultValue::Factory(_))
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            DefaultValue::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Declarative rules for one scalar or reference field.
///
/// Fields are required unless marked otherwise. A default, when present,
/// fills the field on creation and whenever a stored record lacks it.
///
/// # Example
///
/// ```rust
/// use docmap_core::FieldDescriptor;
/// use docmap_codec::Value;
///
/// let lang = FieldDescriptor::text().default_value("en");
/// let level = FieldDescriptor::integer()
///     .allowed_values(vec![Value::from(1), Value::from(2)])
///     .unwrap();
/// assert!(lang.is_required());
/// assert!(level.check(&Value::from(3)).is_err());
/// ```
#[derive(Clone)]
pub struct FieldDescriptor {
    value_type: FieldType,
    required: bool,
    default: Option<DefaultValue>,
    allowed_values: Option<Vec<Value>>,
    pattern: Option<Regex>,
}

impl FieldDescriptor {
    /// Creates a required field of the given type.
    #[must_use]
    pub fn new(value_type: FieldType) -> Self {
        Self {
            value_type,
            required: true,
            default: None,
            allowed_values: None,
            pattern: None,
        }
    }

    /// A required text field.
    #[must_use]
    pub fn text() -> Self {
        Self::new(FieldType::Text)
    }

    /// A required integer field.
    #[must_use]
    pub fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    /// A required float field.
    #[must_use]
    pub fn float() -> Self {
        Self::new(FieldType::Float)
    }

    /// A required boolean field.
    #[must_use]
    pub fn boolean() -> Self {
        Self::new(FieldType::Bool)
    }

    /// A required object id field.
    #[must_use]
    pub fn object_id() -> Self {
        Self::new(FieldType::ObjectId)
    }

    /// A required timestamp field.
    #[must_use]
    pub fn timestamp() -> Self {
        Self::new(FieldType::Timestamp)
    }

    /// A required free-form map field.
    #[must_use]
    pub fn map() -> Self {
        Self::new(FieldType::Map)
    }

    /// A required free-form array field.
    #[must_use]
    pub fn list() -> Self {
        Self::new(FieldType::List)
    }

    /// A field accepting any value.
    #[must_use]
    pub fn any() -> Self {
        Self::new(FieldType::Any)
    }

    /// A required reference to a registered entity type.
    #[must_use]
    pub fn reference(target: &EntityType) -> Self {
        Self::new(FieldType::Reference(TypeRef::to(target)))
    }

    /// A required reference to an entity type by name, resolved on first use.
    ///
    /// Use this for self references and for types registered later.
    #[must_use]
    pub fn reference_to(name: impl Into<String>) -> Self {
        Self::new(FieldType::Reference(TypeRef::named(name)))
    }

    /// Sets whether the field must be present.
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Marks the field as optional.
    #[must_use]
    pub fn optional(self) -> Self {
        self.required(false)
    }

    /// Sets a constant default.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Constant(value.into()));
        self
    }

    /// Sets a default generator, called once per record.
    #[must_use]
    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Factory(Arc::new(factory)));
        self
    }

    /// Restricts the field to a closed set of values.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if a member is not an instance of the field type.
    pub fn allowed_values(mut self, values: Vec<Value>) -> OdmResult<Self> {
        if let Some(bad) = values.iter().find(|v| !self.value_type.accepts(v)) {
            return Err(OdmError::type_mismatch(
                "<schema>",
                "allowed_values",
                self.value_type.describe(),
                bad.type_name(),
            ));
        }
        self.allowed_values = Some(values);
        Ok(self)
    }

    /// Requires values to match a regular expression anchored at the start.
    ///
    /// Non-text values are matched against their display form.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` if the pattern does not compile.
    pub fn pattern(mut self, pattern: &str) -> OdmResult<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| OdmError::invalid_schema("<schema>", format!("bad pattern: {e}")))?;
        self.pattern = Some(regex);
        Ok(self)
    }

    /// Returns the declared type.
    #[must_use]
    pub fn value_type(&self) -> &FieldType {
        &self.value_type
    }

    /// Returns true if the field must be present.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the default, if any.
    #[must_use]
    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Returns the allowed value set, if any.
    #[must_use]
    pub fn allowed(&self) -> Option<&[Value]> {
        self.allowed_values.as_deref()
    }

    /// Returns the pattern source, if any.
    #[must_use]
    pub fn pattern_str(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    /// Checks one value against type, allowed set and pattern.
    ///
    /// Errors carry placeholder entity and field names; the validator
    /// reports real ones.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` or `DisallowedValue`.
    pub fn check(&self, value: &Value) -> OdmResult<()> {
        self.check_at("<schema>", "<value>", value)
    }

    pub(crate) fn check_at(&self, entity: &str, field: &str, value: &Value) -> OdmResult<()> {
        if !self.value_type.accepts(value) {
            return Err(OdmError::type_mismatch(
                entity,
                field,
                self.value_type.describe(),
                value.type_name(),
            ));
        }

        if let Some(allowed) = &self.allowed_values {
            if !allowed.contains(value) {
                return Err(OdmError::disallowed(
                    entity,
                    field,
                    value.to_string(),
                    "is not an allowed value",
                ));
            }
        }

        if let Some(regex) = &self.pattern {
            let text = value.to_string();
            if !regex.find(&text).is_some_and(|m| m.start() == 0) {
                return Err(OdmError::disallowed(
                    entity,
                    field,
                    text,
                    format!("does not match {}", regex.as_str()),
                ));
            }
        }

        Ok(())
    }

    /// The descriptor injected for schemas that do not declare `id`.
    pub(crate) fn generated_id() -> Self {
        Self::object_id()
            .optional()
            .default_with(|| Value::ObjectId(ObjectId::new()))
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("value_type", &self.value_type)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("allowed_values", &self.allowed_values)
            .field("pattern", &self.pattern_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_rejects_integer() {
        let weight = FieldDescriptor::float();
        assert!(weight.check(&Value::Float(20.0)).is_ok());
        assert!(matches!(
            weight.check(&Value::Integer(20)),
            Err(OdmError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn timestamp_fields_take_only_timestamps() {
        let seen = FieldDescriptor::timestamp();
        assert!(seen.check(&Value::Timestamp(1_700_000_000)).is_ok());
        assert!(matches!(
            seen.check(&Value::Integer(1_700_000_000)),
            Err(OdmError::TypeMismatch { .. })
        ));
        assert_eq!(seen.value_type().describe(), "timestamp");
    }

    #[test]
    fn reference_accepts_only_object_ids() {
        let user = FieldDescriptor::reference_to("User");
        assert!(user.check(&Value::ObjectId(ObjectId::new())).is_ok());
        assert!(user.check(&Value::from("abc")).is_err());
        assert!(user.value_type().is_reference());
    }

    #[test]
    fn allowed_values_membership() {
        let color = FieldDescriptor::text()
            .allowed_values(vec!["red".into(), "blue".into()])
            .unwrap();
        assert!(color.check(&"red".into()).is_ok());
        assert!(matches!(
            color.check(&"green".into()),
            Err(OdmError::DisallowedValue { .. })
        ));
    }

    #[test]
    fn allowed_values_must_match_type() {
        let result = FieldDescriptor::integer().allowed_values(vec!["one".into()]);
        assert!(matches!(result, Err(OdmError::TypeMismatch { .. })));
    }

    #[test]
    fn pattern_is_anchored_at_start() {
        let email = FieldDescriptor::text()
            .pattern(r"[^@]+@[^@]+\.[^@]+")
            .unwrap();
        assert!(email.check(&"user@example.com".into()).is_ok());
        assert!(email.check(&"user@example".into()).is_err());

        let starts_with_a = FieldDescriptor::text().pattern("a").unwrap();
        assert!(starts_with_a.check(&"abc".into()).is_ok());
        assert!(starts_with_a.check(&"bca".into()).is_err());
    }

    #[test]
    fn pattern_matches_display_form_of_numbers() {
        let digits = FieldDescriptor::integer().pattern(r"\d{3}").unwrap();
        assert!(digits.check(&Value::Integer(123)).is_ok());
        assert!(digits.check(&Value::Integer(12)).is_err());
    }

    #[test]
    fn bad_pattern_is_a_definition_error() {
        let result = FieldDescriptor::text().pattern("(unclosed");
        assert!(matches!(result, Err(OdmError::InvalidSchema { .. })));
    }

    #[test]
    fn defaults() {
        let lang = FieldDescriptor::text().default_value("en");
        assert_eq!(lang.default().map(DefaultValue::produce), Some("en".into()));

        let id = FieldDescriptor::generated_id();
        let a = id.default().unwrap().produce();
        let b = id.default().unwrap().produce();
        assert_ne!(a, b);
        assert!(!id.is_required());
    }
}
