//! Error types for docmap core.

use docmap_codec::CodecError;
use docmap_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type OdmResult<T> = Result<T, OdmError>;

/// Coarse classification of an [`OdmError`].
///
/// A boundary layer (an HTTP handler, say) maps these to status codes
/// without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input does not satisfy the schema.
    Validation,
    /// A record looked up by id does not exist.
    NotFound,
    /// A schema or entity type definition is unusable.
    Definition,
    /// The API was used in a state that does not allow it.
    Usage,
    /// The underlying store failed.
    Storage,
}

/// Errors that can occur in docmap core operations.
#[derive(Debug, Error)]
pub enum OdmError {
    /// A required field is absent.
    #[error("{entity}.{field}: required field missing")]
    RequiredFieldMissing {
        /// Entity type name.
        entity: String,
        /// Field path.
        field: String,
    },

    /// A key is not declared in the schema.
    #[error("{entity}: unknown field {field:?}")]
    UnknownField {
        /// Entity type name.
        entity: String,
        /// Field path.
        field: String,
    },

    /// A value's runtime type does not satisfy the declared type.
    #[error("{entity}.{field}: expected {expected}, got {found}")]
    TypeMismatch {
        /// Entity type name.
        entity: String,
        /// Field path.
        field: String,
        /// Declared type.
        expected: String,
        /// Runtime type of the rejected value.
        found: String,
    },

    /// A value is outside the allowed set or does not match the pattern.
    #[error("{entity}.{field}: {value} {reason}")]
    DisallowedValue {
        /// Entity type name.
        entity: String,
        /// Field path.
        field: String,
        /// Rendered value.
        value: String,
        /// Why the value was refused.
        reason: String,
    },

    /// A schema declares its own `id` without a default generator.
    #[error("{entity}: id field requires a default factory")]
    PrimaryKeyMisconfigured {
        /// Entity type name.
        entity: String,
    },

    /// An explicit cache insertion on a type whose cache is disabled.
    #[error("{entity}: cannot cache while caching is disabled")]
    CacheDisabled {
        /// Entity type name.
        entity: String,
    },

    /// A required reference was given no target.
    #[error("{entity}.{field}: required reference has no target")]
    DanglingRequiredReference {
        /// Entity type name.
        entity: String,
        /// Field path.
        field: String,
    },

    /// A schema definition is malformed.
    #[error("{entity}: invalid schema: {message}")]
    InvalidSchema {
        /// Entity type name.
        entity: String,
        /// Description of the problem.
        message: String,
    },

    /// A deferred type reference names no registered entity type.
    #[error("unknown entity type: {name}")]
    UnknownEntityType {
        /// The unresolved name.
        name: String,
    },

    /// An entity type name was registered twice.
    #[error("entity type already registered: {name}")]
    DuplicateEntityType {
        /// The duplicated name.
        name: String,
    },

    /// No record exists for an id.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity type name.
        entity: String,
        /// Rendered id.
        id: String,
    },

    /// The document was removed and can no longer be used.
    #[error("{entity} {id} has been removed")]
    DocumentRemoved {
        /// Entity type name.
        entity: String,
        /// Rendered id.
        id: String,
    },

    /// An attempt to change a persisted document's id.
    #[error("{entity}: id is immutable")]
    ImmutableId {
        /// Entity type name.
        entity: String,
    },

    /// A positional access on a reference list is out of range.
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange {
        /// The requested position.
        index: usize,
        /// Current list length.
        len: usize,
    },

    /// Storage collection error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Value codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl OdmError {
    /// Creates a required field missing error.
    pub fn required_missing(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::RequiredFieldMissing {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Creates an unknown field error.
    pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(
        entity: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            entity: entity.into(),
            field: field.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a disallowed value error.
    pub fn disallowed(
        entity: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::DisallowedValue {
            entity: entity.into(),
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates a dangling required reference error.
    pub fn dangling_reference(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::DanglingRequiredReference {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a document removed error.
    pub fn removed(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DocumentRemoved {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Classifies this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RequiredFieldMissing { .. }
            | Self::UnknownField { .. }
            | Self::TypeMismatch { .. }
            | Self::DisallowedValue { .. }
            | Self::DanglingRequiredReference { .. }
            | Self::Codec(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PrimaryKeyMisconfigured { .. }
            | Self::InvalidSchema { .. }
            | Self::UnknownEntityType { .. }
            | Self::DuplicateEntityType { .. } => ErrorKind::Definition,
            Self::CacheDisabled { .. }
            | Self::DocumentRemoved { .. }
            | Self::ImmutableId { .. }
            | Self::IndexOutOfRange { .. } => ErrorKind::Usage,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Returns true for schema validation failures.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Returns true when a record looked up by id does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
