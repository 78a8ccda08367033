//! Error types for collection operations.

use thiserror::Error;

/// Result type for collection operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors reported by a document collection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A record key is not legal in stored documents.
    #[error("illegal key {key:?}: keys may not contain '.' or start with '$'")]
    InvalidKey {
        /// The offending key.
        key: String,
    },

    /// A record was written without a primary key.
    #[error("record has no _id")]
    MissingId,

    /// A write would violate a unique index.
    #[error("duplicate key in index {index}: {key}")]
    DuplicateKey {
        /// Name of the violated index.
        index: String,
        /// Rendered key values.
        key: String,
    },

    /// An index declaration is unusable.
    #[error("invalid index: {message}")]
    InvalidIndex {
        /// Description of the problem.
        message: String,
    },

    /// The store could not be reached or timed out.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

impl StorageError {
    /// Creates an invalid key error.
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey { key: key.into() }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(index: impl Into<String>, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            index: index.into(),
            key: key.into(),
        }
    }

    /// Creates an invalid index error.
    pub fn invalid_index(message: impl Into<String>) -> Self {
        Self::InvalidIndex {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}
