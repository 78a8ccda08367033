//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while converting document values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Text could not be parsed as an object id.
    #[error("invalid object id: {text:?}")]
    InvalidObjectId {
        /// The rejected input.
        text: String,
    },

    /// Failed to render a value as JSON text.
    #[error("serialization failed: {message}")]
    SerializationFailed {
        /// Description of the serialization error.
        message: String,
    },
}

impl CodecError {
    /// Create an invalid object id error.
    pub fn invalid_object_id(text: impl Into<String>) -> Self {
        Self::InvalidObjectId { text: text.into() }
    }

    /// Create a serialization failed error.
    pub fn serialization_failed(message: impl Into<String>) -> Self {
        Self::SerializationFailed {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_failed(err.to_string())
    }
}
