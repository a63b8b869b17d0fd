//! Errors raised before anything leaves the caller's hands.
//!
//! ```rust
//! use dieselsync::shared::error::SharedError;
//!
//! let err = SharedError::validation("end_reading", "End reading must be greater than start reading");
//! assert_eq!(err.field(), Some("end_reading"));
//! assert_eq!(err.detail(), "End reading must be greater than start reading");
//! ```

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SharedError {
    /// A record broke a business rule; `field` names the offending input
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// A record could not be encoded or decoded
    #[error("malformed record: {0}")]
    Serialization(String),
}

impl SharedError {
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            Self::Serialization(_) => None,
        }
    }

    /// Message suitable for an operator, without the category prefix
    pub fn detail(&self) -> &str {
        match self {
            Self::Validation { message, .. } | Self::Serialization(message) => message,
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
