//! Error types for BSON cursor conversions.

use sync_core::CursorType;
use thiserror::Error;

/// Errors raised while converting cursor values.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The BSON value cannot act as a cursor.
    #[error("BSON {0} values cannot be used as a cursor")]
    UnsupportedType(&'static str),

    /// The persisted string does not parse as its tagged type.
    #[error("invalid {cursor_type} cursor value '{value}': {reason}")]
    Invalid {
        cursor_type: CursorType,
        value: String,
        reason: String,
    },

    /// A value was expected to carry a specific type.
    #[error("expected a {expected} cursor value, found {found}")]
    TypeMismatch {
        expected: CursorType,
        found: CursorType,
    },
}

impl CodecError {
    pub(crate) fn invalid(
        cursor_type: CursorType,
        value: &str,
        reason: impl std::fmt::Display,
    ) -> Self {
        CodecError::Invalid {
            cursor_type,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
