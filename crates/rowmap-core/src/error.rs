//! Error type shared by the coercion engine, the schema cache and the mapper.

use crate::values::Value;

/// Errors raised while coercing values or materializing rows.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    /// The value cannot be converted to the target type
    #[error("Cannot convert to {target}: {reason}")]
    InvalidArgument { target: String, reason: String },

    /// Text that does not hold a value of the target type
    #[error("Input string '{input}' was not in a correct format for {target}")]
    Format { target: String, input: String },

    /// The target type has no default constructor
    #[error("Cannot create an instance of {type_name}: no default constructor")]
    ConstructionFailure { type_name: String },

    /// The row provider failed to produce a row or a column value
    #[error("Row source error: {0}")]
    Source(String),
}

impl MapError {
    pub(crate) fn invalid(target: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn format(target: impl ToString, input: impl Into<String>) -> Self {
        Self::Format {
            target: target.to_string(),
            input: input.into(),
        }
    }

    /// A value of the wrong kind was handed to a typed extraction.
    pub fn unexpected(target: &str, value: &Value) -> Self {
        Self::invalid(target, format!("unexpected {} value", value.kind()))
    }

    /// A value does not fit in the target's range.
    pub(crate) fn out_of_range(target: impl ToString, value: impl std::fmt::Display) -> Self {
        Self::invalid(target, format!("value {value} is out of range"))
    }
}
