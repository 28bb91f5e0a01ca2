//! Error types for timex-engine operations.

use thiserror::Error;

/// Errors that can occur while resolving or serializing temporal expressions.
///
/// Calendar overflow caused by otherwise valid fields ("Feb 31st") is not an
/// error; it is reported through
/// [`ExtendedDateTime::input_date_was_invalid`](crate::ExtendedDateTime::input_date_was_invalid).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimexError {
    /// A field was present in the timex dictionary but its value could not be
    /// parsed. This always indicates a defect in the grammar that produced it.
    #[error("Could not parse {field} attribute '{value}' from timex dictionary")]
    MalformedField { field: String, value: String },

    /// The requested temporal type cannot be handled by this operation.
    #[error("Unsupported temporal type: {0}")]
    UnsupportedType(String),

    /// An ISO8601-like string could not be parsed.
    #[error("Invalid ISO string: {0}")]
    InvalidIso(String),

    /// Calendar arithmetic left the representable range.
    #[error("Date out of range: {0}")]
    OutOfRange(String),

    /// A binary blob was truncated or otherwise malformed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A binary blob was written by a newer version of this crate.
    #[error("Unsupported serialization version {found} (max supported {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Context configuration could not be loaded.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TimexError {
    pub(crate) fn malformed(field: &str, value: &str) -> Self {
        TimexError::MalformedField {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

/// Convenience alias for `Result<T, TimexError>`.
pub type Result<T> = std::result::Result<T, TimexError>;
