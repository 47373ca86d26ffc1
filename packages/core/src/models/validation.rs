use thiserror::Error;

/// Validation errors for tracker records and their inputs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid project prefix '{0}': expected 1-10 uppercase letters or digits, starting with a letter")]
    InvalidPrefix(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Unknown issue field: {0}")]
    UnknownField(String),

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Invalid parent: {0}")]
    InvalidParent(String),
}

impl ValidationError {
    /// Create an invalid field value error
    pub fn invalid_field_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFieldValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
