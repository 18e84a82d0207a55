use thiserror::Error;

/// Errors raised while reading or writing an entity field through its accessor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("Invalid structured value: {0}")]
    Structured(String),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Field '{field}': {reason}")]
    InField { field: String, reason: String },
}

impl FieldError {
    /// Attaches the field name to an accessor error.
    pub fn in_field(self, field: &str) -> Self {
        match self {
            FieldError::InField { .. } => self,
            other => FieldError::InField {
                field: field.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result type for field operations.
pub type Result<T> = std::result::Result<T, FieldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_display() {
        let error = FieldError::TypeMismatch {
            expected: "int",
            found: "string",
        };
        assert_eq!(error.to_string(), "Type mismatch: expected int, found string");
    }

    #[test]
    fn test_in_field_wraps_once() {
        let error = FieldError::Structured("bad".to_string())
            .in_field("Address")
            .in_field("Other");
        assert_eq!(
            error.to_string(),
            "Field 'Address': Invalid structured value: bad"
        );
    }

    #[test]
    fn test_unknown_field_display() {
        let error = FieldError::UnknownField("Nope".to_string());
        assert_eq!(error.to_string(), "Unknown field: Nope");
    }
}
