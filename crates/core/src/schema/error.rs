use thiserror::Error;

/// Errors raised when keys or declarations do not fit a table's key schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Key schema mismatch on table '{table}': {reason}")]
    KeySchemaMismatch { table: String, reason: String },
    #[error("Missing key attribute '{attribute}' on table '{table}'")]
    MissingKeyAttribute { table: String, attribute: String },
    #[error("Entity type {entity_type} has no field for key attribute '{attribute}'")]
    UndeclaredKeyField {
        entity_type: &'static str,
        attribute: String,
    },
    #[error("Invalid table definition '{table}': {reason}")]
    InvalidDefinition { table: String, reason: String },
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_schema_mismatch_display() {
        let error = SchemaError::KeySchemaMismatch {
            table: "Movies".to_string(),
            reason: "expected 2 key values, got 1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Key schema mismatch on table 'Movies': expected 2 key values, got 1"
        );
    }

    #[test]
    fn test_missing_key_attribute_display() {
        let error = SchemaError::MissingKeyAttribute {
            table: "GameScores".to_string(),
            attribute: "UserId".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Missing key attribute 'UserId' on table 'GameScores'"
        );
    }

    #[test]
    fn test_undeclared_key_field_display() {
        let error = SchemaError::UndeclaredKeyField {
            entity_type: "Movie",
            attribute: "Year".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Entity type Movie has no field for key attribute 'Year'"
        );
    }
}
