//! Conversion between [`Value`] documents and DynamoDB attribute maps.
//!
//! Pure functions, testable without DynamoDB access.

use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use dynalinq_core::schema::KeySchema;
use dynalinq_core::store::StoreError;
use dynalinq_core::{Document, EntityKey, Value};

pub type Item = HashMap<String, AttributeValue>;

pub fn value_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Int(i) => AttributeValue::N(i.to_string()),
        Value::Float(f) => AttributeValue::N(f.to_string()),
        Value::Str(s) => AttributeValue::S(s.clone()),
        Value::Bytes(b) => AttributeValue::B(Blob::new(b.clone())),
        Value::List(items) => AttributeValue::L(items.iter().map(value_to_attribute).collect()),
        Value::Map(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_attribute(v)))
                .collect(),
        ),
    }
}

/// Parses a DynamoDB number. Integers stay integral.
pub fn parse_number(raw: &str) -> Result<Value, StoreError> {
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    raw.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| StoreError::InvalidData(format!("Invalid number '{raw}'")))
}

pub fn attribute_to_value(attribute: &AttributeValue) -> Result<Value, StoreError> {
    let value = match attribute {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::N(n) => parse_number(n)?,
        AttributeValue::S(s) => Value::Str(s.clone()),
        AttributeValue::B(b) => Value::Bytes(b.as_ref().to_vec()),
        AttributeValue::L(items) => Value::List(
            items
                .iter()
                .map(attribute_to_value)
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::M(map) => Value::Map(
            map.iter()
                .map(|(k, v)| attribute_to_value(v).map(|value| (k.clone(), value)))
                .collect::<Result<BTreeMap<_, _>, _>>()?,
        ),
        AttributeValue::Ss(set) => Value::List(set.iter().cloned().map(Value::Str).collect()),
        AttributeValue::Ns(set) => Value::List(
            set.iter()
                .map(|n| parse_number(n))
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::Bs(set) => {
            Value::List(set.iter().map(|b| Value::Bytes(b.as_ref().to_vec())).collect())
        }
        other => {
            return Err(StoreError::InvalidData(format!(
                "Unsupported attribute value: {other:?}"
            )))
        }
    };
    Ok(value)
}

/// Converts a document into an item. Null attributes are left out.
pub fn document_to_item(document: &Document) -> Item {
    document
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), value_to_attribute(v)))
        .collect()
}

pub fn item_to_document(item: &Item) -> Result<Document, StoreError> {
    item.iter()
        .map(|(k, v)| attribute_to_value(v).map(|value| (k.clone(), value)))
        .collect()
}

/// Builds the primary key attribute map of an entity.
pub fn key_to_item(schema: &KeySchema, key: &EntityKey) -> Result<Item, StoreError> {
    let mut item = HashMap::new();
    item.insert(
        schema.hash_key_name().to_string(),
        value_to_attribute(key.hash()),
    );
    match (schema.range_key_name(), key.range()) {
        (Some(name), Some(range)) => {
            item.insert(name.to_string(), value_to_attribute(range));
        }
        (None, None) => {}
        _ => {
            return Err(StoreError::InvalidData(format!(
                "Key {key} does not match the table key schema"
            )))
        }
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynalinq_core::schema::KeyAttribute;

    #[test]
    fn test_numbers_keep_integer_precision() {
        assert_eq!(parse_number("9007199254740993").unwrap(), Value::Int(9007199254740993));
        assert_eq!(parse_number("1.5").unwrap(), Value::Float(1.5));
        assert!(parse_number("abc").is_err());
    }

    #[test]
    fn test_nested_document_conversion() {
        let mut address = BTreeMap::new();
        address.insert("City".to_string(), Value::from("Oslo"));
        let mut doc = Document::new();
        doc.insert("Name".to_string(), Value::from("Alien"));
        doc.insert("Address".to_string(), Value::Map(address));
        doc.insert(
            "Tags".to_string(),
            Value::List(vec![Value::Int(1), Value::from("x")]),
        );
        doc.insert("Missing".to_string(), Value::Null);

        let item = document_to_item(&doc);
        assert!(!item.contains_key("Missing"));
        assert_eq!(item.get("Name"), Some(&AttributeValue::S("Alien".to_string())));

        let back = item_to_document(&item).unwrap();
        doc.remove("Missing");
        assert_eq!(back, doc);
    }

    #[test]
    fn test_string_set_becomes_list() {
        let value =
            attribute_to_value(&AttributeValue::Ss(vec!["a".to_string(), "b".to_string()]))
                .unwrap();
        assert_eq!(value, Value::List(vec![Value::from("a"), Value::from("b")]));
    }

    #[test]
    fn test_key_to_item_checks_range_presence() {
        let schema = KeySchema::new(KeyAttribute::string("Name"))
            .with_range(KeyAttribute::number("Year"));
        let item = key_to_item(&schema, &EntityKey::with_range("Alien", 1979)).unwrap();
        assert_eq!(item.get("Year"), Some(&AttributeValue::N("1979".to_string())));
        assert!(key_to_item(&schema, &EntityKey::hash_only("Alien")).is_err());
    }
}
