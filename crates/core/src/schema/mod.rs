//! Table definitions and key schemas.

mod error;
pub mod planning;

use std::time::Duration;

use crate::entity::{EntityDescriptor, EntityKey};
use crate::value::{Document, Value};

pub use error::{Result, SchemaError};
pub use planning::{
    calculate_deploy_plan, format_deploy_plan, DeployPlan, GlobalIndexState, IndexStatus,
    TableState, TableStatus,
};

/// Default time-to-live of cached entries and indexes: one day.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Scalar type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Number,
    Binary,
}

impl AttributeType {
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (AttributeType::String, Value::Str(_))
                | (AttributeType::Number, Value::Int(_) | Value::Float(_))
                | (AttributeType::Binary, Value::Bytes(_))
        )
    }

    /// The store's one-letter type code.
    pub fn code(&self) -> &'static str {
        match self {
            AttributeType::String => "S",
            AttributeType::Number => "N",
            AttributeType::Binary => "B",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub attribute_type: AttributeType,
}

impl KeyAttribute {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Number)
    }
}

/// Provisioned read/write capacity units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throughput {
    pub read: u64,
    pub write: u64,
}

/// Capacity mode of a global secondary index.
#[derive(Debug, Clone, Copy)]
pub enum Capacity {
    OnDemand,
    Fixed(Throughput),
    /// Resolved when the index is created.
    Computed(fn() -> Throughput),
}

impl Capacity {
    /// Returns provisioned throughput, or `None` for on-demand.
    pub fn resolve(&self) -> Option<Throughput> {
        match self {
            Capacity::OnDemand => None,
            Capacity::Fixed(t) => Some(*t),
            Capacity::Computed(f) => Some(f()),
        }
    }
}

impl PartialEq for Capacity {
    fn eq(&self, other: &Self) -> bool {
        self.resolve() == other.resolve()
    }
}

/// A local secondary index: same hash key, alternate range key.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalIndex {
    pub name: String,
    pub range_key: KeyAttribute,
}

/// A global secondary index with its own hash (and optional range) key.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalIndex {
    pub name: String,
    pub hash_key: KeyAttribute,
    pub range_key: Option<KeyAttribute>,
    pub capacity: Capacity,
}

impl GlobalIndex {
    pub fn new(name: impl Into<String>, hash_key: KeyAttribute) -> Self {
        Self {
            name: name.into(),
            hash_key,
            range_key: None,
            capacity: Capacity::OnDemand,
        }
    }

    pub fn with_range(mut self, range_key: KeyAttribute) -> Self {
        self.range_key = Some(range_key);
        self
    }

    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Key layout of a table. Fixed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySchema {
    pub hash_key: KeyAttribute,
    pub range_key: Option<KeyAttribute>,
    pub local_indexes: Vec<LocalIndex>,
    pub global_indexes: Vec<GlobalIndex>,
}

impl KeySchema {
    pub fn new(hash_key: KeyAttribute) -> Self {
        Self {
            hash_key,
            range_key: None,
            local_indexes: Vec::new(),
            global_indexes: Vec::new(),
        }
    }

    pub fn with_range(mut self, range_key: KeyAttribute) -> Self {
        self.range_key = Some(range_key);
        self
    }

    pub fn with_local_index(mut self, name: impl Into<String>, range_key: KeyAttribute) -> Self {
        self.local_indexes.push(LocalIndex {
            name: name.into(),
            range_key,
        });
        self
    }

    pub fn with_global_index(mut self, index: GlobalIndex) -> Self {
        self.global_indexes.push(index);
        self
    }

    pub fn hash_key_name(&self) -> &str {
        &self.hash_key.name
    }

    pub fn range_key_name(&self) -> Option<&str> {
        self.range_key.as_ref().map(|k| k.name.as_str())
    }

    pub fn local_index_on(&self, attribute: &str) -> Option<&LocalIndex> {
        self.local_indexes
            .iter()
            .find(|i| i.range_key.name == attribute)
    }

    pub fn local_index(&self, name: &str) -> Option<&LocalIndex> {
        self.local_indexes.iter().find(|i| i.name == name)
    }

    pub fn global_index(&self, name: &str) -> Option<&GlobalIndex> {
        self.global_indexes.iter().find(|i| i.name == name)
    }

    /// Extracts the primary key of a stored document.
    pub fn key_of(&self, table: &str, document: &Document) -> Result<EntityKey> {
        let hash = document
            .get(&self.hash_key.name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| SchemaError::MissingKeyAttribute {
                table: table.to_string(),
                attribute: self.hash_key.name.clone(),
            })?;
        let range = match &self.range_key {
            Some(range_key) => Some(
                document
                    .get(&range_key.name)
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| SchemaError::MissingKeyAttribute {
                        table: table.to_string(),
                        attribute: range_key.name.clone(),
                    })?
                    .clone(),
            ),
            None => None,
        };
        Ok(EntityKey::new(hash.clone(), range))
    }

    /// Builds a key from positional values, checking arity and types.
    pub fn key_from_values(&self, table: &str, values: &[Value]) -> Result<EntityKey> {
        let expected = if self.range_key.is_some() { 2 } else { 1 };
        if values.len() != expected {
            return Err(SchemaError::KeySchemaMismatch {
                table: table.to_string(),
                reason: format!("expected {expected} key values, got {}", values.len()),
            });
        }

        let check = |attribute: &KeyAttribute, value: &Value| {
            if attribute.attribute_type.accepts(value) {
                Ok(())
            } else {
                Err(SchemaError::KeySchemaMismatch {
                    table: table.to_string(),
                    reason: format!(
                        "key attribute '{}' expects {}, got {}",
                        attribute.name,
                        attribute.attribute_type.code(),
                        value.type_name()
                    ),
                })
            }
        };

        check(&self.hash_key, &values[0])?;
        let range = match &self.range_key {
            Some(range_key) => {
                check(range_key, &values[1])?;
                Some(values[1].clone())
            }
            None => None,
        };
        Ok(EntityKey::new(values[0].clone(), range))
    }

    /// Checks a key's values against the attribute types.
    pub fn validate_key(&self, table: &str, key: &EntityKey) -> Result<()> {
        let mut values = vec![key.hash().clone()];
        if let Some(range) = key.range() {
            values.push(range.clone());
        }
        self.key_from_values(table, &values).map(|_| ())
    }

    /// Every attribute name that is a key of the table or of one of its indexes.
    pub fn key_attributes(&self) -> Vec<&KeyAttribute> {
        let mut attributes = vec![&self.hash_key];
        attributes.extend(self.range_key.iter());
        attributes.extend(self.local_indexes.iter().map(|i| &i.range_key));
        for gsi in &self.global_indexes {
            attributes.push(&gsi.hash_key);
            attributes.extend(gsi.range_key.iter());
        }
        attributes
    }
}

/// A table declaration: name, key schema and cache policy.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub key_schema: KeySchema,
    pub cache_ttl: Duration,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, key_schema: KeySchema) -> Self {
        Self {
            name: name.into(),
            key_schema,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Checks that every key attribute maps to a field of the entity type and
    /// that index names are unique.
    pub fn validate_for<E>(&self, descriptor: &EntityDescriptor<E>) -> Result<()> {
        for attribute in self.key_schema.key_attributes() {
            if !descriptor.has_field(&attribute.name) {
                return Err(SchemaError::UndeclaredKeyField {
                    entity_type: descriptor.type_name(),
                    attribute: attribute.name.clone(),
                });
            }
        }

        let mut names: Vec<&str> = self
            .key_schema
            .local_indexes
            .iter()
            .map(|i| i.name.as_str())
            .chain(self.key_schema.global_indexes.iter().map(|i| i.name.as_str()))
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        if names.len() != total {
            return Err(SchemaError::InvalidDefinition {
                table: self.name.clone(),
                reason: "index names must be unique".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::Score;
    use crate::entity::Entity;

    fn movies() -> KeySchema {
        KeySchema::new(KeyAttribute::string("Name")).with_range(KeyAttribute::number("Year"))
    }

    #[test]
    fn test_key_from_values_rejects_wrong_arity() {
        let err = movies()
            .key_from_values("Movies", &[Value::from("Alien")])
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::KeySchemaMismatch {
                table: "Movies".to_string(),
                reason: "expected 2 key values, got 1".to_string()
            }
        );
    }

    #[test]
    fn test_key_from_values_rejects_wrong_type() {
        let err = movies()
            .key_from_values("Movies", &[Value::from("Alien"), Value::from("1979")])
            .unwrap_err();
        assert!(matches!(err, SchemaError::KeySchemaMismatch { .. }));
    }

    #[test]
    fn test_key_from_values_accepts_matching_key() {
        let key = movies()
            .key_from_values("Movies", &[Value::from("Alien"), Value::Int(1979)])
            .unwrap();
        assert_eq!(key, EntityKey::with_range("Alien", 1979));
    }

    #[test]
    fn test_key_of_requires_range_attribute() {
        let mut doc = Document::new();
        doc.insert("Name".to_string(), Value::from("Alien"));
        let err = movies().key_of("Movies", &doc).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingKeyAttribute {
                table: "Movies".to_string(),
                attribute: "Year".to_string()
            }
        );
    }

    #[test]
    fn test_validate_for_requires_key_fields() {
        let schema = KeySchema::new(KeyAttribute::string("UserId"))
            .with_range(KeyAttribute::string("GameTitle"))
            .with_global_index(GlobalIndex::new("ByRank", KeyAttribute::number("Rank")));
        let definition = TableDefinition::new("GameScores", schema);

        let err = definition.validate_for(Score::descriptor()).unwrap_err();
        assert!(matches!(err, SchemaError::UndeclaredKeyField { .. }));
    }

    #[test]
    fn test_validate_for_rejects_duplicate_index_names() {
        let schema = KeySchema::new(KeyAttribute::string("UserId"))
            .with_range(KeyAttribute::string("GameTitle"))
            .with_local_index("Top", KeyAttribute::number("TopScore"))
            .with_global_index(GlobalIndex::new("Top", KeyAttribute::string("GameTitle")));
        let definition = TableDefinition::new("GameScores", schema);

        let err = definition.validate_for(Score::descriptor()).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefinition { .. }));
    }

    #[test]
    fn test_computed_capacity_resolves_lazily() {
        fn small() -> Throughput {
            Throughput { read: 5, write: 1 }
        }
        let capacity = Capacity::Computed(small);
        assert_eq!(capacity.resolve(), Some(Throughput { read: 5, write: 1 }));
        assert_eq!(capacity, Capacity::Fixed(Throughput { read: 5, write: 1 }));
        assert_eq!(Capacity::OnDemand.resolve(), None);
    }

    #[test]
    fn test_default_cache_ttl_is_one_day() {
        let definition = TableDefinition::new("Movies", movies());
        assert_eq!(definition.cache_ttl, Duration::from_secs(86_400));
    }
}
