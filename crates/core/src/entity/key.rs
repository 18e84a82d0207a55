use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Primary key of a stored entity: the hash value plus the range value when
/// the table has a range key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityKey {
    hash: Value,
    range: Option<Value>,
}

impl EntityKey {
    pub fn new(hash: impl Into<Value>, range: Option<Value>) -> Self {
        Self {
            hash: hash.into(),
            range,
        }
    }

    pub fn hash_only(hash: impl Into<Value>) -> Self {
        Self::new(hash, None)
    }

    pub fn with_range(hash: impl Into<Value>, range: impl Into<Value>) -> Self {
        Self::new(hash, Some(range.into()))
    }

    pub fn hash(&self) -> &Value {
        &self.hash
    }

    pub fn range(&self) -> Option<&Value> {
        self.range.as_ref()
    }

    /// Stable text form used for equality, hashing and cache keys.
    pub fn canonical(&self) -> String {
        match &self.range {
            Some(range) => format!("{}|{}", self.hash.canonical(), range.canonical()),
            None => self.hash.canonical(),
        }
    }
}

impl PartialEq for EntityKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for EntityKey {}

impl Hash for EntityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "({}, {})", self.hash, range),
            None => write!(f, "({})", self.hash),
        }
    }
}
