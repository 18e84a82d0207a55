//! Entity capability maps.
//!
//! An entity type describes its stored fields once, through a static
//! [`EntityDescriptor`]. The descriptor is the only way the engine reads or
//! writes entity fields: it turns entities into [`Document`]s for the store and
//! the cache, and rebuilds entities from documents.

pub mod convert;
mod error;
mod key;

use crate::value::{Document, Value};

pub use error::{FieldError, Result};
pub use key::EntityKey;

/// An entity type the engine can store.
///
/// Implementations return a descriptor built once, usually from a
/// `std::sync::OnceLock` static.
pub trait Entity: Clone + Send + Sync + 'static {
    fn descriptor() -> &'static EntityDescriptor<Self>;
}

/// Type tag of a stored field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    List,
    Map,
    /// A nested structure converted through serde.
    Structured,
}

impl FieldKind {
    /// Returns true when the kind supports ordering comparisons.
    pub fn is_orderable(&self) -> bool {
        matches!(
            self,
            FieldKind::Int | FieldKind::Float | FieldKind::Str | FieldKind::Bytes | FieldKind::Bool
        )
    }
}

/// Reads and writes one field of `E`.
pub struct FieldAccessor<E> {
    pub name: &'static str,
    pub kind: FieldKind,
    pub get: fn(&E) -> Value,
    pub set: fn(&mut E, Value) -> Result<()>,
}

impl<E> std::fmt::Debug for FieldAccessor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// The capability map of an entity type.
#[derive(Debug)]
pub struct EntityDescriptor<E> {
    type_name: &'static str,
    factory: fn() -> E,
    fields: Vec<FieldAccessor<E>>,
    version_field: Option<&'static str>,
}

impl<E> EntityDescriptor<E> {
    /// Starts a descriptor. `factory` produces the value fields start from when
    /// an entity is rebuilt from a document; absent attributes keep it.
    pub fn builder(type_name: &'static str, factory: fn() -> E) -> EntityDescriptorBuilder<E> {
        EntityDescriptorBuilder {
            descriptor: EntityDescriptor {
                type_name,
                factory,
                fields: Vec::new(),
                version_field: None,
            },
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[FieldAccessor<E>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldAccessor<E>> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn version_field(&self) -> Option<&'static str> {
        self.version_field
    }

    pub fn is_versioned(&self) -> bool {
        self.version_field.is_some()
    }

    /// Converts an entity to a document. `Null` fields are omitted.
    pub fn to_document(&self, entity: &E) -> Document {
        self.fields
            .iter()
            .filter_map(|f| {
                let value = (f.get)(entity);
                (!value.is_null()).then(|| (f.name.to_string(), value))
            })
            .collect()
    }

    /// Rebuilds an entity from a document. Attributes without a declared field
    /// are ignored.
    pub fn from_document(&self, document: &Document) -> Result<E> {
        let mut entity = (self.factory)();
        for field in &self.fields {
            if let Some(value) = document.get(field.name) {
                (field.set)(&mut entity, value.clone()).map_err(|e| e.in_field(field.name))?;
            }
        }
        Ok(entity)
    }

    /// Reads the version attribute from a document.
    pub fn version_in(&self, document: &Document) -> Option<i64> {
        let field = self.version_field?;
        document.get(field).and_then(Value::as_i64)
    }

    /// Returns a copy of `document` restricted to `names`, in the given order
    /// of preference. Unknown names are skipped.
    pub fn project(&self, document: &Document, names: &[String]) -> Document {
        names
            .iter()
            .filter_map(|n| document.get(n).map(|v| (n.clone(), v.clone())))
            .collect()
    }
}

pub struct EntityDescriptorBuilder<E> {
    descriptor: EntityDescriptor<E>,
}

impl<E> EntityDescriptorBuilder<E> {
    pub fn field(
        mut self,
        name: &'static str,
        kind: FieldKind,
        get: fn(&E) -> Value,
        set: fn(&mut E, Value) -> Result<()>,
    ) -> Self {
        self.descriptor.fields.push(FieldAccessor {
            name,
            kind,
            get,
            set,
        });
        self
    }

    /// Declares the optimistic-concurrency version field. It is stored as an
    /// integer and managed by the commit path.
    pub fn version(
        mut self,
        name: &'static str,
        get: fn(&E) -> Value,
        set: fn(&mut E, Value) -> Result<()>,
    ) -> Self {
        self.descriptor.version_field = Some(name);
        self.field(name, FieldKind::Int, get, set)
    }

    pub fn build(self) -> EntityDescriptor<E> {
        self.descriptor
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::BTreeMap;
    use std::sync::OnceLock;

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Address {
        pub city: String,
        pub zip: String,
    }

    /// Hash `UserId`, range `GameTitle`, versioned.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Score {
        pub user_id: String,
        pub game_title: String,
        pub top_score: i64,
        pub wins: i64,
        pub active: bool,
        pub tags: Vec<String>,
        pub address: Option<Address>,
        pub meta: BTreeMap<String, String>,
        pub version: Option<i64>,
    }

    impl Entity for Score {
        fn descriptor() -> &'static EntityDescriptor<Self> {
            static DESCRIPTOR: OnceLock<EntityDescriptor<Score>> = OnceLock::new();
            DESCRIPTOR.get_or_init(|| {
                EntityDescriptor::builder("Score", Score::default)
                    .field(
                        "UserId",
                        FieldKind::Str,
                        |e| Value::from(&e.user_id),
                        |e, v| {
                            e.user_id = convert::string(v)?;
                            Ok(())
                        },
                    )
                    .field(
                        "GameTitle",
                        FieldKind::Str,
                        |e| Value::from(&e.game_title),
                        |e, v| {
                            e.game_title = convert::string(v)?;
                            Ok(())
                        },
                    )
                    .field(
                        "TopScore",
                        FieldKind::Int,
                        |e| Value::Int(e.top_score),
                        |e, v| {
                            e.top_score = convert::int(v)?;
                            Ok(())
                        },
                    )
                    .field(
                        "Wins",
                        FieldKind::Int,
                        |e| Value::Int(e.wins),
                        |e, v| {
                            e.wins = convert::int(v)?;
                            Ok(())
                        },
                    )
                    .field(
                        "Active",
                        FieldKind::Bool,
                        |e| Value::Bool(e.active),
                        |e, v| {
                            e.active = convert::boolean(v)?;
                            Ok(())
                        },
                    )
                    .field(
                        "Tags",
                        FieldKind::List,
                        |e| convert::to_structured(&e.tags),
                        |e, v| {
                            e.tags = convert::structured(v)?;
                            Ok(())
                        },
                    )
                    .field(
                        "Address",
                        FieldKind::Structured,
                        |e| convert::to_structured(&e.address),
                        |e, v| {
                            e.address = convert::optional(v, convert::structured)?;
                            Ok(())
                        },
                    )
                    .field(
                        "Meta",
                        FieldKind::Map,
                        |e| convert::to_structured(&e.meta),
                        |e, v| {
                            e.meta = convert::structured(v)?;
                            Ok(())
                        },
                    )
                    .version(
                        "Version",
                        |e| Value::from(e.version),
                        |e, v| {
                            e.version = convert::optional(v, convert::int)?;
                            Ok(())
                        },
                    )
                    .build()
            })
        }
    }

    pub fn score(user: &str, title: &str, top: i64) -> Score {
        Score {
            user_id: user.to_string(),
            game_title: title.to_string(),
            top_score: top,
            ..Score::default()
        }
    }
}
