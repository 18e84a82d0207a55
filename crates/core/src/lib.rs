//! Functional core of dynalinq.
//!
//! Everything here is free of I/O: values and entity capability maps, key
//! schemas, query translation and access-path selection, change tracking,
//! and the cache and store contracts the shell crate implements.

pub mod cache;
pub mod entity;
pub mod error;
pub mod plan;
pub mod query;
pub mod schema;
pub mod store;
pub mod tracking;
pub mod value;

pub use entity::{Entity, EntityDescriptor, EntityKey, FieldKind};
pub use error::{Error, ErrorKind, Result};
pub use plan::{select_plan, QueryPlan};
pub use value::{Document, Value};
