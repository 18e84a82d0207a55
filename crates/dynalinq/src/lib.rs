//! Typed, cached access to DynamoDB-style tables.
//!
//! A [`DataContext`] is one unit of work: it hands out typed [`Table`]
//! handles, tracks what they load and stage, and commits everything with
//! [`DataContext::submit_changes`]. Reads go through a per-table cache that
//! is kept consistent with the store on every commit.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dynalinq::cache::{KeyValueTableCacheFactory, MemoryCache};
//! use dynalinq::demo::{game_scores_table, seed_game_scores, GameScore, GAME_SCORES};
//! use dynalinq::query::{field, QueryDescription};
//! use dynalinq::storage::InMemoryStore;
//! use dynalinq::DataContext;
//!
//! # async fn run() -> dynalinq::Result<()> {
//! let caches = KeyValueTableCacheFactory::new(Arc::new(MemoryCache::new(10_000)), 256);
//! let ctx = DataContext::new(Arc::new(InMemoryStore::new()), Arc::new(caches));
//! ctx.declare_table(game_scores_table(true), seed_game_scores).await?;
//!
//! let scores = ctx.table::<GameScore>(GAME_SCORES).await?;
//! let best = scores
//!     .to_vec(
//!         &QueryDescription::new()
//!             .filter(field("GameTitle").eq("Starship X"))
//!             .filter(field("TopScore").gt(30)),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod demo;
pub mod storage;

pub use context::{DataContext, QueryOutput, Table};
pub use dynalinq_core::{
    entity, query, schema, select_plan, tracking, Document, Entity, EntityDescriptor, EntityKey,
    Error, ErrorKind, FieldKind, QueryPlan, Result, Value,
};
