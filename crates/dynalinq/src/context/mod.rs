//! The data-access API: a [`DataContext`] per unit of work and typed
//! [`Table`] handles.
//!
//! A context owns the change trackers of the tables it touched. Store and
//! cache handles are shared `Arc`s injected at construction, so any number of
//! contexts can run side by side against the same backends.

mod data_context;
mod table;

pub use data_context::DataContext;
pub use table::{QueryOutput, Table};
