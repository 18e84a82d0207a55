//! The abstract query description callers build against a table.

use std::fmt;
use std::sync::Arc;

use super::{Expr, FilterExpr};
use crate::store::ReadOptions;

/// Scalar reductions applied after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarOp {
    Count,
    Any,
    All,
    Single,
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOp {
    Where(Expr),
    Select(Vec<String>),
    OrderBy { field: String, desc: bool },
    Reduce { op: ScalarOp, predicate: Option<Expr> },
}

type CustomizeFn = Arc<dyn Fn(&mut ReadOptions) + Send + Sync>;

/// An ordered list of query operations plus the optional customization
/// hooks.
#[derive(Clone, Default)]
pub struct QueryDescription {
    ops: Vec<QueryOp>,
    custom_filter: Option<FilterExpr>,
    customize: Option<CustomizeFn>,
}

impl QueryDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[QueryOp] {
        &self.ops
    }

    pub fn push(mut self, op: QueryOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn filter(self, predicate: Expr) -> Self {
        self.push(QueryOp::Where(predicate))
    }

    pub fn select<S: Into<String>>(self, fields: impl IntoIterator<Item = S>) -> Self {
        self.push(QueryOp::Select(fields.into_iter().map(Into::into).collect()))
    }

    pub fn order_by(self, field: impl Into<String>) -> Self {
        self.push(QueryOp::OrderBy {
            field: field.into(),
            desc: false,
        })
    }

    pub fn order_by_desc(self, field: impl Into<String>) -> Self {
        self.push(QueryOp::OrderBy {
            field: field.into(),
            desc: true,
        })
    }

    pub fn reduce(self, op: ScalarOp, predicate: Option<Expr>) -> Self {
        self.push(QueryOp::Reduce { op, predicate })
    }

    pub fn count(self) -> Self {
        self.reduce(ScalarOp::Count, None)
    }

    pub fn any(self) -> Self {
        self.reduce(ScalarOp::Any, None)
    }

    pub fn any_where(self, predicate: Expr) -> Self {
        self.reduce(ScalarOp::Any, Some(predicate))
    }

    pub fn all(self, predicate: Expr) -> Self {
        self.reduce(ScalarOp::All, Some(predicate))
    }

    pub fn single(self) -> Self {
        self.reduce(ScalarOp::Single, None)
    }

    pub fn first(self) -> Self {
        self.reduce(ScalarOp::First, None)
    }

    pub fn last(self) -> Self {
        self.reduce(ScalarOp::Last, None)
    }

    /// The reduction requested, if any.
    pub fn reduction(&self) -> Option<ScalarOp> {
        self.ops.iter().rev().find_map(|op| match op {
            QueryOp::Reduce { op, .. } => Some(*op),
            _ => None,
        })
    }

    /// Appends a raw store-level filter.
    pub fn custom_filter(mut self, filter: FilterExpr) -> Self {
        self.custom_filter = Some(filter);
        self
    }

    /// Adjusts the store read before execution.
    pub fn customize(mut self, hook: impl Fn(&mut ReadOptions) + Send + Sync + 'static) -> Self {
        self.customize = Some(Arc::new(hook));
        self
    }

    pub fn custom_filter_expr(&self) -> Option<&FilterExpr> {
        self.custom_filter.as_ref()
    }

    /// Read options after the customization hook ran.
    pub fn read_options(&self) -> ReadOptions {
        let mut options = ReadOptions::default();
        if let Some(hook) = &self.customize {
            hook(&mut options);
        }
        options
    }
}

impl fmt::Debug for QueryDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryDescription")
            .field("ops", &self.ops)
            .field("custom_filter", &self.custom_filter)
            .field("customized", &self.customize.is_some())
            .finish()
    }
}
