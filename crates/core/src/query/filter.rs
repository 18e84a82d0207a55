//! Raw store-level filter expressions.
//!
//! A [`FilterExpr`] bypasses the translator: it is appended to the store
//! request's filter as given, and unlike a translated [`ConditionSet`] it may
//! use `Or`, `Not` and nested attribute paths.
//!
//! [`ConditionSet`]: super::ConditionSet

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::FilterError;
use crate::value::{Document, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FilterExpr {
    // Leaf nodes
    /// Reference to a document attribute. Supports dot-separated nested paths.
    Attr(String),
    Literal(Value),

    // Comparisons
    Eq(Box<FilterExpr>, Box<FilterExpr>),
    Ne(Box<FilterExpr>, Box<FilterExpr>),
    Lt(Box<FilterExpr>, Box<FilterExpr>),
    Le(Box<FilterExpr>, Box<FilterExpr>),
    Gt(Box<FilterExpr>, Box<FilterExpr>),
    Ge(Box<FilterExpr>, Box<FilterExpr>),
    Between(Box<FilterExpr>, Box<FilterExpr>, Box<FilterExpr>),

    // String and collection operations
    BeginsWith(Box<FilterExpr>, String),
    Contains(Box<FilterExpr>, Value),

    // Existence checks
    AttributeExists(String),
    AttributeNotExists(String),

    // Boolean logic
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
}

/// Maximum nesting depth of a filter expression.
pub const MAX_EXPRESSION_DEPTH: usize = 16;

impl FilterExpr {
    /// Evaluates the expression against a document.
    pub fn eval(&self, doc: &Document) -> Result<bool, FilterError> {
        self.eval_inner(doc, 0)
    }

    /// Checks the expression shape without a document: depth, and that only
    /// attributes and literals appear in operand position.
    pub fn validate(&self) -> Result<(), FilterError> {
        self.validate_inner(0)
    }

    fn validate_inner(&self, depth: usize) -> Result<(), FilterError> {
        if depth > MAX_EXPRESSION_DEPTH {
            return Err(depth_exceeded());
        }
        match self {
            FilterExpr::Attr(_) | FilterExpr::Literal(_) => Err(FilterError::InvalidExpression(
                "leaf node cannot be evaluated as a boolean".to_string(),
            )),
            FilterExpr::Eq(l, r)
            | FilterExpr::Ne(l, r)
            | FilterExpr::Lt(l, r)
            | FilterExpr::Le(l, r)
            | FilterExpr::Gt(l, r)
            | FilterExpr::Ge(l, r) => {
                operand(l)?;
                operand(r)
            }
            FilterExpr::Between(v, lo, hi) => {
                operand(v)?;
                operand(lo)?;
                operand(hi)
            }
            FilterExpr::BeginsWith(e, _) | FilterExpr::Contains(e, _) => operand(e),
            FilterExpr::AttributeExists(_) | FilterExpr::AttributeNotExists(_) => Ok(()),
            FilterExpr::And(exprs) | FilterExpr::Or(exprs) => exprs
                .iter()
                .try_for_each(|e| e.validate_inner(depth + 1)),
            FilterExpr::Not(e) => e.validate_inner(depth + 1),
        }
    }

    fn eval_inner(&self, doc: &Document, depth: usize) -> Result<bool, FilterError> {
        if depth > MAX_EXPRESSION_DEPTH {
            return Err(depth_exceeded());
        }

        match self {
            FilterExpr::Attr(_) | FilterExpr::Literal(_) => Err(FilterError::InvalidExpression(
                "leaf node cannot be evaluated as a boolean".to_string(),
            )),

            FilterExpr::Eq(left, right) => {
                let (l, r) = (resolve_expr(left, doc)?, resolve_expr(right, doc)?);
                Ok(l.compare(&r) == Some(Ordering::Equal))
            }
            FilterExpr::Ne(left, right) => {
                let (l, r) = (resolve_expr(left, doc)?, resolve_expr(right, doc)?);
                Ok(l.compare(&r) != Some(Ordering::Equal))
            }
            FilterExpr::Lt(left, right) => {
                let (l, r) = (resolve_expr(left, doc)?, resolve_expr(right, doc)?);
                Ok(l.compare(&r) == Some(Ordering::Less))
            }
            FilterExpr::Le(left, right) => {
                let (l, r) = (resolve_expr(left, doc)?, resolve_expr(right, doc)?);
                Ok(matches!(
                    l.compare(&r),
                    Some(Ordering::Less | Ordering::Equal)
                ))
            }
            FilterExpr::Gt(left, right) => {
                let (l, r) = (resolve_expr(left, doc)?, resolve_expr(right, doc)?);
                Ok(l.compare(&r) == Some(Ordering::Greater))
            }
            FilterExpr::Ge(left, right) => {
                let (l, r) = (resolve_expr(left, doc)?, resolve_expr(right, doc)?);
                Ok(matches!(
                    l.compare(&r),
                    Some(Ordering::Greater | Ordering::Equal)
                ))
            }
            FilterExpr::Between(val, low, high) => {
                let v = resolve_expr(val, doc)?;
                let lo = resolve_expr(low, doc)?;
                let hi = resolve_expr(high, doc)?;
                let ge_low = matches!(v.compare(&lo), Some(Ordering::Greater | Ordering::Equal));
                let le_high = matches!(v.compare(&hi), Some(Ordering::Less | Ordering::Equal));
                Ok(ge_low && le_high)
            }

            FilterExpr::BeginsWith(expr, prefix) => match resolve_expr(expr, doc)? {
                Value::Str(s) => Ok(s.starts_with(prefix.as_str())),
                _ => Ok(false),
            },
            FilterExpr::Contains(expr, search) => {
                let val = resolve_expr(expr, doc)?;
                match (&val, search) {
                    (Value::Str(s), Value::Str(needle)) => Ok(s.contains(needle.as_str())),
                    (Value::List(items), item) => Ok(items.iter().any(|i| i.loosely_equals(item))),
                    _ => Ok(false),
                }
            }

            FilterExpr::AttributeExists(path) => Ok(!resolve_attr(doc, path).is_null()),
            FilterExpr::AttributeNotExists(path) => Ok(resolve_attr(doc, path).is_null()),

            FilterExpr::And(exprs) => {
                for expr in exprs {
                    if !expr.eval_inner(doc, depth + 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            FilterExpr::Or(exprs) => {
                for expr in exprs {
                    if expr.eval_inner(doc, depth + 1)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            FilterExpr::Not(expr) => Ok(!expr.eval_inner(doc, depth + 1)?),
        }
    }

    /// Attribute paths referenced anywhere in the expression, in first-seen
    /// order.
    pub fn attribute_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths<'a>(&'a self, paths: &mut Vec<&'a str>) {
        match self {
            FilterExpr::Attr(p)
            | FilterExpr::AttributeExists(p)
            | FilterExpr::AttributeNotExists(p) => {
                if !paths.contains(&p.as_str()) {
                    paths.push(p);
                }
            }
            FilterExpr::Literal(_) => {}
            FilterExpr::Eq(l, r)
            | FilterExpr::Ne(l, r)
            | FilterExpr::Lt(l, r)
            | FilterExpr::Le(l, r)
            | FilterExpr::Gt(l, r)
            | FilterExpr::Ge(l, r) => {
                l.collect_paths(paths);
                r.collect_paths(paths);
            }
            FilterExpr::Between(v, lo, hi) => {
                v.collect_paths(paths);
                lo.collect_paths(paths);
                hi.collect_paths(paths);
            }
            FilterExpr::BeginsWith(e, _) | FilterExpr::Contains(e, _) | FilterExpr::Not(e) => {
                e.collect_paths(paths)
            }
            FilterExpr::And(exprs) | FilterExpr::Or(exprs) => {
                for e in exprs {
                    e.collect_paths(paths);
                }
            }
        }
    }

    /// Stable text form used in cache signatures.
    pub fn canonical(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

fn depth_exceeded() -> FilterError {
    FilterError::InvalidExpression(format!(
        "expression depth exceeds maximum of {MAX_EXPRESSION_DEPTH}"
    ))
}

fn operand(expr: &FilterExpr) -> Result<(), FilterError> {
    match expr {
        FilterExpr::Attr(_) | FilterExpr::Literal(_) => Ok(()),
        _ => Err(FilterError::InvalidExpression(
            "expected attribute or literal in comparison position".to_string(),
        )),
    }
}

/// Resolves an operand to a concrete value.
fn resolve_expr(expr: &FilterExpr, doc: &Document) -> Result<Value, FilterError> {
    match expr {
        FilterExpr::Attr(path) => Ok(resolve_attr(doc, path).clone()),
        FilterExpr::Literal(val) => Ok(val.clone()),
        _ => Err(FilterError::InvalidExpression(
            "expected attribute or literal in comparison position".to_string(),
        )),
    }
}

/// Resolves a dot-separated attribute path. Missing segments yield `Null`.
pub fn resolve_attr<'a>(doc: &'a Document, path: &str) -> &'a Value {
    let mut segments = path.split('.');
    let Some(mut current) = segments.next().and_then(|first| doc.get(first)) else {
        return &Value::Null;
    };
    for segment in segments {
        match current {
            Value::Map(map) => match map.get(segment) {
                Some(v) => current = v,
                None => return &Value::Null,
            },
            _ => return &Value::Null,
        }
    }
    current
}

impl FilterExpr {
    pub fn attr(name: impl Into<String>) -> Self {
        FilterExpr::Attr(name.into())
    }

    pub fn literal(val: impl Into<Value>) -> Self {
        FilterExpr::Literal(val.into())
    }

    pub fn eq(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Eq(Box::new(left), Box::new(right))
    }

    pub fn ne(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Ne(Box::new(left), Box::new(right))
    }

    pub fn lt(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Lt(Box::new(left), Box::new(right))
    }

    pub fn le(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Le(Box::new(left), Box::new(right))
    }

    pub fn gt(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Gt(Box::new(left), Box::new(right))
    }

    pub fn ge(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Ge(Box::new(left), Box::new(right))
    }

    pub fn between(val: FilterExpr, low: FilterExpr, high: FilterExpr) -> Self {
        FilterExpr::Between(Box::new(val), Box::new(low), Box::new(high))
    }

    pub fn begins_with(expr: FilterExpr, prefix: impl Into<String>) -> Self {
        FilterExpr::BeginsWith(Box::new(expr), prefix.into())
    }

    pub fn contains(expr: FilterExpr, search: impl Into<Value>) -> Self {
        FilterExpr::Contains(Box::new(expr), search.into())
    }

    pub fn attribute_exists(path: impl Into<String>) -> Self {
        FilterExpr::AttributeExists(path.into())
    }

    pub fn attribute_not_exists(path: impl Into<String>) -> Self {
        FilterExpr::AttributeNotExists(path.into())
    }

    pub fn and(exprs: Vec<FilterExpr>) -> Self {
        FilterExpr::And(exprs)
    }

    pub fn or(exprs: Vec<FilterExpr>) -> Self {
        FilterExpr::Or(exprs)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: FilterExpr) -> Self {
        FilterExpr::Not(Box::new(expr))
    }
}
