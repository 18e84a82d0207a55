//! Per-field conditions and their evaluation against documents.
//!
//! Evaluation follows the store's filter semantics: a missing attribute fails
//! every positive test and passes `NotEqual`/`NotContains`. Where the outcome
//! depends on a type the store would reject (ordering a string against a
//! number, `BeginsWith` on a list), evaluation is indeterminate and returns
//! `None`; the store path treats that as a non-match, the cache treats it as
//! "cannot decide".

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{Document, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Contains,
    NotContains,
    BeginsWith,
    In,
}

impl Operator {
    /// Operators the store accepts in a key condition on a range attribute.
    pub fn is_key_compatible(&self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::LessThan
                | Operator::LessOrEqual
                | Operator::GreaterThan
                | Operator::GreaterOrEqual
                | Operator::BeginsWith
        )
    }

    /// The operator that keeps the meaning when both operands swap sides.
    pub fn mirrored(&self) -> Option<Operator> {
        match self {
            Operator::Equal => Some(Operator::Equal),
            Operator::NotEqual => Some(Operator::NotEqual),
            Operator::LessThan => Some(Operator::GreaterThan),
            Operator::LessOrEqual => Some(Operator::GreaterOrEqual),
            Operator::GreaterThan => Some(Operator::LessThan),
            Operator::GreaterOrEqual => Some(Operator::LessOrEqual),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::BeginsWith => "begins_with",
            Operator::In => "in",
        }
    }
}

/// A single predicate on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            values: vec![value.into()],
        }
    }

    pub fn equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Equal, value)
    }

    pub fn one_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            operator: Operator::In,
            values,
        }
    }

    /// The single operand of a binary condition.
    pub fn value(&self) -> Option<&Value> {
        self.values.first()
    }

    pub fn is_equality_on(&self, field: &str) -> bool {
        self.operator == Operator::Equal && self.field == field
    }

    /// Returns true when the condition may be pushed into a key condition on
    /// `field`.
    pub fn is_key_condition_on(&self, field: &str) -> bool {
        self.field == field && self.operator.is_key_compatible()
    }

    /// Evaluates the condition. `None` means the outcome cannot be decided.
    pub fn evaluate(&self, document: &Document) -> Option<bool> {
        let actual = document.get(&self.field).filter(|v| !v.is_null());
        let Some(actual) = actual else {
            return Some(matches!(
                self.operator,
                Operator::NotEqual | Operator::NotContains
            ));
        };

        match self.operator {
            Operator::Equal => Some(actual.loosely_equals(self.value()?)),
            Operator::NotEqual => Some(!actual.loosely_equals(self.value()?)),
            Operator::LessThan => ordering(actual, self.value()?).map(|o| o == Ordering::Less),
            Operator::LessOrEqual => ordering(actual, self.value()?).map(|o| o != Ordering::Greater),
            Operator::GreaterThan => {
                ordering(actual, self.value()?).map(|o| o == Ordering::Greater)
            }
            Operator::GreaterOrEqual => ordering(actual, self.value()?).map(|o| o != Ordering::Less),
            Operator::Contains => contains(actual, self.value()?),
            Operator::NotContains => contains(actual, self.value()?).map(|c| !c),
            Operator::BeginsWith => match (actual, self.value()?) {
                (Value::Str(s), Value::Str(prefix)) => Some(s.starts_with(prefix.as_str())),
                (Value::Bytes(b), Value::Bytes(prefix)) => Some(b.starts_with(prefix)),
                _ => None,
            },
            Operator::In => Some(self.values.iter().any(|v| actual.loosely_equals(v))),
        }
    }

    /// Stable text form used in cache signatures.
    pub fn canonical(&self) -> String {
        let values: Vec<String> = self.values.iter().map(Value::canonical).collect();
        format!("{:?}{}[{}]", self.field, self.operator.symbol(), values.join(","))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.operator, self.values.as_slice()) {
            (Operator::In, values) => {
                let values: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{} in ({})", self.field, values.join(", "))
            }
            (op, [value]) => write!(f, "{} {} {}", self.field, op.symbol(), value),
            (op, _) => write!(f, "{} {} ?", self.field, op.symbol()),
        }
    }
}

fn ordering(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::List(_) | Value::Map(_), _) | (_, Value::List(_) | Value::Map(_)) => None,
        _ => actual.compare(expected),
    }
}

fn contains(actual: &Value, needle: &Value) -> Option<bool> {
    match (actual, needle) {
        (Value::Str(s), Value::Str(n)) => Some(s.contains(n.as_str())),
        (Value::List(items), n) => Some(items.iter().any(|item| item.loosely_equals(n))),
        (Value::Bytes(b), Value::Bytes(n)) => {
            Some(n.is_empty() || b.windows(n.len()).any(|w| w == n.as_slice()))
        }
        _ => None,
    }
}

/// An implicitly AND-combined list of conditions.
///
/// Conditions on the same field are kept as given; nothing is merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionSet(Vec<Condition>);

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: Condition) {
        self.0.push(condition);
    }

    pub fn with(mut self, condition: Condition) -> Self {
        self.push(condition);
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Condition> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Condition] {
        &self.0
    }

    /// Conjunction of every condition. A definite `false` wins over an
    /// indeterminate member.
    pub fn evaluate(&self, document: &Document) -> Option<bool> {
        let mut decided = true;
        for condition in &self.0 {
            match condition.evaluate(document) {
                Some(false) => return Some(false),
                Some(true) => {}
                None => decided = false,
            }
        }
        decided.then_some(true)
    }

    /// Store-side filtering: indeterminate counts as no match.
    pub fn matches(&self, document: &Document) -> bool {
        self.evaluate(document) == Some(true)
    }

    /// Order-independent signature of the set.
    pub fn signature(&self) -> String {
        let mut parts: Vec<String> = self.0.iter().map(Condition::canonical).collect();
        parts.sort();
        parts.join("&")
    }
}

impl FromIterator<Condition> for ConditionSet {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ConditionSet {
    type Item = Condition;
    type IntoIter = std::vec::IntoIter<Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ConditionSet {
    type Item = &'a Condition;
    type IntoIter = std::slice::Iter<'a, Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ConditionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "true");
        }
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(" AND "))
    }
}
