//! Renders conditions and filters as DynamoDB expressions.
//!
//! Attribute names always go through `#n` placeholders and values through
//! `:v` placeholders, so reserved words and odd characters never reach the
//! expression text.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use dynalinq_core::query::{Condition, ConditionSet, FilterExpr, Operator};
use dynalinq_core::store::{StoreError, WriteCondition};
use dynalinq_core::Value;

use super::conversions::value_to_attribute;

/// Placeholder maps shared by every expression of one request.
#[derive(Debug, Default)]
pub struct Expressions {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl Expressions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder for one attribute name. Repeated names share a placeholder.
    pub fn name(&mut self, attribute: &str) -> String {
        if let Some((placeholder, _)) = self.names.iter().find(|(_, name)| *name == attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.to_string());
        placeholder
    }

    /// Placeholder path for a dot-separated nested attribute.
    pub fn path(&mut self, path: &str) -> String {
        path.split('.')
            .map(|segment| self.name(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn value(&mut self, value: &Value) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values
            .insert(placeholder.clone(), value_to_attribute(value));
        placeholder
    }

    pub fn condition(&mut self, condition: &Condition) -> Result<String, StoreError> {
        let name = self.name(&condition.field);
        if condition.operator == Operator::In {
            return self.in_list(&name, condition);
        }

        let operand = condition.value().ok_or_else(|| {
            StoreError::InvalidData(format!("Condition on '{}' has no operand", condition.field))
        })?;
        let value = self.value(operand);
        let rendered = match condition.operator {
            // A missing attribute passes the negative tests.
            Operator::NotEqual => format!("(attribute_not_exists({name}) OR {name} <> {value})"),
            Operator::NotContains => {
                format!("(attribute_not_exists({name}) OR NOT contains({name}, {value}))")
            }
            Operator::Contains => format!("contains({name}, {value})"),
            Operator::BeginsWith => format!("begins_with({name}, {value})"),
            op => format!("{name} {} {value}", op.symbol()),
        };
        Ok(rendered)
    }

    fn in_list(&mut self, name: &str, condition: &Condition) -> Result<String, StoreError> {
        if condition.values.is_empty() {
            return Err(StoreError::InvalidData(format!(
                "Empty IN list for '{}'",
                condition.field
            )));
        }
        let values: Vec<String> = condition.values.iter().map(|v| self.value(v)).collect();
        Ok(format!("{name} IN ({})", values.join(", ")))
    }

    /// AND-joins a condition set. `None` when the set is empty.
    pub fn conditions(&mut self, set: &ConditionSet) -> Result<Option<String>, StoreError> {
        let parts = set
            .iter()
            .map(|c| self.condition(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(join(parts, " AND "))
    }

    pub fn filter(&mut self, expr: &FilterExpr) -> Result<String, StoreError> {
        let rendered = match expr {
            FilterExpr::Attr(path) => self.path(path),
            FilterExpr::Literal(value) => self.value(value),
            FilterExpr::Eq(l, r) => self.binary(l, "=", r)?,
            FilterExpr::Ne(l, r) => self.binary(l, "<>", r)?,
            FilterExpr::Lt(l, r) => self.binary(l, "<", r)?,
            FilterExpr::Le(l, r) => self.binary(l, "<=", r)?,
            FilterExpr::Gt(l, r) => self.binary(l, ">", r)?,
            FilterExpr::Ge(l, r) => self.binary(l, ">=", r)?,
            FilterExpr::Between(v, lo, hi) => format!(
                "{} BETWEEN {} AND {}",
                self.filter(v)?,
                self.filter(lo)?,
                self.filter(hi)?
            ),
            FilterExpr::BeginsWith(e, prefix) => {
                let operand = self.filter(e)?;
                let value = self.value(&Value::Str(prefix.clone()));
                format!("begins_with({operand}, {value})")
            }
            FilterExpr::Contains(e, needle) => {
                let operand = self.filter(e)?;
                let value = self.value(needle);
                format!("contains({operand}, {value})")
            }
            FilterExpr::AttributeExists(path) => format!("attribute_exists({})", self.path(path)),
            FilterExpr::AttributeNotExists(path) => {
                format!("attribute_not_exists({})", self.path(path))
            }
            FilterExpr::And(exprs) => self.junction(exprs, " AND ")?,
            FilterExpr::Or(exprs) => self.junction(exprs, " OR ")?,
            FilterExpr::Not(e) => format!("NOT ({})", self.filter(e)?),
        };
        Ok(rendered)
    }

    fn binary(&mut self, l: &FilterExpr, op: &str, r: &FilterExpr) -> Result<String, StoreError> {
        Ok(format!("{} {op} {}", self.filter(l)?, self.filter(r)?))
    }

    fn junction(&mut self, exprs: &[FilterExpr], separator: &str) -> Result<String, StoreError> {
        let parts = exprs
            .iter()
            .map(|e| self.filter(e))
            .collect::<Result<Vec<_>, _>>()?;
        join(parts, separator)
            .map(|joined| format!("({joined})"))
            .ok_or_else(|| StoreError::InvalidData("Empty AND/OR in filter".to_string()))
    }

    /// Condition expression guarding one write, keyed on the table's hash
    /// attribute for existence checks.
    pub fn write_condition(&mut self, condition: &WriteCondition, hash_key: &str) -> Option<String> {
        match condition {
            WriteCondition::None => None,
            WriteCondition::NotExists => {
                Some(format!("attribute_not_exists({})", self.name(hash_key)))
            }
            WriteCondition::VersionEquals { field, version } => {
                let name = self.name(field);
                let value = self.value(&Value::Int(*version));
                Some(format!("{name} = {value}"))
            }
            WriteCondition::VersionAbsent { field } => {
                Some(format!("attribute_not_exists({})", self.name(field)))
            }
        }
    }

    pub fn names(&self) -> Option<HashMap<String, String>> {
        (!self.names.is_empty()).then(|| self.names.clone())
    }

    pub fn values(&self) -> Option<HashMap<String, AttributeValue>> {
        (!self.values.is_empty()).then(|| self.values.clone())
    }
}

fn join(parts: Vec<String>, separator: &str) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(separator))
    }
}

/// Combines optional expression fragments with AND.
pub fn and_all(parts: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    let parts: Vec<String> = parts.into_iter().flatten().collect();
    match parts.len() {
        0 => None,
        1 => parts.into_iter().next(),
        _ => Some(
            parts
                .iter()
                .map(|p| format!("({p})"))
                .collect::<Vec<_>>()
                .join(" AND "),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_condition_uses_placeholders() {
        let mut expressions = Expressions::new();
        let rendered = expressions
            .condition(&Condition::equal("Name", "Alien"))
            .unwrap();
        assert_eq!(rendered, "#n0 = :v0");
        assert_eq!(expressions.names().unwrap()["#n0"], "Name");
        assert_eq!(
            expressions.values().unwrap()[":v0"],
            AttributeValue::S("Alien".to_string())
        );
    }

    #[test]
    fn test_repeated_names_share_placeholder() {
        let mut expressions = Expressions::new();
        let set = ConditionSet::new()
            .with(Condition::new("Year", Operator::GreaterThan, 1990))
            .with(Condition::new("Year", Operator::LessThan, 2000));
        let rendered = expressions.conditions(&set).unwrap().unwrap();
        assert_eq!(rendered, "#n0 > :v0 AND #n0 < :v1");
    }

    #[test]
    fn test_negative_conditions_pass_missing_attributes() {
        let mut expressions = Expressions::new();
        let rendered = expressions
            .condition(&Condition::new("Genre", Operator::NotEqual, "Drama"))
            .unwrap();
        assert_eq!(rendered, "(attribute_not_exists(#n0) OR #n0 <> :v0)");
    }

    #[test]
    fn test_in_condition() {
        let mut expressions = Expressions::new();
        let rendered = expressions
            .condition(&Condition::one_of(
                "Year",
                vec![Value::Int(1979), Value::Int(1986)],
            ))
            .unwrap();
        assert_eq!(rendered, "#n0 IN (:v0, :v1)");
        assert!(expressions
            .condition(&Condition::one_of("Year", vec![]))
            .is_err());
    }

    #[test]
    fn test_nested_filter_paths() {
        let mut expressions = Expressions::new();
        let filter = FilterExpr::Or(vec![
            FilterExpr::Eq(
                Box::new(FilterExpr::Attr("Address.City".to_string())),
                Box::new(FilterExpr::Literal(Value::from("Oslo"))),
            ),
            FilterExpr::AttributeNotExists("Address".to_string()),
        ]);
        let rendered = expressions.filter(&filter).unwrap();
        assert_eq!(rendered, "(#n0.#n1 = :v0 OR attribute_not_exists(#n0))");
    }

    #[test]
    fn test_empty_junction_is_rejected() {
        let mut expressions = Expressions::new();
        assert!(expressions.filter(&FilterExpr::And(vec![])).is_err());
    }

    #[test]
    fn test_version_write_condition() {
        let mut expressions = Expressions::new();
        let rendered = expressions.write_condition(
            &WriteCondition::VersionEquals {
                field: "Version".to_string(),
                version: 3,
            },
            "UserId",
        );
        assert_eq!(rendered.as_deref(), Some("#n0 = :v0"));
        assert_eq!(expressions.write_condition(&WriteCondition::None, "UserId"), None);
    }

    #[test]
    fn test_and_all_wraps_multiple_parts() {
        assert_eq!(and_all([None, Some("a".to_string())]), Some("a".to_string()));
        assert_eq!(
            and_all([Some("a".to_string()), Some("b".to_string())]),
            Some("(a) AND (b)".to_string())
        );
        assert_eq!(and_all([None, None]), None);
    }
}
