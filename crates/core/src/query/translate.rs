//! Translation of a [`QueryDescription`] into a normalized
//! [`TranslationResult`].
//!
//! Only AND-combined field predicates translate. Each supported node shape is
//! matched once in [`collect_conjuncts`]; anything else is an
//! `UnsupportedQueryShape` error raised before any I/O happens.

use super::{
    CompareOp, Condition, ConditionSet, Expr, FilterExpr, Method, Operator, QueryDescription,
    QueryError, QueryOp, Result, ScalarOp,
};
use crate::entity::{EntityDescriptor, FieldKind};
use crate::value::{Document, Value};

/// A reduction applied to the filtered rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub op: ScalarOp,
    /// For `All(p)`: the predicate every row must satisfy. Kept apart from the
    /// filter because its negation is not a conjunction.
    pub all_conditions: Option<ConditionSet>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationResult {
    pub conditions: ConditionSet,
    pub projection: Option<Vec<String>>,
    pub order_by_field: Option<String>,
    pub order_by_desc: bool,
    pub reduction: Option<Reduction>,
    pub custom_filter: Option<FilterExpr>,
}

impl TranslationResult {
    /// Applies the projection; without one the document is returned as is.
    pub fn project(&self, document: Document) -> Document {
        match &self.projection {
            Some(fields) => fields
                .iter()
                .filter_map(|f| document.get(f).map(|v| (f.clone(), v.clone())))
                .collect(),
            None => document,
        }
    }

    pub fn reduction_op(&self) -> Option<ScalarOp> {
        self.reduction.as_ref().map(|r| r.op)
    }

    /// Whether rows are read in reverse. `Last` flips the requested order.
    pub fn effective_desc(&self) -> bool {
        match self.reduction_op() {
            Some(ScalarOp::Last) => !self.order_by_desc,
            _ => self.order_by_desc,
        }
    }
}

/// Translates a query description against an entity type.
pub fn translate<E>(
    description: &QueryDescription,
    descriptor: &EntityDescriptor<E>,
) -> Result<TranslationResult> {
    let mut result = TranslationResult::default();
    let ops = description.ops();

    for (position, op) in ops.iter().enumerate() {
        match op {
            QueryOp::Where(expr) => collect_conjuncts(expr, descriptor, &mut result.conditions)?,
            QueryOp::Select(fields) => {
                for name in fields {
                    require_field(descriptor, name)?;
                }
                result.projection = (!fields.is_empty()).then(|| fields.clone());
            }
            QueryOp::OrderBy { field, desc } => {
                if result.order_by_field.is_some() {
                    return Err(QueryError::unsupported(
                        "only a single order-by column is supported",
                    ));
                }
                let kind = require_field(descriptor, field)?;
                if !kind.is_orderable() {
                    return Err(QueryError::unsupported(format!(
                        "cannot order by '{field}': {kind:?} values have no ordering"
                    )));
                }
                result.order_by_field = Some(field.clone());
                result.order_by_desc = *desc;
            }
            QueryOp::Reduce { op, predicate } => {
                if position + 1 != ops.len() {
                    return Err(QueryError::unsupported(
                        "a scalar reduction must be the last operation",
                    ));
                }
                let all_conditions = match (op, predicate) {
                    (ScalarOp::All, Some(p)) => {
                        let mut set = ConditionSet::new();
                        collect_conjuncts(p, descriptor, &mut set)?;
                        Some(set)
                    }
                    (ScalarOp::All, None) => {
                        return Err(QueryError::unsupported("All requires a predicate"));
                    }
                    (_, Some(p)) => {
                        collect_conjuncts(p, descriptor, &mut result.conditions)?;
                        None
                    }
                    (_, None) => None,
                };
                result.reduction = Some(Reduction {
                    op: *op,
                    all_conditions,
                });
            }
        }
    }

    if let Some(filter) = description.custom_filter_expr() {
        filter.validate()?;
        result.custom_filter = Some(filter.clone());
    }

    Ok(result)
}

fn require_field<E>(descriptor: &EntityDescriptor<E>, name: &str) -> Result<FieldKind> {
    descriptor.field(name).map(|f| f.kind).ok_or_else(|| {
        QueryError::unsupported(format!(
            "'{name}' is not a field of {}",
            descriptor.type_name()
        ))
    })
}

fn collect_conjuncts<E>(
    expr: &Expr,
    descriptor: &EntityDescriptor<E>,
    out: &mut ConditionSet,
) -> Result<()> {
    match expr {
        Expr::And(left, right) => {
            collect_conjuncts(left, descriptor, out)?;
            collect_conjuncts(right, descriptor, out)
        }
        Expr::Or(_, _) => Err(QueryError::unsupported(
            "OR is not supported; only AND-combined field predicates translate",
        )),
        Expr::Not(inner) => collect_negated(inner, descriptor, out),
        Expr::Field(name) => {
            out.push(boolean_field(descriptor, name, true)?);
            Ok(())
        }
        Expr::Literal(value) => Err(QueryError::unsupported(format!(
            "a literal ({value}) is not a predicate"
        ))),
        Expr::Compare { op, left, right } => {
            out.push(comparison(descriptor, operator_of(*op), left, right)?);
            Ok(())
        }
        Expr::Call {
            method,
            target,
            args,
        } => {
            out.push(call(descriptor, method, target, args, false)?);
            Ok(())
        }
    }
}

fn collect_negated<E>(
    inner: &Expr,
    descriptor: &EntityDescriptor<E>,
    out: &mut ConditionSet,
) -> Result<()> {
    let condition = match inner {
        Expr::Not(expr) => return collect_conjuncts(expr, descriptor, out),
        Expr::Field(name) => boolean_field(descriptor, name, false)?,
        Expr::Compare {
            op: CompareOp::Eq,
            left,
            right,
        } => comparison(descriptor, Operator::NotEqual, left, right)?,
        Expr::Compare {
            op: CompareOp::Ne,
            left,
            right,
        } => comparison(descriptor, Operator::Equal, left, right)?,
        Expr::Call {
            method: Method::Contains,
            target,
            args,
        } => call(descriptor, &Method::Contains, target, args, true)?,
        _ => {
            return Err(QueryError::unsupported(
                "negation only applies to boolean fields, equality and contains",
            ))
        }
    };
    out.push(condition);
    Ok(())
}

fn boolean_field<E>(descriptor: &EntityDescriptor<E>, name: &str, expected: bool) -> Result<Condition> {
    match require_field(descriptor, name)? {
        FieldKind::Bool => Ok(Condition::equal(name, expected)),
        kind => Err(QueryError::unsupported(format!(
            "'{name}' is a {kind:?} field and cannot be used as a predicate"
        ))),
    }
}

fn operator_of(op: CompareOp) -> Operator {
    match op {
        CompareOp::Eq => Operator::Equal,
        CompareOp::Ne => Operator::NotEqual,
        CompareOp::Lt => Operator::LessThan,
        CompareOp::Le => Operator::LessOrEqual,
        CompareOp::Gt => Operator::GreaterThan,
        CompareOp::Ge => Operator::GreaterOrEqual,
    }
}

fn comparison<E>(
    descriptor: &EntityDescriptor<E>,
    operator: Operator,
    left: &Expr,
    right: &Expr,
) -> Result<Condition> {
    let (name, value, operator) = match (left, right) {
        (Expr::Field(name), Expr::Literal(value)) => (name, value, operator),
        (Expr::Literal(value), Expr::Field(name)) => {
            let mirrored = operator.mirrored().ok_or_else(|| {
                QueryError::unsupported(format!("cannot mirror '{}'", operator.symbol()))
            })?;
            (name, value, mirrored)
        }
        _ => {
            return Err(QueryError::unsupported(
                "comparisons must be between a field and a literal",
            ))
        }
    };
    require_field(descriptor, name)?;
    Ok(Condition::new(name.clone(), operator, value.clone()))
}

fn call<E>(
    descriptor: &EntityDescriptor<E>,
    method: &Method,
    target: &Expr,
    args: &[Expr],
    negated: bool,
) -> Result<Condition> {
    let single_arg = || match args {
        [arg] => Ok(arg),
        _ => Err(QueryError::unsupported("expected exactly one argument")),
    };

    match (method, target, single_arg()?) {
        // `[a, b].contains(field)`, whichever builder produced it.
        (Method::ListContains | Method::Contains, Expr::Literal(Value::List(values)), Expr::Field(name)) => {
            if negated {
                return Err(QueryError::unsupported(
                    "negated list membership is not supported",
                ));
            }
            require_field(descriptor, name)?;
            Ok(Condition::one_of(name.clone(), values.clone()))
        }
        (Method::Contains, Expr::Field(name), Expr::Literal(needle)) => {
            match require_field(descriptor, name)? {
                FieldKind::Str | FieldKind::List => {}
                kind => {
                    return Err(QueryError::unsupported(format!(
                        "contains is not defined on '{name}' ({kind:?})"
                    )))
                }
            }
            let operator = if negated {
                Operator::NotContains
            } else {
                Operator::Contains
            };
            Ok(Condition::new(name.clone(), operator, needle.clone()))
        }
        (Method::StartsWith, Expr::Field(name), Expr::Literal(prefix @ Value::Str(_))) => {
            match require_field(descriptor, name)? {
                FieldKind::Str => Ok(Condition::new(
                    name.clone(),
                    Operator::BeginsWith,
                    prefix.clone(),
                )),
                kind => Err(QueryError::unsupported(format!(
                    "starts_with is not defined on '{name}' ({kind:?})"
                ))),
            }
        }
        (Method::Other(name), _, _) => Err(QueryError::unsupported(format!(
            "method '{name}' is not supported"
        ))),
        _ => Err(QueryError::unsupported(
            "method call does not target a field of the queried entity",
        )),
    }
}
