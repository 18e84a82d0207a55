//! Access-path selection from a condition set and a key schema.
//!
//! Planning is pure and deterministic: the same schema and conditions always
//! produce the same plan. Preference order is point-get, primary query (with
//! or without a local index), global index query, scan. Every plan keeps the
//! conditions it could not push into the key condition as a residual filter,
//! so all paths return the same rows.

use std::fmt;

use crate::entity::EntityKey;
use crate::query::{Condition, ConditionSet};
use crate::schema::{GlobalIndex, KeySchema};

#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    PointGet {
        key: EntityKey,
        residual: ConditionSet,
    },
    PrimaryQuery {
        hash_condition: Condition,
        range_conditions: ConditionSet,
        local_index: Option<String>,
        residual: ConditionSet,
    },
    IndexQuery {
        index_name: String,
        hash_condition: Condition,
        range_conditions: ConditionSet,
        residual: ConditionSet,
    },
    Scan {
        filter: ConditionSet,
    },
}

impl QueryPlan {
    /// Conditions evaluated after retrieval.
    pub fn residual(&self) -> &ConditionSet {
        match self {
            QueryPlan::PointGet { residual, .. }
            | QueryPlan::PrimaryQuery { residual, .. }
            | QueryPlan::IndexQuery { residual, .. } => residual,
            QueryPlan::Scan { filter } => filter,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueryPlan::PointGet { .. } => "point-get",
            QueryPlan::PrimaryQuery { .. } => "primary-query",
            QueryPlan::IndexQuery { .. } => "index-query",
            QueryPlan::Scan { .. } => "scan",
        }
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryPlan::PointGet { key, residual } => {
                write!(f, "PointGet {key}")?;
                if !residual.is_empty() {
                    write!(f, " filter [{residual}]")?;
                }
                Ok(())
            }
            QueryPlan::PrimaryQuery {
                hash_condition,
                range_conditions,
                local_index,
                residual,
            } => {
                write!(f, "Query [{hash_condition}")?;
                if !range_conditions.is_empty() {
                    write!(f, " AND {range_conditions}")?;
                }
                write!(f, "]")?;
                if let Some(index) = local_index {
                    write!(f, " using local index {index}")?;
                }
                if !residual.is_empty() {
                    write!(f, " filter [{residual}]")?;
                }
                Ok(())
            }
            QueryPlan::IndexQuery {
                index_name,
                hash_condition,
                range_conditions,
                residual,
            } => {
                write!(f, "Query {index_name} [{hash_condition}")?;
                if !range_conditions.is_empty() {
                    write!(f, " AND {range_conditions}")?;
                }
                write!(f, "]")?;
                if !residual.is_empty() {
                    write!(f, " filter [{residual}]")?;
                }
                Ok(())
            }
            QueryPlan::Scan { filter } => write!(f, "Scan filter [{filter}]"),
        }
    }
}

/// Chooses the access path for `conditions` on a table with `schema`.
pub fn select_plan(conditions: &ConditionSet, schema: &KeySchema) -> QueryPlan {
    let all = conditions.as_slice();

    if let Some(hash_pos) = position(all, |c| c.is_equality_on(schema.hash_key_name())) {
        return plan_primary(all, hash_pos, schema);
    }

    if let Some((gsi, hash_pos, range_pos)) = best_global_index(all, schema) {
        let mut taken = vec![hash_pos];
        taken.extend(range_pos);
        return QueryPlan::IndexQuery {
            index_name: gsi.name.clone(),
            hash_condition: all[hash_pos].clone(),
            range_conditions: range_pos.map(|p| all[p].clone()).into_iter().collect(),
            residual: residual(all, &taken),
        };
    }

    QueryPlan::Scan {
        filter: conditions.clone(),
    }
}

fn plan_primary(all: &[Condition], hash_pos: usize, schema: &KeySchema) -> QueryPlan {
    let hash_condition = &all[hash_pos];
    let hash_value = hash_condition.value().cloned().unwrap_or_default();

    match schema.range_key_name() {
        None => {
            return QueryPlan::PointGet {
                key: EntityKey::hash_only(hash_value),
                residual: residual(all, &[hash_pos]),
            }
        }
        Some(range_name) => {
            if let Some(range_pos) = position(all, |c| c.is_equality_on(range_name)) {
                let range_value = all[range_pos].value().cloned().unwrap_or_default();
                return QueryPlan::PointGet {
                    key: EntityKey::with_range(hash_value, range_value),
                    residual: residual(all, &[hash_pos, range_pos]),
                };
            }
        }
    }

    // The primary range key wins over any local index.
    let mut range_pos = schema
        .range_key_name()
        .and_then(|name| position(all, |c| c.is_key_condition_on(name)));
    let mut local_index = None;

    if range_pos.is_none() {
        for lsi in &schema.local_indexes {
            if let Some(pos) = position(all, |c| c.is_key_condition_on(&lsi.range_key.name)) {
                range_pos = Some(pos);
                local_index = Some(lsi.name.clone());
                break;
            }
        }
    }

    let mut taken = vec![hash_pos];
    taken.extend(range_pos);
    QueryPlan::PrimaryQuery {
        hash_condition: hash_condition.clone(),
        range_conditions: range_pos.map(|p| all[p].clone()).into_iter().collect(),
        local_index,
        residual: residual(all, &taken),
    }
}

/// Picks the global index covering the most conditions; ties go to the one
/// declared first.
///
/// A global index with a range key only holds rows carrying that attribute,
/// so it is eligible only when a key condition on its range attribute drops
/// the rows it is missing on every other path too.
fn best_global_index<'a>(
    all: &[Condition],
    schema: &'a KeySchema,
) -> Option<(&'a GlobalIndex, usize, Option<usize>)> {
    let mut best: Option<(&GlobalIndex, usize, Option<usize>)> = None;

    for gsi in &schema.global_indexes {
        let Some(hash_pos) = position(all, |c| c.is_equality_on(&gsi.hash_key.name)) else {
            continue;
        };
        let range_pos = match &gsi.range_key {
            Some(range) => match position(all, |c| c.is_key_condition_on(&range.name)) {
                Some(pos) => Some(pos),
                None => continue,
            },
            None => None,
        };

        let covered = 1 + usize::from(range_pos.is_some());
        let best_covered = best
            .as_ref()
            .map(|(_, _, r)| 1 + usize::from(r.is_some()))
            .unwrap_or(0);
        if covered > best_covered {
            best = Some((gsi, hash_pos, range_pos));
        }
    }

    best
}

fn position(all: &[Condition], predicate: impl Fn(&Condition) -> bool) -> Option<usize> {
    all.iter().position(predicate)
}

fn residual(all: &[Condition], taken: &[usize]) -> ConditionSet {
    all.iter()
        .enumerate()
        .filter(|(i, _)| !taken.contains(i))
        .map(|(_, c)| c.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Operator;
    use crate::schema::KeyAttribute;
    use crate::value::Value;

    fn game_scores(with_gsi: bool) -> KeySchema {
        let schema = KeySchema::new(KeyAttribute::string("UserId"))
            .with_range(KeyAttribute::string("GameTitle"))
            .with_local_index("WinsIndex", KeyAttribute::number("Wins"));
        if with_gsi {
            schema.with_global_index(
                GlobalIndex::new("GameTitleIndex", KeyAttribute::string("GameTitle"))
                    .with_range(KeyAttribute::number("TopScore")),
            )
        } else {
            schema
        }
    }

    fn set(conditions: Vec<Condition>) -> ConditionSet {
        conditions.into_iter().collect()
    }

    #[test]
    fn test_hash_and_range_equality_is_point_get() {
        let plan = select_plan(
            &set(vec![
                Condition::equal("GameTitle", "Starship X"),
                Condition::equal("UserId", "u1"),
                Condition::new("TopScore", Operator::GreaterThan, 30),
            ]),
            &game_scores(true),
        );
        assert_eq!(
            plan,
            QueryPlan::PointGet {
                key: EntityKey::with_range("u1", "Starship X"),
                residual: set(vec![Condition::new("TopScore", Operator::GreaterThan, 30)]),
            }
        );
    }

    #[test]
    fn test_hash_only_table_point_get() {
        let schema = KeySchema::new(KeyAttribute::string("Id"));
        let plan = select_plan(&set(vec![Condition::equal("Id", "a")]), &schema);
        assert!(matches!(plan, QueryPlan::PointGet { .. }));
    }

    #[test]
    fn test_hash_equality_with_range_condition_is_primary_query() {
        let plan = select_plan(
            &set(vec![
                Condition::equal("UserId", "u1"),
                Condition::new("GameTitle", Operator::BeginsWith, "Star"),
                Condition::new("Wins", Operator::GreaterThan, 3),
            ]),
            &game_scores(false),
        );
        match plan {
            QueryPlan::PrimaryQuery {
                range_conditions,
                local_index,
                residual,
                ..
            } => {
                assert_eq!(range_conditions.as_slice()[0].field, "GameTitle");
                assert_eq!(local_index, None);
                assert_eq!(residual.as_slice()[0].field, "Wins");
            }
            other => panic!("unexpected plan: {other}"),
        }
    }

    #[test]
    fn test_local_index_is_used_for_its_range_attribute() {
        let plan = select_plan(
            &set(vec![
                Condition::equal("UserId", "u1"),
                Condition::new("Wins", Operator::GreaterOrEqual, 3),
            ]),
            &game_scores(false),
        );
        match plan {
            QueryPlan::PrimaryQuery { local_index, residual, .. } => {
                assert_eq!(local_index.as_deref(), Some("WinsIndex"));
                assert!(residual.is_empty());
            }
            other => panic!("unexpected plan: {other}"),
        }
    }

    #[test]
    fn test_non_key_operator_stays_in_residual() {
        let plan = select_plan(
            &set(vec![
                Condition::equal("UserId", "u1"),
                Condition::new("GameTitle", Operator::NotEqual, "Starship X"),
            ]),
            &game_scores(false),
        );
        match plan {
            QueryPlan::PrimaryQuery {
                range_conditions,
                residual,
                ..
            } => {
                assert!(range_conditions.is_empty());
                assert_eq!(residual.len(), 1);
            }
            other => panic!("unexpected plan: {other}"),
        }
    }

    #[test]
    fn test_gsi_is_used_without_hash_key_equality() {
        let conditions = set(vec![
            Condition::equal("GameTitle", "Starship X"),
            Condition::new("TopScore", Operator::GreaterThan, 30),
        ]);
        let plan = select_plan(&conditions, &game_scores(true));
        assert_eq!(
            plan,
            QueryPlan::IndexQuery {
                index_name: "GameTitleIndex".to_string(),
                hash_condition: Condition::equal("GameTitle", "Starship X"),
                range_conditions: set(vec![Condition::new("TopScore", Operator::GreaterThan, 30)]),
                residual: ConditionSet::new(),
            }
        );

        let fallback = select_plan(&conditions, &game_scores(false));
        assert_eq!(fallback, QueryPlan::Scan { filter: conditions });
    }

    #[test]
    fn test_gsi_covering_more_conditions_wins() {
        let schema = KeySchema::new(KeyAttribute::string("UserId"))
            .with_global_index(GlobalIndex::new("ByTitle", KeyAttribute::string("GameTitle")))
            .with_global_index(
                GlobalIndex::new("ByTitleScore", KeyAttribute::string("GameTitle"))
                    .with_range(KeyAttribute::number("TopScore")),
            );
        let conditions = set(vec![
            Condition::equal("GameTitle", "Starship X"),
            Condition::new("TopScore", Operator::LessThan, 30),
        ]);
        match select_plan(&conditions, &schema) {
            QueryPlan::IndexQuery { index_name, .. } => assert_eq!(index_name, "ByTitleScore"),
            other => panic!("unexpected plan: {other}"),
        }

        let only_hash = set(vec![Condition::equal("GameTitle", "Starship X")]);
        match select_plan(&only_hash, &schema) {
            QueryPlan::IndexQuery { index_name, .. } => assert_eq!(index_name, "ByTitle"),
            other => panic!("unexpected plan: {other}"),
        }
    }

    #[test]
    fn test_gsi_with_unconstrained_range_is_not_eligible() {
        let conditions = set(vec![
            Condition::equal("GameTitle", "Starship X"),
            Condition::new("Wins", Operator::GreaterThan, 1),
        ]);
        assert_eq!(
            select_plan(&conditions, &game_scores(true)),
            QueryPlan::Scan { filter: conditions }
        );
    }

    #[test]
    fn test_hash_only_gsi_keeps_residual() {
        let schema = KeySchema::new(KeyAttribute::string("UserId"))
            .with_global_index(GlobalIndex::new("ByTitle", KeyAttribute::string("GameTitle")));
        let conditions = set(vec![
            Condition::equal("GameTitle", "Starship X"),
            Condition::new("Wins", Operator::GreaterThan, 1),
        ]);
        match select_plan(&conditions, &schema) {
            QueryPlan::IndexQuery {
                range_conditions,
                residual,
                ..
            } => {
                assert!(range_conditions.is_empty());
                assert_eq!(residual.as_slice()[0].field, "Wins");
            }
            other => panic!("unexpected plan: {other}"),
        }
    }

    #[test]
    fn test_no_key_conditions_is_scan() {
        let conditions = set(vec![Condition::new("Wins", Operator::GreaterThan, 1)]);
        assert_eq!(
            select_plan(&conditions, &game_scores(true)),
            QueryPlan::Scan { filter: conditions }
        );
    }

    #[test]
    fn test_display() {
        let plan = QueryPlan::PointGet {
            key: EntityKey::with_range(Value::from("Alien"), Value::Int(1979)),
            residual: ConditionSet::new(),
        };
        assert_eq!(plan.to_string(), "PointGet (\"Alien\", 1979)");
    }
}
