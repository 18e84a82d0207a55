//! Pure functions for deciding how to bring a table to its declared shape.

use super::{GlobalIndex, TableDefinition};

/// What the store reports about an existing table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableState {
    pub status: TableStatus,
    pub global_indexes: Vec<GlobalIndexState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Active,
    Creating,
    Updating,
    Deleting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalIndexState {
    pub name: String,
    pub status: IndexStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Active,
    Creating,
    Updating,
    Deleting,
}

/// Planned changes for a table declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum DeployPlan {
    /// Table doesn't exist, needs to be created (and seeded).
    CreateTable { definition: TableDefinition },
    /// Table exists, global indexes need to be added.
    AddGlobalIndexes {
        table_name: String,
        indexes: Vec<GlobalIndex>,
    },
    /// Table is up to date.
    NoChanges { table_name: String },
}

impl DeployPlan {
    pub fn is_create(&self) -> bool {
        matches!(self, DeployPlan::CreateTable { .. })
    }
}

/// Calculates what changes are needed to reach the declared state.
///
/// Local indexes and key attributes cannot change after creation, so only
/// missing global indexes are planned for an existing table.
pub fn calculate_deploy_plan(current: Option<&TableState>, desired: &TableDefinition) -> DeployPlan {
    match current {
        None => DeployPlan::CreateTable {
            definition: desired.clone(),
        },
        Some(state) => {
            let existing: Vec<&str> = state
                .global_indexes
                .iter()
                .map(|g| g.name.as_str())
                .collect();

            let indexes: Vec<GlobalIndex> = desired
                .key_schema
                .global_indexes
                .iter()
                .filter(|gsi| !existing.contains(&gsi.name.as_str()))
                .cloned()
                .collect();

            if indexes.is_empty() {
                DeployPlan::NoChanges {
                    table_name: desired.name.clone(),
                }
            } else {
                DeployPlan::AddGlobalIndexes {
                    table_name: desired.name.clone(),
                    indexes,
                }
            }
        }
    }
}

/// Formats a deploy plan for display.
pub fn format_deploy_plan(plan: &DeployPlan) -> Vec<String> {
    match plan {
        DeployPlan::CreateTable { definition } => {
            let schema = &definition.key_schema;
            let mut lines = vec![
                format!("+ Create table: {}", definition.name),
                format!(
                    "  Hash key: {} ({})",
                    schema.hash_key.name,
                    schema.hash_key.attribute_type.code()
                ),
            ];
            if let Some(range) = &schema.range_key {
                lines.push(format!(
                    "  Range key: {} ({})",
                    range.name,
                    range.attribute_type.code()
                ));
            }
            for lsi in &schema.local_indexes {
                lines.push(format!("  + LSI: {} on {}", lsi.name, lsi.range_key.name));
            }
            for gsi in &schema.global_indexes {
                lines.extend(format_global_index(gsi, "  + GSI"));
            }
            lines
        }
        DeployPlan::AddGlobalIndexes {
            table_name,
            indexes,
        } => {
            let mut lines = vec![format!("~ Update table: {}", table_name)];
            for gsi in indexes {
                lines.extend(format_global_index(gsi, "  + Add GSI"));
            }
            lines
        }
        DeployPlan::NoChanges { table_name } => {
            vec![format!("= Table '{}' is up to date", table_name)]
        }
    }
}

fn format_global_index(gsi: &GlobalIndex, prefix: &str) -> Vec<String> {
    let mut lines = vec![
        format!("{}: {}", prefix, gsi.name),
        format!("    Hash key: {}", gsi.hash_key.name),
    ];
    if let Some(range) = &gsi.range_key {
        lines.push(format!("    Range key: {}", range.name));
    }
    match gsi.capacity.resolve() {
        Some(t) => lines.push(format!("    Capacity: {} RCU / {} WCU", t.read, t.write)),
        None => lines.push("    Capacity: on demand".to_string()),
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Capacity, KeyAttribute, KeySchema, Throughput};

    fn definition() -> TableDefinition {
        let schema = KeySchema::new(KeyAttribute::string("UserId"))
            .with_range(KeyAttribute::string("GameTitle"))
            .with_global_index(
                GlobalIndex::new("GameTitleIndex", KeyAttribute::string("GameTitle"))
                    .with_range(KeyAttribute::number("TopScore")),
            );
        TableDefinition::new("GameScores", schema)
    }

    fn state(gsis: &[&str]) -> TableState {
        TableState {
            status: TableStatus::Active,
            global_indexes: gsis
                .iter()
                .map(|name| GlobalIndexState {
                    name: name.to_string(),
                    status: IndexStatus::Active,
                })
                .collect(),
        }
    }

    #[test]
    fn test_plan_creates_missing_table() {
        let plan = calculate_deploy_plan(None, &definition());
        assert!(plan.is_create());
    }

    #[test]
    fn test_plan_adds_missing_global_index() {
        let plan = calculate_deploy_plan(Some(&state(&[])), &definition());
        match plan {
            DeployPlan::AddGlobalIndexes {
                table_name,
                indexes,
            } => {
                assert_eq!(table_name, "GameScores");
                assert_eq!(indexes.len(), 1);
                assert_eq!(indexes[0].name, "GameTitleIndex");
            }
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn test_plan_no_changes_when_up_to_date() {
        let plan = calculate_deploy_plan(Some(&state(&["GameTitleIndex"])), &definition());
        assert_eq!(
            plan,
            DeployPlan::NoChanges {
                table_name: "GameScores".to_string()
            }
        );
    }

    #[test]
    fn test_format_create_plan() {
        let lines = format_deploy_plan(&calculate_deploy_plan(None, &definition()));
        assert_eq!(lines[0], "+ Create table: GameScores");
        assert_eq!(lines[1], "  Hash key: UserId (S)");
        assert_eq!(lines[2], "  Range key: GameTitle (S)");
        assert!(lines.contains(&"  + GSI: GameTitleIndex".to_string()));
        assert!(lines.contains(&"    Capacity: on demand".to_string()));
    }

    #[test]
    fn test_format_fixed_capacity() {
        let gsi = GlobalIndex::new("ByTitle", KeyAttribute::string("GameTitle"))
            .with_capacity(Capacity::Fixed(Throughput { read: 10, write: 5 }));
        let lines = format_global_index(&gsi, "  + GSI");
        assert_eq!(lines.last().map(String::as_str), Some("    Capacity: 10 RCU / 5 WCU"));
    }
}
