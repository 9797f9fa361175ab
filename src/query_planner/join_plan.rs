//! The planner's output: an ordered join tree plus the grouping spec the
//! materializer folds rows with. This is the binding contract with the
//! downstream emitter.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema_catalog::EntityId;

/// Identity column convention shared with the emitter.
pub const ID_COLUMN: &str = "Id";
/// Soft-delete column and its active value.
pub const STATUS_COLUMN: &str = "Status";
pub const STATUS_ACTIVE: &str = "Active";

/// Key of a column in the flat row set the emitter produces.
pub fn row_key(alias: &str, column: &str) -> String {
    format!("{alias}_{column}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    One,
    Many,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::One => write!(f, "one"),
            Cardinality::Many => write!(f, "many"),
        }
    }
}

/// Equality predicate joining a node to its parent:
/// `joined.left_column = parent.right_column`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPredicate {
    pub left_column: String,
    pub right_column: String,
}

/// Extra row filter, currently only the soft-delete status check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub column: String,
    pub value: String,
}

impl FilterPredicate {
    pub fn active_status() -> Self {
        FilterPredicate {
            column: STATUS_COLUMN.to_string(),
            value: STATUS_ACTIVE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinNode {
    /// Unique within the plan; the accumulated path of hop segments.
    pub alias: String,
    pub entity: EntityId,
    pub table: String,
    /// `None` for the root node only.
    pub parent_alias: Option<String>,
    /// `None` for the root node only.
    pub predicate: Option<JoinPredicate>,
    pub cardinality: Cardinality,
    pub soft_delete: Option<FilterPredicate>,
}

/// One level of the row-folding recipe, outer to inner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingLevel {
    pub alias: String,
    pub group_key: String,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub root_alias: String,
    /// Ordered: every non-root node's parent appears earlier in the list.
    pub joins: Vec<JoinNode>,
    /// Empty when the plan joins no collection; the materializer then maps
    /// rows one to one.
    pub grouping: Vec<GroupingLevel>,
    pub base_filter: Option<FilterPredicate>,
}

impl QueryPlan {
    /// Check the structural invariants: unique aliases, parents emitted
    /// before their children, root first.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.joins.len());
        for (index, node) in self.joins.iter().enumerate() {
            if seen.contains(&node.alias.as_str()) {
                return Err(format!("duplicate alias `{}`", node.alias));
            }
            match (&node.parent_alias, index) {
                (None, 0) => {}
                (None, _) => return Err(format!("non-root node `{}` has no parent", node.alias)),
                (Some(_), 0) => return Err("root node has a parent".to_string()),
                (Some(parent), _) => {
                    if !seen.contains(&parent.as_str()) {
                        return Err(format!(
                            "node `{}` appears before its parent `{parent}`",
                            node.alias
                        ));
                    }
                }
            }
            seen.push(&node.alias);
        }
        Ok(())
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.joins {
            match (&node.parent_alias, &node.predicate) {
                (Some(parent), Some(predicate)) => writeln!(
                    f,
                    "  JOIN {} AS {} ON {}.{} = {}.{} [{}]",
                    node.table,
                    node.alias,
                    node.alias,
                    predicate.left_column,
                    parent,
                    predicate.right_column,
                    node.cardinality,
                )?,
                _ => writeln!(f, "{} AS {}", node.table, node.alias)?,
            }
        }
        if let Some(filter) = &self.base_filter {
            writeln!(f, "  WHERE {}.{} = '{}'", self.root_alias, filter.column, filter.value)?;
        }
        for level in &self.grouping {
            writeln!(
                f,
                "  GROUP {} BY {} [{}]",
                level.alias, level.group_key, level.cardinality
            )?;
        }
        Ok(())
    }
}
