//! Write-side planning: which foreign-key existence checks a create/update
//! of an aggregate can share.
//!
//! The planner output is static and immutable. The runtime membership set it
//! describes is built fresh by the emitted code for exactly one logical
//! write operation and threaded as an explicit parameter through that
//! operation's call graph; it is never a shared or global cache.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema_catalog::entity_classification as classify;
use crate::schema_catalog::{EntityId, EntityKey, EntityKind, ReferenceGraph};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum WritePlanError {
    #[error("`{entity}` is not an aggregate root")]
    NotAnAggregateRoot { entity: EntityKey },
}

/// One shared existence check: all references out of one aggregate to one
/// target entity, however many differently named properties carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyCache {
    pub target: EntityId,
    pub target_name: String,
    /// Entities inside the aggregate holding a reference to the target.
    /// Never empty.
    pub owners: BTreeSet<String>,
}

/// Plan the deduplicated existence-check caches for one aggregate write.
///
/// Unions the outbound references of the root and every transitive child,
/// excluding value-object targets, and groups them by target entity. Output
/// is ordered by target entity name.
pub fn plan_fk_caches(
    graph: &ReferenceGraph,
    root: EntityId,
) -> Result<Vec<ForeignKeyCache>, WritePlanError> {
    let root_node = graph.entity(root);
    if !classify::is_aggregate_root(&root_node.def) {
        return Err(WritePlanError::NotAnAggregateRoot {
            entity: root_node.key(),
        });
    }

    let mut grouped: BTreeMap<String, ForeignKeyCache> = BTreeMap::new();
    for member in graph.aggregate_members(root) {
        let member_node = graph.entity(member);
        for edge in &member_node.outbound {
            if graph.def(edge.target).kind == EntityKind::ValueObject {
                continue;
            }
            let target_name = graph.def(edge.target).name.clone();
            grouped
                .entry(target_name.clone())
                .or_insert_with(|| ForeignKeyCache {
                    target: edge.target,
                    target_name,
                    owners: BTreeSet::new(),
                })
                .owners
                .insert(member_node.def.name.clone());
        }
    }

    let caches: Vec<ForeignKeyCache> = grouped.into_values().collect();
    debug!(
        "planned {} fk cache(s) for `{}`",
        caches.len(),
        root_node.key()
    );
    Ok(caches)
}
