//! Read-side planning: derive the join tree a resolved projection needs.
//!
//! Depth-first and alias-memoized: one logical table-path is joined exactly
//! once, child collections always join fresh under their own parent, and
//! nodes are emitted strictly after the node they join to. Fields that
//! cannot be planned are dropped softly; the rest of the plan stands.

use log::{debug, warn};

use crate::dto_resolver::{FieldBinding, ReferenceHop, ResolvedDtoMapping};
use crate::schema_catalog::ReferenceGraph;

pub mod errors;
pub mod join_context;
pub mod join_plan;

pub use errors::PlanError;
pub use join_plan::{
    row_key, Cardinality, FilterPredicate, GroupingLevel, JoinNode, JoinPredicate, QueryPlan,
    ID_COLUMN, STATUS_ACTIVE, STATUS_COLUMN,
};

use join_context::{compose_alias, JoinContext};

/// A plan plus every field dropped while deriving it.
#[derive(Debug)]
pub struct PlanOutcome {
    pub plan: QueryPlan,
    pub dropped: Vec<PlanError>,
}

/// Plan the joins and grouping for one read of `mapping`'s entity.
pub fn plan_read_query(
    graph: &ReferenceGraph,
    mapping: &ResolvedDtoMapping,
    soft_delete: bool,
) -> Result<PlanOutcome, PlanError> {
    let root_def = graph.def(mapping.entity);
    let table = root_def
        .storage_table
        .clone()
        .ok_or_else(|| PlanError::MissingStorageTable {
            entity: root_def.key(),
        })?;

    // Canonical short code of the root entity anchors every alias.
    let root_alias = root_def.name.clone();
    let soft = soft_delete.then(FilterPredicate::active_status);

    let mut ctx = JoinContext::new(JoinNode {
        alias: root_alias.clone(),
        entity: mapping.entity,
        table,
        parent_alias: None,
        predicate: None,
        cardinality: Cardinality::One,
        soft_delete: soft.clone(),
    });
    let mut grouping = vec![GroupingLevel {
        alias: root_alias.clone(),
        group_key: mapping
            .group_property
            .clone()
            .unwrap_or_else(|| ID_COLUMN.to_string()),
        cardinality: Cardinality::One,
    }];
    let mut dropped = Vec::new();

    plan_level(graph, mapping, &root_alias, &soft, &mut ctx, &mut grouping, &mut dropped);

    let joins = ctx.into_nodes();
    // Only collections fan rows out; without one the materializer maps rows
    // one to one and the grouping recipe would be dead weight.
    let plan = QueryPlan {
        root_alias,
        joins,
        grouping: if mapping.has_collections() { grouping } else { Vec::new() },
        base_filter: soft,
    };
    plan.validate()
        .map_err(|message| PlanError::InvalidPlan { message })?;
    log::trace!("plan for `{}`:\n{plan}", mapping.name);
    debug!(
        "planned `{}`: {} join(s), {} grouping level(s), {} dropped",
        mapping.name,
        plan.joins.len(),
        plan.grouping.len(),
        dropped.len()
    );
    Ok(PlanOutcome { plan, dropped })
}

fn plan_level(
    graph: &ReferenceGraph,
    mapping: &ResolvedDtoMapping,
    base_alias: &str,
    soft: &Option<FilterPredicate>,
    ctx: &mut JoinContext,
    grouping: &mut Vec<GroupingLevel>,
    dropped: &mut Vec<PlanError>,
) {
    for field in &mapping.fields {
        match &field.binding {
            FieldBinding::DirectColumn { .. } | FieldBinding::EmbeddedColumn { .. } => {}
            // Embedded value objects live on the owner's row; nothing to join.
            FieldBinding::ValueObject { .. } => {}
            FieldBinding::ReferenceChain { hops, .. } => {
                plan_chain(graph, &field.name, hops, base_alias, soft, ctx, grouping, dropped);
            }
            FieldBinding::ChildCollection { child, mapping: nested } => {
                let child_node = graph.entity(*child);
                let Some(link) = child_node
                    .back_references
                    .iter()
                    .find(|edge| edge.target == mapping.entity)
                else {
                    let error = PlanError::MissingParentLink {
                        child: child_node.key(),
                        field: field.name.clone(),
                    };
                    warn!("{error}");
                    dropped.push(error);
                    continue;
                };
                let Some(table) = child_node.def.storage_table.clone() else {
                    let error = PlanError::MissingStorageTable {
                        entity: child_node.key(),
                    };
                    warn!("{error}");
                    dropped.push(error);
                    continue;
                };

                // Collections are never deduplicated: the alias embeds the
                // parent path, so each parent gets its own join.
                let alias = compose_alias(base_alias, &field.name);
                ctx.append(JoinNode {
                    alias: alias.clone(),
                    entity: *child,
                    table,
                    parent_alias: Some(base_alias.to_string()),
                    predicate: Some(JoinPredicate {
                        left_column: link.property.clone(),
                        right_column: ID_COLUMN.to_string(),
                    }),
                    cardinality: Cardinality::Many,
                    soft_delete: soft.clone(),
                });
                grouping.push(GroupingLevel {
                    alias: alias.clone(),
                    group_key: nested
                        .group_property
                        .clone()
                        .unwrap_or_else(|| ID_COLUMN.to_string()),
                    cardinality: Cardinality::Many,
                });
                plan_level(graph, nested, &alias, soft, ctx, grouping, dropped);
            }
        }
    }
}

/// Emit the joins one hop chain needs, reusing any prefix that is already
/// part of the plan. The chain is checked in full before anything is
/// emitted, so a failing hop never leaves half a chain behind.
#[allow(clippy::too_many_arguments)]
fn plan_chain(
    graph: &ReferenceGraph,
    field: &str,
    hops: &[ReferenceHop],
    base_alias: &str,
    soft: &Option<FilterPredicate>,
    ctx: &mut JoinContext,
    grouping: &mut Vec<GroupingLevel>,
    dropped: &mut Vec<PlanError>,
) {
    let mut parent = base_alias.to_string();
    let mut pending: Vec<(String, &ReferenceHop, String, String)> = Vec::new();
    for hop in hops {
        let alias = compose_alias(&parent, &hop.segment);
        let queued = pending.iter().any(|(a, ..)| a == &alias);
        if !ctx.contains(&alias) && !queued {
            match &graph.def(hop.target).storage_table {
                Some(table) => {
                    pending.push((alias.clone(), hop, table.clone(), parent.clone()));
                }
                None => {
                    let error = PlanError::UnjoinableHop {
                        field: field.to_string(),
                        segment: hop.segment.clone(),
                        entity: graph.entity(hop.target).key(),
                    };
                    warn!("{error}");
                    dropped.push(error);
                    return;
                }
            }
        }
        parent = alias;
    }

    for (alias, hop, table, parent) in pending {
        ctx.append(JoinNode {
            alias: alias.clone(),
            entity: hop.target,
            table,
            parent_alias: Some(parent),
            predicate: Some(JoinPredicate {
                left_column: ID_COLUMN.to_string(),
                right_column: hop.fk_column.clone(),
            }),
            cardinality: Cardinality::One,
            soft_delete: soft.clone(),
        });
        grouping.push(GroupingLevel {
            alias,
            group_key: ID_COLUMN.to_string(),
            cardinality: Cardinality::One,
        });
    }
}
