//! The resolved, cross-referenced view of the schema model.
//!
//! Entities live in a flat indexed table and every resolved reference
//! (parent, foreign key, embed, collection) is an index into that table, so
//! dangling references cannot exist after build and cycle detection is a
//! bounded visited-set walk.
//!
//! The graph is built once per generation run and is read-only afterwards,
//! which makes it safe to share across planning calls for different use
//! cases. Entities whose declarations cannot be resolved are quarantined
//! together with their child subtree; the rest of the run continues.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::entity_classification as classify;
use super::errors::SchemaError;
use super::schema_model::{EntityDef, EntityKey, EntityKind, EntityRef, ReferenceKind, SchemaModel};
use super::schema_validator;

/// Index of an entity in the graph's flat table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Kind of a resolved reference edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedRefKind {
    ForeignKey,
    ParentBackReference,
    ValueObjectEmbed,
    ChildCollection,
}

/// One resolved edge between two entities in the flat table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub source: EntityId,
    pub target: EntityId,
    /// Name of the declaring property on the source entity.
    pub property: String,
    pub kind: ResolvedRefKind,
}

/// Per-entity resolved state.
#[derive(Debug, Clone)]
pub struct EntityNode {
    pub def: EntityDef,
    pub immediate_parent: Option<EntityId>,
    /// Entities whose `immediate_parent` resolves to this entity.
    pub children: Vec<EntityId>,
    /// ForeignKey edges out of this entity. Collection navigations and value
    /// objects are tracked separately.
    pub outbound: Vec<ResolvedReference>,
    /// ValueObjectEmbed edges. Same table, never joined.
    pub embeds: Vec<ResolvedReference>,
    /// ParentBackReference edges. Structural, not a data dependency.
    pub back_references: Vec<ResolvedReference>,
    /// Aggregate-held child-collection navigations.
    pub collections: Vec<ResolvedReference>,
    /// Inverse of `outbound`, excluding edges sourced from value objects.
    /// Used for delete-guard checks.
    pub inbound: Vec<ResolvedReference>,
    /// Terminal of the `immediate_parent` walk. The entity itself for an
    /// aggregate root, `None` for a value object.
    pub top_level_aggregate: Option<EntityId>,
}

impl EntityNode {
    pub fn key(&self) -> EntityKey {
        self.def.key()
    }
}

/// Result of a graph build: the usable graph plus every quarantine decision
/// taken along the way.
#[derive(Debug)]
pub struct GraphBuildOutcome {
    pub graph: ReferenceGraph,
    pub errors: Vec<SchemaError>,
}

#[derive(Debug)]
pub struct ReferenceGraph {
    nodes: Vec<EntityNode>,
    by_key: HashMap<EntityKey, EntityId>,
}

impl ReferenceGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn entity(&self, id: EntityId) -> &EntityNode {
        &self.nodes[id.0]
    }

    pub fn def(&self, id: EntityId) -> &EntityDef {
        &self.nodes[id.0].def
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &EntityNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (EntityId(i), node))
    }

    /// Look an entity up by its resolved `(domain, name)` identity.
    pub fn lookup(&self, domain: &str, name: &str) -> Option<EntityId> {
        self.by_key
            .get(&EntityKey::new(domain, name))
            .copied()
    }

    /// Resolve a raw reference as written on an entity in `from_domain`.
    /// Unqualified references default to the declaring domain.
    pub fn resolve_ref(&self, from_domain: &str, reference: &EntityRef) -> Option<EntityId> {
        let domain = reference.domain.as_deref().unwrap_or(from_domain);
        self.lookup(domain, &reference.name)
    }

    /// Memoized at build time; a bounded walk, never a recomputation.
    pub fn top_level_aggregate(&self, id: EntityId) -> Option<EntityId> {
        self.nodes[id.0].top_level_aggregate
    }

    /// The aggregate root plus every transitive child, in breadth-first
    /// declaration order. Root itself is first.
    pub fn aggregate_members(&self, root: EntityId) -> Vec<EntityId> {
        let mut members = vec![root];
        let mut cursor = 0;
        while cursor < members.len() {
            let current = members[cursor];
            members.extend(self.nodes[current.0].children.iter().copied());
            cursor += 1;
        }
        members
    }

    /// Inbound foreign-key references held by entities outside this entity's
    /// own aggregate. These are the references a generated delete must check
    /// before removing a row.
    pub fn delete_guards(&self, id: EntityId) -> Vec<&ResolvedReference> {
        let own_aggregate = self.nodes[id.0].top_level_aggregate;
        self.nodes[id.0]
            .inbound
            .iter()
            .filter(|edge| {
                own_aggregate.is_none()
                    || self.nodes[edge.source.0].top_level_aggregate != own_aggregate
            })
            .collect()
    }
}

pub struct ReferenceGraphBuilder {
    model: SchemaModel,
}

impl ReferenceGraphBuilder {
    pub fn new(model: SchemaModel) -> Self {
        ReferenceGraphBuilder { model }
    }

    /// Build the graph. Never fails as a whole: unresolvable entities are
    /// quarantined with their subtree and reported in the outcome.
    pub fn build(self) -> GraphBuildOutcome {
        let mut errors = Vec::new();

        let winners = select_declarations(self.model.entities, &mut errors);
        let winners = drop_invalid(winners, &mut errors);

        let mut by_key: HashMap<EntityKey, usize> = HashMap::new();
        for (index, def) in winners.iter().enumerate() {
            by_key.insert(def.key(), index);
        }

        let resolver = RawResolver { by_key: &by_key };

        let mut bad: HashSet<usize> = HashSet::new();
        let mut resolved: Vec<RawNode> = Vec::with_capacity(winners.len());
        for (index, def) in winners.iter().enumerate() {
            match resolver.resolve_entity(def) {
                Ok(node) => resolved.push(node),
                Err(error) => {
                    warn!("quarantining `{}`: {}", def.key(), error);
                    errors.push(error);
                    bad.insert(index);
                    resolved.push(RawNode::unresolved());
                }
            }
        }

        resolve_aggregates(&winners, &mut resolved, &mut bad, &mut errors);
        quarantine_subtrees(&resolved, &mut bad);
        quarantine_dangling_sources(&winners, &resolved, &mut bad, &mut errors);
        quarantine_subtrees(&resolved, &mut bad);

        let graph = compact(winners, resolved, &bad);
        debug!(
            "reference graph built: {} entities, {} quarantined",
            graph.len(),
            errors.len()
        );
        GraphBuildOutcome { graph, errors }
    }
}

/// Apply the explicit duplicate-key selection policy: the declaration with
/// the highest `selection_priority` wins; a tie (including both priorities
/// absent) quarantines the key entirely. Declaration order never decides.
fn select_declarations(entities: Vec<EntityDef>, errors: &mut Vec<SchemaError>) -> Vec<EntityDef> {
    let mut order: Vec<EntityKey> = Vec::new();
    let mut claims: HashMap<EntityKey, Vec<EntityDef>> = HashMap::new();
    for def in entities {
        let key = def.key();
        if !claims.contains_key(&key) {
            order.push(key.clone());
        }
        claims.entry(key).or_default().push(def);
    }

    let mut winners = Vec::new();
    for key in order {
        let candidates = claims.remove(&key).unwrap();
        if candidates.len() == 1 {
            winners.extend(candidates);
            continue;
        }
        let best = candidates
            .iter()
            .filter_map(|c| c.selection_priority)
            .max();
        let mut at_best: Vec<EntityDef> = match best {
            Some(priority) => candidates
                .into_iter()
                .filter(|c| c.selection_priority == Some(priority))
                .collect(),
            // No candidate carries a priority at all.
            None => candidates,
        };
        if at_best.len() == 1 {
            winners.push(at_best.pop().unwrap());
        } else {
            warn!("ambiguous declarations for `{key}`, quarantining all of them");
            errors.push(SchemaError::AmbiguousEntity { key });
        }
    }
    winners
}

fn drop_invalid(entities: Vec<EntityDef>, errors: &mut Vec<SchemaError>) -> Vec<EntityDef> {
    let violations = schema_validator::validate_model(&entities);
    if violations.is_empty() {
        return entities;
    }
    let offenders: HashSet<EntityKey> = violations.iter().map(|e| e.entity().clone()).collect();
    errors.extend(violations);
    entities
        .into_iter()
        .filter(|def| !offenders.contains(&def.key()))
        .collect()
}

/// Pre-compaction node: indices are positions in the winners list.
#[derive(Debug, Default)]
struct RawNode {
    parent: Option<usize>,
    outbound: Vec<(usize, String)>,
    embeds: Vec<(usize, String)>,
    back_references: Vec<(usize, String)>,
    collections: Vec<(usize, String)>,
    aggregate: Option<usize>,
}

impl RawNode {
    fn unresolved() -> Self {
        RawNode::default()
    }
}

struct RawResolver<'a> {
    by_key: &'a HashMap<EntityKey, usize>,
}

impl RawResolver<'_> {
    fn resolve_target(&self, from_domain: &str, reference: &EntityRef) -> Option<usize> {
        let domain = reference.domain.as_deref().unwrap_or(from_domain);
        self.by_key.get(&EntityKey::new(domain, reference.name.clone())).copied()
    }

    fn resolve_entity(&self, def: &EntityDef) -> Result<RawNode, SchemaError> {
        let mut node = RawNode::default();

        if let Some(parent_ref) = &def.immediate_parent {
            node.parent = Some(self.resolve_target(&def.domain, parent_ref).ok_or_else(|| {
                SchemaError::UnresolvedParent {
                    entity: def.key(),
                    parent: parent_ref.to_string(),
                }
            })?);
        }

        for property in &def.properties {
            let Some(target_ref) = property.reference.target() else {
                continue;
            };
            let target = self.resolve_target(&def.domain, target_ref).ok_or_else(|| {
                SchemaError::UnknownTarget {
                    entity: def.key(),
                    property: property.name.clone(),
                    target: target_ref.to_string(),
                }
            })?;
            let edge = (target, property.name.clone());
            if property.is_collection_navigation {
                node.collections.push(edge);
                continue;
            }
            match &property.reference {
                ReferenceKind::ForeignKey(_) => node.outbound.push(edge),
                ReferenceKind::ParentBackReference(_) => node.back_references.push(edge),
                ReferenceKind::ValueObjectEmbed(_) => node.embeds.push(edge),
                ReferenceKind::None => unreachable!("target() returned Some for None"),
            }
        }
        Ok(node)
    }
}

/// Walk every parent chain with a visited set, memoizing the terminal
/// aggregate. Cycles and chains that end anywhere but an aggregate root
/// quarantine the entity.
fn resolve_aggregates(
    defs: &[EntityDef],
    resolved: &mut [RawNode],
    bad: &mut HashSet<usize>,
    errors: &mut Vec<SchemaError>,
) {
    for start in 0..defs.len() {
        if bad.contains(&start) || resolved[start].aggregate.is_some() {
            continue;
        }
        match defs[start].kind {
            EntityKind::ValueObject => continue,
            EntityKind::AggregateRoot => {
                resolved[start].aggregate = Some(start);
                continue;
            }
            EntityKind::ChildEntity => {}
        }

        let mut visited: Vec<usize> = vec![start];
        let mut seen: HashSet<usize> = HashSet::from([start]);
        let terminal = loop {
            let current = *visited.last().unwrap();
            if let Some(aggregate) = resolved[current].aggregate {
                break Ok(aggregate);
            }
            if defs[current].kind == EntityKind::AggregateRoot {
                break Ok(current);
            }
            match resolved[current].parent {
                Some(parent) if seen.contains(&parent) => {
                    break Err(SchemaError::ParentCycle {
                        entity: defs[start].key(),
                        via: defs[parent].key(),
                    });
                }
                Some(parent) if bad.contains(&parent) => {
                    break Err(SchemaError::UnresolvedParent {
                        entity: defs[current].key(),
                        parent: defs[parent].key().to_string(),
                    });
                }
                Some(parent) => {
                    seen.insert(parent);
                    visited.push(parent);
                }
                None => {
                    break Err(SchemaError::ParentChainNotRooted {
                        entity: defs[start].key(),
                        terminal: defs[current].key(),
                    });
                }
            }
        };

        match terminal {
            Ok(aggregate) => {
                for index in visited {
                    resolved[index].aggregate = Some(aggregate);
                }
            }
            Err(error) => {
                warn!("quarantining parent chain of `{}`: {}", defs[start].key(), error);
                errors.push(error);
                bad.extend(visited);
            }
        }
    }
}

/// Quarantine is subtree-scoped: every entity whose parent chain passes
/// through a quarantined entity goes too.
fn quarantine_subtrees(resolved: &[RawNode], bad: &mut HashSet<usize>) {
    loop {
        let mut grew = false;
        for (index, node) in resolved.iter().enumerate() {
            if bad.contains(&index) {
                continue;
            }
            if let Some(parent) = node.parent {
                if bad.contains(&parent) {
                    bad.insert(index);
                    grew = true;
                }
            }
        }
        if !grew {
            break;
        }
    }
}

/// An edge into a quarantined target leaves its source with a dangling
/// reference, so the source is quarantined as well.
fn quarantine_dangling_sources(
    defs: &[EntityDef],
    resolved: &[RawNode],
    bad: &mut HashSet<usize>,
    errors: &mut Vec<SchemaError>,
) {
    loop {
        let mut grew = false;
        for (index, node) in resolved.iter().enumerate() {
            if bad.contains(&index) {
                continue;
            }
            let edges = node
                .outbound
                .iter()
                .chain(&node.embeds)
                .chain(&node.back_references)
                .chain(&node.collections);
            for (target, property) in edges {
                if bad.contains(target) {
                    errors.push(SchemaError::UnknownTarget {
                        entity: defs[index].key(),
                        property: property.clone(),
                        target: defs[*target].key().to_string(),
                    });
                    bad.insert(index);
                    grew = true;
                    break;
                }
            }
        }
        if !grew {
            break;
        }
    }
}

/// Drop quarantined entities and renumber everything into the final
/// contiguous table.
fn compact(defs: Vec<EntityDef>, resolved: Vec<RawNode>, bad: &HashSet<usize>) -> ReferenceGraph {
    let mut remap: HashMap<usize, EntityId> = HashMap::new();
    let mut survivors: Vec<(EntityDef, RawNode)> = Vec::new();
    for (index, (def, node)) in defs.into_iter().zip(resolved).enumerate() {
        if !bad.contains(&index) {
            remap.insert(index, EntityId(survivors.len()));
            survivors.push((def, node));
        }
    }

    let remap_edges = |source: EntityId, edges: &[(usize, String)], kind: ResolvedRefKind| {
        edges
            .iter()
            .map(|(target, property)| ResolvedReference {
                source,
                target: remap[target],
                property: property.clone(),
                kind,
            })
            .collect::<Vec<_>>()
    };

    let mut nodes: Vec<EntityNode> = Vec::with_capacity(survivors.len());
    let mut by_key: HashMap<EntityKey, EntityId> = HashMap::new();
    for (index, (def, raw)) in survivors.iter().enumerate() {
        let id = EntityId(index);
        by_key.insert(def.key(), id);
        nodes.push(EntityNode {
            def: def.clone(),
            immediate_parent: raw.parent.map(|p| remap[&p]),
            children: Vec::new(),
            outbound: remap_edges(id, &raw.outbound, ResolvedRefKind::ForeignKey),
            embeds: remap_edges(id, &raw.embeds, ResolvedRefKind::ValueObjectEmbed),
            back_references: remap_edges(id, &raw.back_references, ResolvedRefKind::ParentBackReference),
            collections: remap_edges(id, &raw.collections, ResolvedRefKind::ChildCollection),
            inbound: Vec::new(),
            top_level_aggregate: raw.aggregate.map(|a| remap[&a]),
        });
    }

    // Children in declaration order of the child, inverse of immediate_parent.
    for index in 0..nodes.len() {
        if let Some(parent) = nodes[index].immediate_parent {
            nodes[parent.index()].children.push(EntityId(index));
        }
    }

    // Inbound excludes value-object sources; back references never made it
    // into `outbound` in the first place.
    for index in 0..nodes.len() {
        if classify::is_value_object(&nodes[index].def) {
            continue;
        }
        for edge in nodes[index].outbound.clone() {
            nodes[edge.target.index()].inbound.push(edge);
        }
    }

    ReferenceGraph { nodes, by_key }
}
