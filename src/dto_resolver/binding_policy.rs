//! Explicit, named binding policies.
//!
//! Ambiguity is never resolved by incidental iteration order: each tie-break
//! below is a documented rule with its own tests.

use crate::schema_catalog::{EntityId, EntityNode, ReferenceGraph, ResolvedReference};

/// Outcome of matching one path segment against an entity's references.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HopResolution<'a> {
    /// Crosses into another table (foreign key or parent back reference).
    Edge(&'a ResolvedReference),
    /// Steps into an embedded value object; same table, no join.
    Embed(&'a ResolvedReference),
    /// More than one reference targets an entity named like the segment.
    Ambiguous,
    NotFound,
}

/// Match one dotted-path segment against an entity's outbound references.
///
/// Preference order:
/// 1. embed property with the exact segment name,
/// 2. reference property with the exact segment name,
/// 3. reference property whose name is the segment plus an `Id` suffix,
/// 4. the single reference whose target entity carries the segment name.
///
/// Two references targeting an entity of that name is `Ambiguous`, never a
/// silent first-wins pick.
pub fn match_hop<'a>(
    graph: &ReferenceGraph,
    node: &'a EntityNode,
    segment: &str,
) -> HopResolution<'a> {
    if let Some(edge) = node.embeds.iter().find(|e| e.property == segment) {
        return HopResolution::Embed(edge);
    }

    let edges = || node.outbound.iter().chain(node.back_references.iter());

    if let Some(edge) = edges().find(|e| e.property == segment) {
        return HopResolution::Edge(edge);
    }
    if let Some(edge) = edges().find(|e| e.property.strip_suffix("Id") == Some(segment)) {
        return HopResolution::Edge(edge);
    }

    let by_target: Vec<&ResolvedReference> = edges()
        .filter(|e| graph.def(e.target).name == segment)
        .collect();
    match by_target.as_slice() {
        [single] => HopResolution::Edge(single),
        [] => HopResolution::NotFound,
        _ => HopResolution::Ambiguous,
    }
}

/// Pick the embed property a value-object field binds through: exact
/// field-name match first, else the first declared property with the
/// matching target, in schema order.
pub fn select_embed_property<'a>(
    node: &'a EntityNode,
    field_name: &str,
    target: EntityId,
) -> Option<&'a ResolvedReference> {
    let mut candidates = node.embeds.iter().filter(|e| e.target == target);
    let first = candidates.next()?;
    if first.property == field_name {
        return Some(first);
    }
    candidates
        .find(|e| e.property == field_name)
        .or(Some(first))
}

/// Physical column of a (possibly embedded) property: embed path segments
/// joined with underscores, leaf last. `["Address"], "City"` -> "Address_City".
pub fn physical_column(embed_path: &[String], leaf: &str) -> String {
    if embed_path.is_empty() {
        leaf.to_string()
    } else {
        format!("{}_{}", embed_path.join("_"), leaf)
    }
}
