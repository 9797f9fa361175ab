//! Binds application-facing projection shapes to the reference graph.
//!
//! Resolution is soft: a field that cannot be bound is reported and dropped,
//! and the rest of the projection still resolves. Only an unknown root
//! target aborts the use case.

use log::warn;

use crate::schema_catalog::{
    EntityId, EntityKind, ReferenceGraph, ReferenceKind, ResolvedRefKind,
};

pub mod binding_policy;
pub mod dto_spec;
pub mod errors;
pub mod resolved_mapping;

pub use dto_spec::{DtoField, DtoNode};
pub use errors::{DtoResolverError, UnresolvedFieldError};
pub use resolved_mapping::{
    FieldBinding, HopKind, ReferenceHop, ResolvedDtoMapping, ResolvedField,
};

use binding_policy::HopResolution;

/// A resolved mapping plus every field that had to be dropped along the way.
#[derive(Debug)]
pub struct ResolutionOutcome {
    pub mapping: ResolvedDtoMapping,
    pub dropped: Vec<UnresolvedFieldError>,
}

/// Resolve one use case's DtoNode tree against the graph. `domain` is the
/// use case's home domain; unqualified targets resolve against it.
pub fn resolve_projection(
    graph: &ReferenceGraph,
    domain: &str,
    dto: &DtoNode,
) -> Result<ResolutionOutcome, DtoResolverError> {
    let entity = graph
        .resolve_ref(domain, &dto.target)
        .ok_or_else(|| DtoResolverError::UnknownTarget {
            dto: dto.name.clone(),
            target: dto.target.to_string(),
        })?;

    let mut dropped = Vec::new();
    let mapping = resolve_node(graph, dto, entity, &mut dropped);
    Ok(ResolutionOutcome { mapping, dropped })
}

fn resolve_node(
    graph: &ReferenceGraph,
    dto: &DtoNode,
    entity: EntityId,
    dropped: &mut Vec<UnresolvedFieldError>,
) -> ResolvedDtoMapping {
    let mut fields = Vec::with_capacity(dto.fields.len());
    for field in &dto.fields {
        match resolve_field(graph, dto, entity, field, dropped) {
            Ok(resolved) => fields.push(resolved),
            Err(reason) => drop_field(dto, entity, field.name(), reason, graph, dropped),
        }
    }
    ResolvedDtoMapping {
        name: dto.name.clone(),
        entity,
        fields,
        group_property: dto.group_key.clone(),
    }
}

fn drop_field(
    dto: &DtoNode,
    entity: EntityId,
    field: &str,
    reason: String,
    graph: &ReferenceGraph,
    dropped: &mut Vec<UnresolvedFieldError>,
) {
    let error = UnresolvedFieldError {
        dto: dto.name.clone(),
        field: field.to_string(),
        entity: graph.entity(entity).key(),
        reason,
    };
    warn!("{error}");
    dropped.push(error);
}

fn resolve_field(
    graph: &ReferenceGraph,
    dto: &DtoNode,
    entity: EntityId,
    field: &DtoField,
    dropped: &mut Vec<UnresolvedFieldError>,
) -> Result<ResolvedField, String> {
    match field {
        DtoField::Scalar { name, source } => {
            let binding = resolve_scalar_path(graph, entity, source)?;
            Ok(ResolvedField {
                name: name.clone(),
                binding,
            })
        }
        DtoField::ValueObject { name, node } => {
            let owner = graph.entity(entity);
            let target = graph
                .resolve_ref(&owner.def.domain, &node.target)
                .ok_or_else(|| format!("unknown value object `{}`", node.target))?;
            if graph.def(target).kind != EntityKind::ValueObject {
                return Err(format!("`{}` is not a value object", node.target));
            }
            let edge = binding_policy::select_embed_property(owner, name, target)
                .ok_or_else(|| format!("no embed property for `{}` on `{}`", node.target, owner.key()))?;
            let prefix = vec![edge.property.clone()];
            let mapping = resolve_embedded_node(graph, node, target, &prefix, dropped);
            Ok(ResolvedField {
                name: name.clone(),
                binding: FieldBinding::ValueObject {
                    entity: target,
                    mapping,
                },
            })
        }
        DtoField::ChildCollection { name, node } => {
            let owner = graph.entity(entity);
            let child = graph
                .resolve_ref(&owner.def.domain, &node.target)
                .ok_or_else(|| format!("unknown child entity `{}`", node.target))?;
            if !owner.children.contains(&child) {
                return Err(format!(
                    "`{}` is not a child of `{}`",
                    node.target,
                    owner.key()
                ));
            }
            let mapping = resolve_node(graph, node, child, dropped);
            Ok(ResolvedField {
                name: name.clone(),
                binding: FieldBinding::ChildCollection { child, mapping },
            })
        }
    }
}

/// Fields of an embedded value object resolve against the value-object
/// entity but bind to columns on the owner's table, carrying the embed path
/// as a column prefix. Embeds nest; anything that would leave the owner's
/// row is unsupported here and drops the field.
fn resolve_embedded_node(
    graph: &ReferenceGraph,
    dto: &DtoNode,
    entity: EntityId,
    prefix: &[String],
    dropped: &mut Vec<UnresolvedFieldError>,
) -> ResolvedDtoMapping {
    let mut fields = Vec::with_capacity(dto.fields.len());
    for field in &dto.fields {
        let result = match field {
            DtoField::Scalar { name, source } => {
                if source.contains('.') {
                    Err("dotted paths are unsupported inside a value object".to_string())
                } else {
                    match graph.def(entity).property(source) {
                        Some(prop) if !prop.reference.is_reference() => Ok(ResolvedField {
                            name: name.clone(),
                            binding: FieldBinding::EmbeddedColumn {
                                column: binding_policy::physical_column(prefix, &prop.name),
                                nullable: prop.nullable,
                            },
                        }),
                        Some(_) => Err(format!("`{source}` is not a scalar property")),
                        None => Err(format!(
                            "no property `{source}` on `{}`",
                            graph.entity(entity).key()
                        )),
                    }
                }
            }
            DtoField::ValueObject { name, node } => {
                resolve_nested_embed(graph, entity, name, node, prefix, dropped)
            }
            DtoField::ChildCollection { .. } => {
                Err("a value object cannot hold a child collection".to_string())
            }
        };
        match result {
            Ok(resolved) => fields.push(resolved),
            Err(reason) => drop_field(dto, entity, field.name(), reason, graph, dropped),
        }
    }
    ResolvedDtoMapping {
        name: dto.name.clone(),
        entity,
        fields,
        group_property: None,
    }
}

fn resolve_nested_embed(
    graph: &ReferenceGraph,
    entity: EntityId,
    field_name: &str,
    node: &DtoNode,
    prefix: &[String],
    dropped: &mut Vec<UnresolvedFieldError>,
) -> Result<ResolvedField, String> {
    let owner = graph.entity(entity);
    let target = graph
        .resolve_ref(&owner.def.domain, &node.target)
        .ok_or_else(|| format!("unknown value object `{}`", node.target))?;
    let edge = binding_policy::select_embed_property(owner, field_name, target)
        .ok_or_else(|| format!("no embed property for `{}` on `{}`", node.target, owner.key()))?;
    let mut nested_prefix = prefix.to_vec();
    nested_prefix.push(edge.property.clone());
    let mapping = resolve_embedded_node(graph, node, target, &nested_prefix, dropped);
    Ok(ResolvedField {
        name: field_name.to_string(),
        binding: FieldBinding::ValueObject {
            entity: target,
            mapping,
        },
    })
}

/// Walk a dotted source path from the bound entity. Each non-final segment
/// must cross a reference (join hop) or step into an embed (column prefix);
/// the final segment must land on a scalar property.
fn resolve_scalar_path(
    graph: &ReferenceGraph,
    entity: EntityId,
    source: &str,
) -> Result<FieldBinding, String> {
    let segments: Vec<&str> = source.split('.').collect();
    let mut current = entity;
    let mut hops: Vec<ReferenceHop> = Vec::new();
    let mut embed_prefix: Vec<String> = Vec::new();

    for (index, segment) in segments.iter().copied().enumerate() {
        let node = graph.entity(current);
        let last = index + 1 == segments.len();

        if last {
            let prop = node
                .def
                .property(segment)
                .ok_or_else(|| format!("no property `{segment}` on `{}`", node.key()))?;
            if prop.is_collection_navigation
                || matches!(prop.reference, ReferenceKind::ValueObjectEmbed(_))
            {
                return Err(format!("`{segment}` is not a scalar property"));
            }
            let column = binding_policy::physical_column(&embed_prefix, &prop.name);
            let nullable = prop.nullable || hops.iter().any(|h| h.nullable);
            return Ok(if hops.is_empty() {
                if embed_prefix.is_empty() {
                    FieldBinding::DirectColumn { column, nullable }
                } else {
                    FieldBinding::EmbeddedColumn { column, nullable }
                }
            } else {
                FieldBinding::ReferenceChain {
                    hops,
                    column,
                    nullable,
                }
            });
        }

        match binding_policy::match_hop(graph, node, segment) {
            HopResolution::Embed(edge) => {
                embed_prefix.push(edge.property.clone());
                current = edge.target;
            }
            HopResolution::Edge(edge) => {
                let Some(prop) = graph.def(edge.source).property(&edge.property) else {
                    return Err(format!(
                        "reference property `{}` is not declared on `{}`",
                        edge.property,
                        graph.entity(edge.source).key()
                    ));
                };
                let kind = match edge.kind {
                    ResolvedRefKind::ForeignKey => HopKind::ForeignKey,
                    ResolvedRefKind::ParentBackReference => HopKind::ParentBackReference,
                    other => return Err(format!("hop `{segment}` has unjoinable kind {other:?}")),
                };
                hops.push(ReferenceHop {
                    segment: segment.to_string(),
                    property: edge.property.clone(),
                    fk_column: binding_policy::physical_column(&embed_prefix, &prop.name),
                    kind,
                    source: current,
                    target: edge.target,
                    nullable: prop.nullable,
                });
                embed_prefix.clear();
                current = edge.target;
            }
            HopResolution::Ambiguous => {
                return Err(format!(
                    "segment `{segment}` matches more than one reference on `{}`",
                    node.key()
                ));
            }
            HopResolution::NotFound => {
                return Err(format!(
                    "segment `{segment}` matches no reference on `{}`",
                    node.key()
                ));
            }
        }
    }
    unreachable!("split always yields at least one segment")
}
