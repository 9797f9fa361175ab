//! Entity classification helpers.
//!
//! Consolidates the kind/reference predicates used across the graph builder,
//! the projection resolver and the planners, so the checks are written once.

use super::schema_model::{EntityDef, EntityKind, PropertyDef, ReferenceKind};

/// Check if an entity owns a consistency boundary.
pub fn is_aggregate_root(entity: &EntityDef) -> bool {
    entity.kind == EntityKind::AggregateRoot
}

pub fn is_child_entity(entity: &EntityDef) -> bool {
    entity.kind == EntityKind::ChildEntity
}

pub fn is_value_object(entity: &EntityDef) -> bool {
    entity.kind == EntityKind::ValueObject
}

/// Whether the entity maps to its own storage table. Value objects never do;
/// they live in their owner's row.
pub fn has_independent_storage(entity: &EntityDef) -> bool {
    !is_value_object(entity)
}

/// The child-side property holding the owning parent's identity, if declared.
pub fn parent_link(entity: &EntityDef) -> Option<&PropertyDef> {
    entity
        .properties
        .iter()
        .find(|p| matches!(p.reference, ReferenceKind::ParentBackReference(_)))
}

/// Foreign-key properties, collection navigations excluded.
pub fn foreign_keys(entity: &EntityDef) -> impl Iterator<Item = &PropertyDef> {
    entity.properties.iter().filter(|p| {
        !p.is_collection_navigation && matches!(p.reference, ReferenceKind::ForeignKey(_))
    })
}

/// Value-object embed properties.
pub fn embeds(entity: &EntityDef) -> impl Iterator<Item = &PropertyDef> {
    entity
        .properties
        .iter()
        .filter(|p| matches!(p.reference, ReferenceKind::ValueObjectEmbed(_)))
}

/// Aggregate-held child-collection navigations.
pub fn collection_navigations(entity: &EntityDef) -> impl Iterator<Item = &PropertyDef> {
    entity
        .properties
        .iter()
        .filter(|p| p.is_collection_navigation)
}
