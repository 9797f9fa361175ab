//! Passive schema definitions handed over by the external configuration
//! loader. Nothing here is resolved: references are raw `(domain, name)`
//! pairs and may be unqualified. Resolution happens in
//! [`reference_graph`](super::reference_graph).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of an entity within its consistency boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Top-level entity owning a consistency boundary and its children.
    AggregateRoot,
    /// Entity whose lifecycle is owned by an aggregate root, directly or
    /// transitively.
    ChildEntity,
    /// Entity with no independent identity or storage table, embedded into
    /// its owner's row.
    ValueObject,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::AggregateRoot => write!(f, "AggregateRoot"),
            EntityKind::ChildEntity => write!(f, "ChildEntity"),
            EntityKind::ValueObject => write!(f, "ValueObject"),
        }
    }
}

/// Raw reference to another entity, exactly as written in the schema.
///
/// An unqualified reference (`domain: None`) resolves against the declaring
/// entity's own domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(default)]
    pub domain: Option<String>,
    pub name: String,
}

impl EntityRef {
    /// Reference into the declaring entity's own domain.
    pub fn local(name: impl Into<String>) -> Self {
        EntityRef {
            domain: None,
            name: name.into(),
        }
    }

    /// Fully qualified cross-domain reference.
    pub fn qualified(domain: impl Into<String>, name: impl Into<String>) -> Self {
        EntityRef {
            domain: Some(domain.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.domain {
            Some(domain) => write!(f, "{}.{}", domain, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Resolved identity of an entity: the `(domain, name)` pair every lookup
/// keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub domain: String,
    pub name: String,
}

impl EntityKey {
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        EntityKey {
            domain: domain.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.name)
    }
}

/// What a property points at, if anything.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// Plain scalar column.
    #[default]
    None,
    /// Points at another entity's identity. Requires existence validation on
    /// write and join resolution on read.
    ForeignKey(EntityRef),
    /// Child-side column holding the owning parent's identity. Structural,
    /// not a data dependency.
    ParentBackReference(EntityRef),
    /// Embeds a value object into the owner's row. Never joins.
    ValueObjectEmbed(EntityRef),
}

impl ReferenceKind {
    pub fn target(&self) -> Option<&EntityRef> {
        match self {
            ReferenceKind::None => None,
            ReferenceKind::ForeignKey(target)
            | ReferenceKind::ParentBackReference(target)
            | ReferenceKind::ValueObjectEmbed(target) => Some(target),
        }
    }

    pub fn is_reference(&self) -> bool {
        !matches!(self, ReferenceKind::None)
    }
}

/// One declared property of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    /// Free-form scalar dtype string as the loader supplies it
    /// (e.g. "Int64", "String", "Decimal(18,2)").
    pub scalar_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub reference: ReferenceKind,
    /// True for an aggregate-held child collection. The property name is the
    /// navigation name the projection layer addresses; the element entity is
    /// the reference target.
    #[serde(default)]
    pub is_collection_navigation: bool,
}

impl PropertyDef {
    pub fn scalar(name: impl Into<String>, scalar_type: impl Into<String>) -> Self {
        PropertyDef {
            name: name.into(),
            scalar_type: scalar_type.into(),
            nullable: false,
            reference: ReferenceKind::None,
            is_collection_navigation: false,
        }
    }

    pub fn nullable_scalar(name: impl Into<String>, scalar_type: impl Into<String>) -> Self {
        PropertyDef {
            nullable: true,
            ..PropertyDef::scalar(name, scalar_type)
        }
    }

    pub fn foreign_key(
        name: impl Into<String>,
        scalar_type: impl Into<String>,
        target: EntityRef,
    ) -> Self {
        PropertyDef {
            reference: ReferenceKind::ForeignKey(target),
            ..PropertyDef::scalar(name, scalar_type)
        }
    }

    pub fn parent_back_reference(
        name: impl Into<String>,
        scalar_type: impl Into<String>,
        target: EntityRef,
    ) -> Self {
        PropertyDef {
            reference: ReferenceKind::ParentBackReference(target),
            ..PropertyDef::scalar(name, scalar_type)
        }
    }

    pub fn value_object(name: impl Into<String>, target: EntityRef) -> Self {
        PropertyDef {
            reference: ReferenceKind::ValueObjectEmbed(target),
            ..PropertyDef::scalar(name, "Embedded")
        }
    }

    pub fn child_collection(name: impl Into<String>, target: EntityRef) -> Self {
        PropertyDef {
            is_collection_navigation: true,
            reference: ReferenceKind::ForeignKey(target),
            ..PropertyDef::scalar(name, "Collection")
        }
    }
}

/// One declared entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    pub domain: String,
    pub name: String,
    pub kind: EntityKind,
    /// Absent for value objects, which share the owner's table.
    #[serde(default)]
    pub storage_table: Option<String>,
    /// Set for child entities; walking it repeatedly must terminate at an
    /// aggregate root.
    #[serde(default)]
    pub immediate_parent: Option<EntityRef>,
    pub properties: Vec<PropertyDef>,
    /// Explicit winner selection when two declarations share the same
    /// `(domain, name)` key. Highest value wins; a tie is a schema error.
    #[serde(default)]
    pub selection_priority: Option<i32>,
}

impl EntityDef {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.domain.clone(), self.name.clone())
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// The full model for one generation run, across one or more domains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    pub entities: Vec<EntityDef>,
}

impl SchemaModel {
    pub fn new(entities: Vec<EntityDef>) -> Self {
        SchemaModel { entities }
    }
}
