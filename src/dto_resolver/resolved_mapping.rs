//! A DtoNode bound to the reference graph. This is what the join planner,
//! the materializer and the downstream emitter consume.

use serde::{Deserialize, Serialize};

use crate::schema_catalog::EntityId;

/// How one hop of a dotted path crosses tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HopKind {
    /// Joins `target.Id = source.fkColumn`.
    ForeignKey,
    /// Child-to-parent walk; joins `parent.Id = child.parentFkColumn`.
    ParentBackReference,
}

/// One resolved hop of a multi-segment path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceHop {
    /// Path segment as written in the source path. Alias building block.
    pub segment: String,
    /// Declaring property on the source entity.
    pub property: String,
    /// Column holding the referenced identity.
    pub fk_column: String,
    pub kind: HopKind,
    pub source: EntityId,
    pub target: EntityId,
    /// A nullable hop column means the joined row may be absent.
    pub nullable: bool,
}

/// Where a resolved field's value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldBinding {
    /// Column on the bound entity's own table.
    DirectColumn { column: String, nullable: bool },
    /// Value-object-local column. Same table as the owner; the physical
    /// column is the embed path joined with underscores.
    EmbeddedColumn { column: String, nullable: bool },
    /// Multi-hop path through outbound references; `column` is on the final
    /// hop's target (embedded leaves already folded in).
    ReferenceChain {
        hops: Vec<ReferenceHop>,
        column: String,
        nullable: bool,
    },
    /// Nested value-object mapping. No join, no grouping level.
    ValueObject {
        entity: EntityId,
        mapping: ResolvedDtoMapping,
    },
    /// Nested one-to-many child mapping. Cardinality "many".
    ChildCollection {
        child: EntityId,
        mapping: ResolvedDtoMapping,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedField {
    pub name: String,
    pub binding: FieldBinding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDtoMapping {
    pub name: String,
    pub entity: EntityId,
    pub fields: Vec<ResolvedField>,
    /// Overrides the identity column as the materializer's group key where
    /// identity is ambiguous after one-to-many fan-out.
    pub group_property: Option<String>,
}

impl ResolvedDtoMapping {
    /// Whether any field at this level fans out into a child collection.
    /// Collection-free mappings materialize row by row.
    pub fn has_collections(&self) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(f.binding, FieldBinding::ChildCollection { .. }))
    }
}
