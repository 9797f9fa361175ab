//! Projection ("DTO") specs as the use-case configuration declares them.
//! Unresolved: targets are raw entity references, scalar sources are dotted
//! paths. Binding happens in [`super::resolve_projection`].

use serde::{Deserialize, Serialize};

use crate::schema_catalog::EntityRef;

/// One projection shape for one use case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DtoNode {
    pub name: String,
    /// Root nodes may target any entity; nested collection nodes target a
    /// child entity; nested value-object nodes target the embedded entity.
    pub target: EntityRef,
    pub fields: Vec<DtoField>,
    /// Overrides the identity column as the materializer's group key where
    /// identity is ambiguous after one-to-many fan-out.
    #[serde(default)]
    pub group_key: Option<String>,
}

impl DtoNode {
    pub fn new(name: impl Into<String>, target: EntityRef, fields: Vec<DtoField>) -> Self {
        DtoNode {
            name: name.into(),
            target,
            fields,
            group_key: None,
        }
    }
}

/// One requested field of a projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DtoField {
    /// Scalar bound through a dotted source path ("Amount",
    /// "Customer.Name", "Customer.Region.Code").
    Scalar { name: String, source: String },
    /// Embedded value object. Never joins; columns live on the owner's row.
    ValueObject { name: String, node: DtoNode },
    /// Nested one-to-many projection over an aggregate-held child entity.
    ChildCollection { name: String, node: DtoNode },
}

impl DtoField {
    /// Scalar field named after the last path segment, the common case.
    pub fn scalar(source: impl Into<String>) -> Self {
        let source = source.into();
        let name = source.rsplit('.').next().unwrap_or(&source).to_string();
        DtoField::Scalar { name, source }
    }

    pub fn name(&self) -> &str {
        match self {
            DtoField::Scalar { name, .. }
            | DtoField::ValueObject { name, .. }
            | DtoField::ChildCollection { name, .. } => name,
        }
    }
}
