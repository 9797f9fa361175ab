//! Schema-level error types.
//!
//! A `SchemaError` is fatal for the affected entity's subtree only: the
//! builder quarantines the offender (and every child reached through it) and
//! the rest of the generation run continues.

use thiserror::Error;

use super::schema_model::EntityKey;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("Unknown reference target `{target}` on `{entity}`.`{property}`")]
    UnknownTarget {
        entity: EntityKey,
        property: String,
        target: String,
    },

    #[error("Parent `{parent}` of `{entity}` cannot be resolved")]
    UnresolvedParent { entity: EntityKey, parent: String },

    #[error("Parent chain of `{entity}` cycles back through `{via}`")]
    ParentCycle { entity: EntityKey, via: EntityKey },

    #[error("Parent chain of `{entity}` terminates at `{terminal}`, which is not an aggregate root")]
    ParentChainNotRooted { entity: EntityKey, terminal: EntityKey },

    #[error("Multiple declarations of `{key}` with no decisive selection priority")]
    AmbiguousEntity { key: EntityKey },

    #[error("Invalid entity `{entity}`: {message}")]
    InvalidEntity { entity: EntityKey, message: String },
}

impl SchemaError {
    /// Structural-validation error attributed to one entity.
    pub fn invalid_entity(entity: EntityKey, message: impl Into<String>) -> Self {
        SchemaError::InvalidEntity {
            entity,
            message: message.into(),
        }
    }

    /// The entity a quarantine decision is attributed to.
    pub fn entity(&self) -> &EntityKey {
        match self {
            SchemaError::UnknownTarget { entity, .. }
            | SchemaError::UnresolvedParent { entity, .. }
            | SchemaError::ParentCycle { entity, .. }
            | SchemaError::ParentChainNotRooted { entity, .. }
            | SchemaError::InvalidEntity { entity, .. } => entity,
            SchemaError::AmbiguousEntity { key } => key,
        }
    }
}
