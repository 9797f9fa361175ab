use thiserror::Error;

use crate::schema_catalog::EntityKey;

/// Join-planning failures. All soft except `InvalidPlan`: the offending
/// field is dropped and the rest of the plan still succeeds.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlanError {
    #[error("`{entity}` has no storage table to scan")]
    MissingStorageTable { entity: EntityKey },

    #[error("Child `{child}` has no parent back reference; collection `{field}` dropped")]
    MissingParentLink { child: EntityKey, field: String },

    #[error("Field `{field}`: hop `{segment}` reaches `{entity}`, which has no storage table; field dropped")]
    UnjoinableHop {
        field: String,
        segment: String,
        entity: EntityKey,
    },

    #[error("Plan ordering violated: {message}")]
    InvalidPlan { message: String },
}
