use thiserror::Error;

use crate::schema_catalog::EntityKey;

/// Soft failure: the field is reported, dropped from the projection, and
/// resolution of the remaining fields continues.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Unresolved field `{field}` on `{dto}` (bound to `{entity}`): {reason}")]
pub struct UnresolvedFieldError {
    pub dto: String,
    pub field: String,
    pub entity: EntityKey,
    pub reason: String,
}

/// Hard failures; only the root binding can produce one.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DtoResolverError {
    #[error("Unknown projection target `{target}` for DTO `{dto}`")]
    UnknownTarget { dto: String, target: String },
}
