pub mod entity_classification;
pub mod errors;
pub mod reference_graph;
pub mod schema_model;
pub mod schema_validator;

// Re-export commonly used types
pub use errors::SchemaError;
pub use reference_graph::{
    EntityId, EntityNode, GraphBuildOutcome, ReferenceGraph, ReferenceGraphBuilder,
    ResolvedRefKind, ResolvedReference,
};
pub use schema_model::{
    EntityDef, EntityKey, EntityKind, EntityRef, PropertyDef, ReferenceKind, SchemaModel,
};
