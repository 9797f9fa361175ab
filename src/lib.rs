//! Layergen - analysis and planning core for schema-driven code generation
//!
//! This crate provides the planning layer a layered-application code
//! generator runs before emitting any source text:
//! - Reference graph construction over entity schemas
//! - Projection ("DTO") resolution against that graph
//! - Foreign-key existence-check planning for aggregate writes
//! - Join-tree planning for aggregate and projection reads
//! - Materialization of flat row sets into nested instances
//!
//! It produces plans and mappings only: no queries are executed and no
//! database is touched. A downstream emitter consumes every output.

pub mod dto_resolver;
pub mod materializer;
pub mod query_planner;
pub mod schema_catalog;
pub mod write_planner;
