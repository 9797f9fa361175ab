//! Structural validation of the raw schema model, before reference
//! resolution. Violations quarantine the offending entity exactly like a
//! resolution failure; the run keeps going.

use std::collections::HashSet;

use log::warn;

use super::entity_classification as classify;
use super::errors::SchemaError;
use super::schema_model::{EntityDef, EntityKind};

/// Validate every entity, collecting all violations instead of stopping at
/// the first.
pub fn validate_model(entities: &[EntityDef]) -> Vec<SchemaError> {
    let mut errors = Vec::new();
    for entity in entities {
        validate_entity(entity, &mut errors);
    }
    for error in &errors {
        warn!("schema validation: {error}");
    }
    errors
}

fn validate_entity(entity: &EntityDef, errors: &mut Vec<SchemaError>) {
    let mut seen: HashSet<&str> = HashSet::new();
    for property in &entity.properties {
        if !seen.insert(property.name.as_str()) {
            errors.push(SchemaError::invalid_entity(
                entity.key(),
                format!("duplicate property `{}`", property.name),
            ));
        }
    }

    match entity.kind {
        EntityKind::AggregateRoot => {
            if entity.storage_table.is_none() {
                errors.push(SchemaError::invalid_entity(
                    entity.key(),
                    "aggregate root without a storage table",
                ));
            }
            if entity.immediate_parent.is_some() {
                errors.push(SchemaError::invalid_entity(
                    entity.key(),
                    "aggregate root declares an immediate parent",
                ));
            }
        }
        EntityKind::ChildEntity => {
            if entity.storage_table.is_none() {
                errors.push(SchemaError::invalid_entity(
                    entity.key(),
                    "child entity without a storage table",
                ));
            }
            if entity.immediate_parent.is_none() {
                errors.push(SchemaError::invalid_entity(
                    entity.key(),
                    "child entity without an immediate parent",
                ));
            }
        }
        EntityKind::ValueObject => {
            if entity.storage_table.is_some() {
                errors.push(SchemaError::invalid_entity(
                    entity.key(),
                    "value object declares a storage table",
                ));
            }
            if entity.immediate_parent.is_some() {
                errors.push(SchemaError::invalid_entity(
                    entity.key(),
                    "value object declares an immediate parent",
                ));
            }
            if classify::collection_navigations(entity).next().is_some() {
                errors.push(SchemaError::invalid_entity(
                    entity.key(),
                    "value object declares a child collection",
                ));
            }
        }
    }
}
