//! Folds the flat joined row set back into nested projection instances.
//!
//! A pure function of its inputs: identical row sets produce structurally
//! identical output. Levels are processed outer to inner; every level
//! re-groups and takes the first row per group, which collapses the
//! duplication unrelated one-to-many joins introduce on the same parent.
//!
//! Rows are column-to-value maps keyed `{alias}_{column}`; output objects
//! keep DTO field declaration order (`serde_json` with `preserve_order`).

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::dto_resolver::{FieldBinding, ReferenceHop, ResolvedDtoMapping};
use crate::query_planner::{join_context::compose_alias, row_key, QueryPlan, ID_COLUMN};

pub mod errors;

pub use errors::MaterializeError;

/// One flat joined row as the emitter's data access hands it over.
pub type Row = Map<String, Value>;

/// Materialize `rows` into one nested instance per distinct root identity.
///
/// With an empty grouping spec (scalar-only projection) every input row
/// becomes exactly one output object and no grouping happens at all.
pub fn materialize(
    plan: &QueryPlan,
    mapping: &ResolvedDtoMapping,
    rows: &[Row],
) -> Result<Vec<Value>, MaterializeError> {
    let context = MaterializeContext::new(plan);
    let row_refs: Vec<&Row> = rows.iter().collect();

    if plan.grouping.is_empty() {
        return row_refs
            .iter()
            .map(|row| context.build_object(std::slice::from_ref(row), mapping, &plan.root_alias))
            .collect();
    }

    let root_key = context.group_key(&plan.root_alias);
    let mut instances = Vec::new();
    for (identity, group) in group_rows(&row_refs, &plan.root_alias, root_key)? {
        if identity.is_null() {
            continue;
        }
        instances.push(context.build_object(&group, mapping, &plan.root_alias)?);
    }
    Ok(instances)
}

struct MaterializeContext<'a> {
    /// Group key per alias, as the plan declared it.
    group_keys: HashMap<&'a str, &'a str>,
}

impl<'a> MaterializeContext<'a> {
    fn new(plan: &'a QueryPlan) -> Self {
        MaterializeContext {
            group_keys: plan
                .grouping
                .iter()
                .map(|level| (level.alias.as_str(), level.group_key.as_str()))
                .collect(),
        }
    }

    fn group_key(&self, alias: &str) -> &str {
        self.group_keys.get(alias).copied().unwrap_or(ID_COLUMN)
    }

    fn build_object(
        &self,
        rows: &[&Row],
        mapping: &ResolvedDtoMapping,
        alias: &str,
    ) -> Result<Value, MaterializeError> {
        let first = rows[0];
        let mut out = Map::new();
        for field in &mapping.fields {
            match &field.binding {
                FieldBinding::DirectColumn { column, .. }
                | FieldBinding::EmbeddedColumn { column, .. } => {
                    let value = first
                        .get(&row_key(alias, column))
                        .cloned()
                        .unwrap_or(Value::Null);
                    out.insert(field.name.clone(), value);
                }
                FieldBinding::ReferenceChain { hops, column, .. } => {
                    self.insert_chain(&mut out, first, alias, &field.name, hops, column)?;
                }
                FieldBinding::ValueObject { mapping: nested, .. } => {
                    let value = self.build_embedded(first, nested, alias);
                    out.insert(field.name.clone(), value);
                }
                FieldBinding::ChildCollection { mapping: nested, .. } => {
                    let child_alias = compose_alias(alias, &field.name);
                    let key = self.group_key(&child_alias);
                    let mut items = Vec::new();
                    for (identity, group) in group_rows(rows, &child_alias, key)? {
                        // Left join with no match: the child list stays empty.
                        if identity.is_null() {
                            continue;
                        }
                        items.push(self.build_object(&group, nested, &child_alias)?);
                    }
                    out.insert(field.name.clone(), Value::Array(items));
                }
            }
        }
        Ok(Value::Object(out))
    }

    /// A multi-hop scalar nests under its hop segment names; the first hop
    /// whose joined identity is the null sentinel turns that whole nested
    /// object into `null`.
    fn insert_chain(
        &self,
        out: &mut Map<String, Value>,
        row: &Row,
        base_alias: &str,
        leaf_name: &str,
        hops: &[ReferenceHop],
        column: &str,
    ) -> Result<(), MaterializeError> {
        let mut alias = base_alias.to_string();
        let mut cursor: &mut Map<String, Value> = out;
        for hop in hops {
            alias = compose_alias(&alias, &hop.segment);
            let identity_key = row_key(&alias, self.group_key(&alias));
            let identity = row
                .get(&identity_key)
                .ok_or_else(|| MaterializeError::MissingColumn {
                    alias: alias.clone(),
                    column: self.group_key(&alias).to_string(),
                })?;
            if identity.is_null() {
                cursor.entry(hop.segment.clone()).or_insert(Value::Null);
                return Ok(());
            }
            let nested = cursor
                .entry(hop.segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            match nested.as_object_mut() {
                Some(object) => cursor = object,
                // A sibling chain already proved this level absent.
                None => return Ok(()),
            }
        }
        let value = row.get(&row_key(&alias, column)).cloned().unwrap_or(Value::Null);
        cursor.insert(leaf_name.to_string(), value);
        Ok(())
    }

    /// Embedded value objects read columns off the owner's alias; no
    /// identity, no grouping, nesting recurses structurally.
    fn build_embedded(&self, row: &Row, mapping: &ResolvedDtoMapping, alias: &str) -> Value {
        let mut out = Map::new();
        for field in &mapping.fields {
            let value = match &field.binding {
                FieldBinding::EmbeddedColumn { column, .. }
                | FieldBinding::DirectColumn { column, .. } => row
                    .get(&row_key(alias, column))
                    .cloned()
                    .unwrap_or(Value::Null),
                FieldBinding::ValueObject { mapping: nested, .. } => {
                    self.build_embedded(row, nested, alias)
                }
                // The resolver never emits joins inside a value object.
                _ => Value::Null,
            };
            out.insert(field.name.clone(), value);
        }
        Value::Object(out)
    }
}

/// Group a row subset by one alias column, first-seen order preserved.
fn group_rows<'r>(
    rows: &[&'r Row],
    alias: &str,
    key: &str,
) -> Result<Vec<(Value, Vec<&'r Row>)>, MaterializeError> {
    let column = row_key(alias, key);
    let mut groups: Vec<(Value, Vec<&'r Row>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let value = row
            .get(&column)
            .ok_or_else(|| MaterializeError::MissingColumn {
                alias: alias.to_string(),
                column: key.to_string(),
            })?;
        let token = value.to_string();
        match index.get(&token) {
            Some(&position) => groups[position].1.push(row),
            None => {
                index.insert(token, groups.len());
                groups.push((value.clone(), vec![row]));
            }
        }
    }
    Ok(groups)
}
