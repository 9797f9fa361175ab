//! Schema failures stay local: a broken entity subtree is quarantined and
//! every other aggregate still plans and generates.

use layergen::dto_resolver::{resolve_projection, DtoField, DtoNode};
use layergen::query_planner::plan_read_query;
use layergen::schema_catalog::{
    EntityDef, EntityKind, EntityRef, PropertyDef, ReferenceGraphBuilder, SchemaError, SchemaModel,
};

fn entity(
    name: &str,
    kind: EntityKind,
    table: Option<&str>,
    parent: Option<EntityRef>,
    properties: Vec<PropertyDef>,
) -> EntityDef {
    EntityDef {
        domain: "crm".into(),
        name: name.into(),
        kind,
        storage_table: table.map(Into::into),
        immediate_parent: parent,
        properties,
        selection_priority: None,
    }
}

#[test]
fn broken_subtree_does_not_stop_the_healthy_aggregate() {
    let model = SchemaModel::new(vec![
        // Healthy aggregate.
        entity(
            "Account",
            EntityKind::AggregateRoot,
            Some("ACCOUNTS"),
            None,
            vec![
                PropertyDef::scalar("Id", "Int64"),
                PropertyDef::scalar("Name", "String"),
            ],
        ),
        // Broken aggregate: dangling foreign key.
        entity(
            "Campaign",
            EntityKind::AggregateRoot,
            Some("CAMPAIGNS"),
            None,
            vec![
                PropertyDef::scalar("Id", "Int64"),
                PropertyDef::foreign_key("OwnerId", "Int64", EntityRef::local("Nowhere")),
            ],
        ),
        // Child of the broken aggregate, itself well formed.
        entity(
            "CampaignStep",
            EntityKind::ChildEntity,
            Some("CAMPAIGNSTEPS"),
            Some(EntityRef::local("Campaign")),
            vec![
                PropertyDef::scalar("Id", "Int64"),
                PropertyDef::parent_back_reference("CampaignId", "Int64", EntityRef::local("Campaign")),
            ],
        ),
    ]);

    let outcome = ReferenceGraphBuilder::new(model).build();
    assert!(outcome
        .errors
        .iter()
        .any(|e| matches!(e, SchemaError::UnknownTarget { .. })));

    let graph = outcome.graph;
    assert!(graph.lookup("crm", "Campaign").is_none());
    assert!(graph.lookup("crm", "CampaignStep").is_none());

    // The healthy aggregate still resolves and plans.
    let dto = DtoNode::new(
        "AccountRow",
        EntityRef::local("Account"),
        vec![DtoField::scalar("Id"), DtoField::scalar("Name")],
    );
    let resolved = resolve_projection(&graph, "crm", &dto).unwrap();
    assert!(resolved.dropped.is_empty());
    let plan = plan_read_query(&graph, &resolved.mapping, false).unwrap().plan;
    assert_eq!(plan.joins.len(), 1);
    assert_eq!(plan.root_alias, "Account");
}

#[test]
fn ambiguous_duplicate_declarations_are_reported_not_ordered() {
    let duplicate = entity(
        "Account",
        EntityKind::AggregateRoot,
        Some("ACCOUNTS"),
        None,
        vec![PropertyDef::scalar("Id", "Int64")],
    );
    let mut shadow = duplicate.clone();
    shadow.storage_table = Some("ACCOUNTS_LEGACY".into());

    let outcome = ReferenceGraphBuilder::new(SchemaModel::new(vec![duplicate, shadow])).build();
    assert!(outcome
        .errors
        .iter()
        .any(|e| matches!(e, SchemaError::AmbiguousEntity { .. })));
    assert!(outcome.graph.is_empty());
}

#[test]
fn prioritized_duplicate_wins_without_error() {
    let duplicate = entity(
        "Account",
        EntityKind::AggregateRoot,
        Some("ACCOUNTS"),
        None,
        vec![PropertyDef::scalar("Id", "Int64")],
    );
    let mut shadow = duplicate.clone();
    shadow.storage_table = Some("ACCOUNTS_V2".into());
    shadow.selection_priority = Some(1);

    let outcome = ReferenceGraphBuilder::new(SchemaModel::new(vec![duplicate, shadow])).build();
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    let account = outcome.graph.lookup("crm", "Account").unwrap();
    assert_eq!(
        outcome.graph.def(account).storage_table.as_deref(),
        Some("ACCOUNTS_V2")
    );
}
