//! Invariants the planning outputs promise the emitter: bounded parent
//! chains, duplicate-free ordered join plans, soft-delete predicate
//! placement.

use test_case::test_case;

use layergen::dto_resolver::{resolve_projection, DtoField, DtoNode};
use layergen::query_planner::{plan_read_query, Cardinality, FilterPredicate};
use layergen::schema_catalog::{
    EntityDef, EntityKind, EntityRef, PropertyDef, ReferenceGraph, ReferenceGraphBuilder,
    SchemaModel,
};

fn entity(
    name: &str,
    kind: EntityKind,
    table: Option<&str>,
    parent: Option<EntityRef>,
    properties: Vec<PropertyDef>,
) -> EntityDef {
    EntityDef {
        domain: "logistics".into(),
        name: name.into(),
        kind,
        storage_table: table.map(Into::into),
        immediate_parent: parent,
        properties,
        selection_priority: None,
    }
}

/// A three-level aggregate: Shipment -> Pallet -> Parcel.
fn deep_aggregate_graph() -> ReferenceGraph {
    let model = SchemaModel::new(vec![
        entity(
            "Shipment",
            EntityKind::AggregateRoot,
            Some("SHIPMENTS"),
            None,
            vec![
                PropertyDef::scalar("Id", "Int64"),
                PropertyDef::foreign_key("CarrierId", "Int64", EntityRef::local("Carrier")),
                PropertyDef::child_collection("Pallets", EntityRef::local("Pallet")),
            ],
        ),
        entity(
            "Pallet",
            EntityKind::ChildEntity,
            Some("PALLETS"),
            Some(EntityRef::local("Shipment")),
            vec![
                PropertyDef::scalar("Id", "Int64"),
                PropertyDef::parent_back_reference("ShipmentId", "Int64", EntityRef::local("Shipment")),
                PropertyDef::child_collection("Parcels", EntityRef::local("Parcel")),
            ],
        ),
        entity(
            "Parcel",
            EntityKind::ChildEntity,
            Some("PARCELS"),
            Some(EntityRef::local("Pallet")),
            vec![
                PropertyDef::scalar("Id", "Int64"),
                PropertyDef::parent_back_reference("PalletId", "Int64", EntityRef::local("Pallet")),
                PropertyDef::scalar("Weight", "Float64"),
            ],
        ),
        entity(
            "Carrier",
            EntityKind::AggregateRoot,
            Some("CARRIERS"),
            None,
            vec![
                PropertyDef::scalar("Id", "Int64"),
                PropertyDef::scalar("Name", "String"),
            ],
        ),
    ]);
    let outcome = ReferenceGraphBuilder::new(model).build();
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    outcome.graph
}

fn shipment_dto() -> DtoNode {
    DtoNode::new(
        "ShipmentDetail",
        EntityRef::local("Shipment"),
        vec![
            DtoField::scalar("Id"),
            DtoField::scalar("Carrier.Name"),
            DtoField::ChildCollection {
                name: "Pallets".into(),
                node: DtoNode::new(
                    "PalletDetail",
                    EntityRef::local("Pallet"),
                    vec![
                        DtoField::scalar("Id"),
                        DtoField::ChildCollection {
                            name: "Parcels".into(),
                            node: DtoNode::new(
                                "ParcelDetail",
                                EntityRef::local("Parcel"),
                                vec![DtoField::scalar("Id"), DtoField::scalar("Weight")],
                            ),
                        },
                    ],
                ),
            },
        ],
    )
}

#[test]
fn parent_chains_terminate_at_an_aggregate_root() {
    let graph = deep_aggregate_graph();
    for (id, node) in graph.iter() {
        if node.def.kind == EntityKind::ChildEntity {
            let aggregate = graph
                .top_level_aggregate(id)
                .expect("child entity must resolve to an aggregate");
            assert_eq!(
                graph.def(aggregate).kind,
                EntityKind::AggregateRoot,
                "`{}` must bottom out at an aggregate root",
                node.def.name
            );
        }
    }
}

#[test]
fn join_plan_aliases_are_unique_and_parent_ordered() {
    let graph = deep_aggregate_graph();
    let resolved = resolve_projection(&graph, "logistics", &shipment_dto()).unwrap();
    let plan = plan_read_query(&graph, &resolved.mapping, false).unwrap().plan;

    let mut seen: Vec<&str> = Vec::new();
    for node in &plan.joins {
        assert!(!seen.contains(&node.alias.as_str()), "alias `{}` duplicated", node.alias);
        if let Some(parent) = node.parent_alias.as_deref() {
            assert!(seen.contains(&parent), "`{}` emitted before `{parent}`", node.alias);
        }
        seen.push(&node.alias);
    }
    assert_eq!(
        seen,
        vec!["Shipment", "ShipmentCarrier", "ShipmentPallets", "ShipmentPalletsParcels"]
    );
}

#[test]
fn nested_collections_group_outer_to_inner() {
    let graph = deep_aggregate_graph();
    let resolved = resolve_projection(&graph, "logistics", &shipment_dto()).unwrap();
    let plan = plan_read_query(&graph, &resolved.mapping, false).unwrap().plan;

    let many: Vec<&str> = plan
        .grouping
        .iter()
        .filter(|l| l.cardinality == Cardinality::Many)
        .map(|l| l.alias.as_str())
        .collect();
    assert_eq!(many, vec!["ShipmentPallets", "ShipmentPalletsParcels"]);
}

#[test_case(true; "soft delete on")]
#[test_case(false; "soft delete off")]
fn soft_delete_predicate_placement(soft_delete: bool) {
    let graph = deep_aggregate_graph();
    let resolved = resolve_projection(&graph, "logistics", &shipment_dto()).unwrap();
    let plan = plan_read_query(&graph, &resolved.mapping, soft_delete)
        .unwrap()
        .plan;

    let expected = soft_delete.then(FilterPredicate::active_status);
    assert_eq!(plan.base_filter, expected);
    for node in &plan.joins {
        assert_eq!(node.soft_delete, expected, "node `{}`", node.alias);
    }
}
