//! Write-side planning invariants: one existence-check cache per referenced
//! target, owners unioned across the whole aggregate.

use std::collections::BTreeSet;

use layergen::schema_catalog::{
    EntityDef, EntityKind, EntityRef, PropertyDef, ReferenceGraphBuilder, SchemaModel,
};
use layergen::write_planner::plan_fk_caches;

#[test]
fn same_target_from_root_and_child_shares_one_cache() {
    let model = SchemaModel::new(vec![
        EntityDef {
            domain: "billing".into(),
            name: "Invoice".into(),
            kind: EntityKind::AggregateRoot,
            storage_table: Some("INVOICES".into()),
            immediate_parent: None,
            properties: vec![
                PropertyDef::scalar("Id", "Int64"),
                PropertyDef::foreign_key("IssuerId", "Int64", EntityRef::local("Party")),
                PropertyDef::child_collection("Items", EntityRef::local("InvoiceItem")),
            ],
            selection_priority: None,
        },
        EntityDef {
            domain: "billing".into(),
            name: "InvoiceItem".into(),
            kind: EntityKind::ChildEntity,
            storage_table: Some("INVOICEITEMS".into()),
            immediate_parent: Some(EntityRef::local("Invoice")),
            properties: vec![
                PropertyDef::scalar("Id", "Int64"),
                PropertyDef::parent_back_reference("InvoiceId", "Int64", EntityRef::local("Invoice")),
                // Different property name, same target entity.
                PropertyDef::foreign_key("RecipientId", "Int64", EntityRef::local("Party")),
            ],
            selection_priority: None,
        },
        EntityDef {
            domain: "billing".into(),
            name: "Party".into(),
            kind: EntityKind::AggregateRoot,
            storage_table: Some("PARTIES".into()),
            immediate_parent: None,
            properties: vec![PropertyDef::scalar("Id", "Int64")],
            selection_priority: None,
        },
    ]);
    let outcome = ReferenceGraphBuilder::new(model).build();
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    let graph = outcome.graph;

    let invoice = graph.lookup("billing", "Invoice").unwrap();
    let caches = plan_fk_caches(&graph, invoice).unwrap();

    assert_eq!(caches.len(), 1);
    assert_eq!(caches[0].target_name, "Party");
    assert_eq!(
        caches[0].owners,
        BTreeSet::from(["Invoice".to_string(), "InvoiceItem".to_string()])
    );
}
