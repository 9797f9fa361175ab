//! The Order/Customer/OrderLine pipeline end to end: YAML schema model in,
//! graph, write plan, join plan and materialized instances out.

use anyhow::Result;
use serde_json::{json, Map, Value};

use layergen::dto_resolver::{resolve_projection, DtoNode};
use layergen::materializer::{materialize, Row};
use layergen::query_planner::{plan_read_query, Cardinality};
use layergen::schema_catalog::{ReferenceGraph, ReferenceGraphBuilder, SchemaModel};
use layergen::write_planner::plan_fk_caches;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const SCHEMA_YAML: &str = r#"
entities:
  - domain: sales
    name: Order
    kind: AggregateRoot
    storage_table: ORDERS
    properties:
      - name: Id
        scalar_type: Int64
      - name: CustomerId
        scalar_type: Int64
        reference: !ForeignKey
          name: Customer
      - name: Lines
        scalar_type: Collection
        is_collection_navigation: true
        reference: !ForeignKey
          name: OrderLine
  - domain: sales
    name: OrderLine
    kind: ChildEntity
    storage_table: ORDERLINES
    immediate_parent:
      name: Order
    properties:
      - name: Id
        scalar_type: Int64
      - name: OrderId
        scalar_type: Int64
        reference: !ParentBackReference
          name: Order
      - name: Amount
        scalar_type: "Decimal(18,2)"
  - domain: sales
    name: Customer
    kind: AggregateRoot
    storage_table: CUSTOMERS
    properties:
      - name: Id
        scalar_type: Int64
      - name: Name
        scalar_type: String
"#;

const DTO_YAML: &str = r#"
name: OrderSummary
target:
  name: Order
fields:
  - kind: scalar
    name: Id
    source: Id
  - kind: scalar
    name: Name
    source: Customer.Name
  - kind: child_collection
    name: Lines
    node:
      name: OrderSummaryLine
      target:
        name: OrderLine
      fields:
        - kind: scalar
          name: Id
          source: Id
        - kind: scalar
          name: Amount
          source: Amount
"#;

fn load_graph() -> Result<ReferenceGraph> {
    let model: SchemaModel = serde_yaml::from_str(SCHEMA_YAML)?;
    let outcome = ReferenceGraphBuilder::new(model).build();
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    Ok(outcome.graph)
}

fn row(pairs: &[(&str, Value)]) -> Row {
    let mut map = Map::new();
    for (key, value) in pairs {
        map.insert(key.to_string(), value.clone());
    }
    map
}

#[test]
fn plans_the_expected_join_tree_from_yaml_declarations() -> Result<()> {
    init_logging();
    let graph = load_graph()?;
    let dto: DtoNode = serde_yaml::from_str(DTO_YAML)?;

    let resolved = resolve_projection(&graph, "sales", &dto)?;
    assert!(resolved.dropped.is_empty(), "{:?}", resolved.dropped);

    let outcome = plan_read_query(&graph, &resolved.mapping, false)?;
    assert!(outcome.dropped.is_empty(), "{:?}", outcome.dropped);
    let plan = outcome.plan;

    let shape: Vec<(&str, &str, Option<&str>, Cardinality)> = plan
        .joins
        .iter()
        .map(|n| {
            (
                n.table.as_str(),
                n.alias.as_str(),
                n.parent_alias.as_deref(),
                n.cardinality,
            )
        })
        .collect();
    assert_eq!(
        shape,
        vec![
            ("ORDERS", "Order", None, Cardinality::One),
            ("CUSTOMERS", "OrderCustomer", Some("Order"), Cardinality::One),
            ("ORDERLINES", "OrderLines", Some("Order"), Cardinality::Many),
        ]
    );

    let customer = &plan.joins[1];
    let predicate = customer.predicate.as_ref().unwrap();
    assert_eq!(predicate.left_column, "Id");
    assert_eq!(predicate.right_column, "CustomerId");

    let lines = &plan.joins[2];
    let predicate = lines.predicate.as_ref().unwrap();
    assert_eq!(predicate.left_column, "OrderId");
    assert_eq!(predicate.right_column, "Id");
    Ok(())
}

#[test]
fn three_raw_rows_become_one_order_with_two_lines() -> Result<()> {
    init_logging();
    let graph = load_graph()?;
    let dto: DtoNode = serde_yaml::from_str(DTO_YAML)?;
    let resolved = resolve_projection(&graph, "sales", &dto)?;
    let plan = plan_read_query(&graph, &resolved.mapping, false)?.plan;

    let rows = vec![
        row(&[
            ("Order_Id", json!(1)),
            ("OrderCustomer_Id", json!(7)),
            ("OrderCustomer_Name", json!("Acme")),
            ("OrderLines_Id", json!(11)),
            ("OrderLines_Amount", json!(250)),
        ]),
        row(&[
            ("Order_Id", json!(1)),
            ("OrderCustomer_Id", json!(7)),
            ("OrderCustomer_Name", json!("Acme")),
            ("OrderLines_Id", json!(12)),
            ("OrderLines_Amount", json!(100)),
        ]),
        row(&[
            ("Order_Id", json!(1)),
            ("OrderCustomer_Id", json!(7)),
            ("OrderCustomer_Name", json!("Acme")),
            ("OrderLines_Id", json!(12)),
            ("OrderLines_Amount", json!(100)),
        ]),
    ];

    let instances = materialize(&plan, &resolved.mapping, &rows)?;
    assert_eq!(instances.len(), 1);
    let order = &instances[0];
    assert_eq!(order["Id"], json!(1));
    assert_eq!(order["Customer"]["Name"], json!("Acme"));
    assert_eq!(order["Lines"].as_array().unwrap().len(), 2);
    assert_eq!(order["Lines"][0]["Amount"], json!(250));
    assert_eq!(order["Lines"][1]["Amount"], json!(100));
    Ok(())
}

#[test]
fn write_plan_checks_each_referenced_aggregate_once() -> Result<()> {
    init_logging();
    let graph = load_graph()?;
    let order = graph.lookup("sales", "Order").unwrap();

    let caches = plan_fk_caches(&graph, order)?;
    assert_eq!(caches.len(), 1);
    assert_eq!(caches[0].target_name, "Customer");
    assert!(caches[0].owners.contains("Order"));
    Ok(())
}

#[test]
fn soft_delete_filters_the_whole_tree() -> Result<()> {
    init_logging();
    let graph = load_graph()?;
    let dto: DtoNode = serde_yaml::from_str(DTO_YAML)?;
    let resolved = resolve_projection(&graph, "sales", &dto)?;
    let plan = plan_read_query(&graph, &resolved.mapping, true)?.plan;

    let filter = plan.base_filter.as_ref().unwrap();
    assert_eq!(filter.column, "Status");
    assert_eq!(filter.value, "Active");
    assert!(plan.joins.iter().all(|n| n.soft_delete.is_some()));
    Ok(())
}
