//! Relationship stitching across the sets of a tuple.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use common::{raw_set, Customer, Feed, Order, OrderLine};
use weft::descriptor::DescriptorRegistry;
use weft::model::{CollectionConfig, FieldConfig, Model, ModelInfo, Populate};
use weft::populate::{MaterializationPolicy, PopulationError};
use weft::provider::SourcedSets;
use weft::row::RawResultSet;
use weft::stitch::{RelationshipError, RelationshipSpec};
use weft::tuple::{DynResultTuple, ResultTuple2, ResultTuple3};
use weft::value::{TypeTag, Value};

fn sourced(registry: &Arc<DescriptorRegistry>, sets: Vec<RawResultSet>) -> SourcedSets {
    SourcedSets::single_provider("db", Arc::clone(registry), sets)
}

fn customers_raw(rows: Vec<(i64, &str)>) -> RawResultSet {
    raw_set(
        &[("id", TypeTag::Int), ("name", TypeTag::Text)],
        rows.into_iter()
            .map(|(id, name)| vec![Value::Int(id), Value::Text(name.into())])
            .collect(),
    )
}

fn orders_raw(rows: Vec<(i64, i64)>) -> RawResultSet {
    raw_set(
        &[("id", TypeTag::Int), ("customer_id", TypeTag::Int)],
        rows.into_iter()
            .map(|(id, customer_id)| vec![Value::Int(id), Value::Int(customer_id)])
            .collect(),
    )
}

fn lines_raw(rows: Vec<(i64, i64, &str)>) -> RawResultSet {
    raw_set(
        &[
            ("id", TypeTag::Int),
            ("order_id", TypeTag::Int),
            ("sku", TypeTag::Text),
        ],
        rows.into_iter()
            .map(|(id, order_id, sku)| {
                vec![Value::Int(id), Value::Int(order_id), Value::Text(sku.into())]
            })
            .collect(),
    )
}

fn two_sets(
    customers: Vec<(i64, &str)>,
    orders: Vec<(i64, i64)>,
) -> ResultTuple2<Customer, Order> {
    let registry = Arc::new(DescriptorRegistry::new());
    ResultTuple2::assemble(
        sourced(&registry, vec![customers_raw(customers), orders_raw(orders)]),
        &MaterializationPolicy::sequential(),
    )
    .unwrap()
}

#[test]
fn test_sequential_specs_join_each_set_to_the_next() {
    let mut tuple = two_sets(
        vec![(1, "ada"), (2, "grace")],
        vec![(10, 1), (11, 1), (12, 2)],
    );
    tuple
        .stitch(&[RelationshipSpec::new("id", "customer_id", "orders")])
        .unwrap();

    let customers = tuple.sets.0.items();
    assert_eq!(customers[0].orders.len(), 2);
    assert_eq!(customers[0].orders[0].id, 10);
    assert_eq!(customers[0].orders[1].id, 11);
    assert_eq!(customers[1].orders.len(), 1);
    assert_eq!(customers[1].orders[0].id, 12);
}

#[test]
fn test_children_keep_child_set_order_within_a_group() {
    let mut tuple = two_sets(vec![(1, "ada")], vec![(5, 1), (3, 1), (9, 1)]);
    tuple
        .stitch(&[RelationshipSpec::new("id", "customer_id", "orders")])
        .unwrap();

    let ids: Vec<i64> = tuple.sets.0.items()[0].orders.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![5, 3, 9]);
}

#[test]
fn test_parents_sharing_a_key_each_receive_the_full_group() {
    let mut tuple = two_sets(vec![(1, "ada"), (1, "alias")], vec![(10, 1), (11, 1)]);
    tuple
        .stitch(&[RelationshipSpec::new("id", "customer_id", "orders")])
        .unwrap();

    let customers = tuple.sets.0.items();
    assert_eq!(customers[0].orders.len(), 2);
    assert_eq!(customers[1].orders.len(), 2);
}

#[test]
fn test_unmatched_parent_keeps_its_collection_untouched() {
    let mut tuple = two_sets(vec![(1, "ada"), (2, "grace")], vec![(10, 1)]);
    tuple
        .stitch(&[RelationshipSpec::new("id", "customer_id", "orders")])
        .unwrap();

    assert_eq!(tuple.sets.0.items()[1].orders.len(), 0);
}

#[test]
fn test_empty_child_set_is_a_no_op() {
    let mut tuple = two_sets(vec![(1, "ada")], vec![]);
    tuple
        .stitch(&[RelationshipSpec::new("id", "customer_id", "orders")])
        .unwrap();
    assert!(tuple.sets.0.items()[0].orders.is_empty());
}

#[test]
fn test_join_keys_compare_by_text_form() {
    // Parent key is the text name "1"; child key is the integer 1. The
    // text-form comparison makes them meet.
    let mut tuple = two_sets(vec![(7, "1")], vec![(10, 1)]);
    tuple
        .stitch(&[RelationshipSpec::new("name", "customer_id", "orders")])
        .unwrap();

    assert_eq!(tuple.sets.0.items()[0].orders.len(), 1);
}

#[test]
fn test_parent_key_may_be_a_dotted_nested_path() {
    let registry = Arc::new(DescriptorRegistry::new());
    let customers = raw_set(
        &[("id", TypeTag::Int), ("postal_code", TypeTag::Text)],
        vec![vec![Value::Int(1), Value::Text("10".into())]],
    );
    let mut tuple = ResultTuple2::<Customer, Order>::assemble(
        sourced(&registry, vec![customers, orders_raw(vec![(42, 10)])]),
        &MaterializationPolicy::sequential(),
    )
    .unwrap();

    tuple
        .stitch(&[RelationshipSpec::new("address.zip", "customer_id", "orders")])
        .unwrap();

    assert_eq!(tuple.sets.0.items()[0].orders[0].id, 42);
}

#[test]
fn test_explicit_indices_allow_child_most_first_stitching() {
    let registry = Arc::new(DescriptorRegistry::new());
    let mut tuple = ResultTuple3::<Customer, Order, OrderLine>::assemble(
        sourced(
            &registry,
            vec![
                customers_raw(vec![(1, "ada")]),
                orders_raw(vec![(10, 1)]),
                lines_raw(vec![(100, 10, "widget"), (101, 10, "gadget")]),
            ],
        ),
        &MaterializationPolicy::sequential(),
    )
    .unwrap();

    // Attach lines to orders before the orders are cloned into customers.
    tuple
        .stitch(&[
            RelationshipSpec::new("id", "order_id", "lines")
                .with_parent_index(1)
                .with_child_index(2),
            RelationshipSpec::new("id", "customer_id", "orders")
                .with_parent_index(0)
                .with_child_index(1),
        ])
        .unwrap();

    let order = &tuple.sets.0.items()[0].orders[0];
    assert_eq!(order.lines.len(), 2);
    assert_eq!(order.lines[0].sku, "widget");
}

// -- error cases --------------------------------------------------------------

#[test]
fn test_unknown_collection_property_is_missing() {
    let mut tuple = two_sets(vec![(1, "ada")], vec![(10, 1)]);
    let err = tuple
        .stitch(&[RelationshipSpec::new("id", "customer_id", "bogus")])
        .unwrap_err();
    assert_eq!(
        err,
        RelationshipError::ParentPropertyMissing {
            parent: "Customer".into(),
            property: "bogus".into(),
        }
    );
}

#[test]
fn test_plain_field_as_collection_property_is_not_a_list() {
    let mut tuple = two_sets(vec![(1, "ada")], vec![(10, 1)]);
    let err = tuple
        .stitch(&[RelationshipSpec::new("id", "customer_id", "name")])
        .unwrap_err();
    assert_eq!(
        err,
        RelationshipError::ParentPropertyNotAList {
            parent: "Customer".into(),
            property: "name".into(),
        }
    );
}

#[test]
fn test_child_set_of_the_wrong_type_is_rejected() {
    let registry = Arc::new(DescriptorRegistry::new());
    let mut tuple = ResultTuple2::<Customer, OrderLine>::assemble(
        sourced(
            &registry,
            vec![
                customers_raw(vec![(1, "ada")]),
                lines_raw(vec![(100, 10, "widget")]),
            ],
        ),
        &MaterializationPolicy::sequential(),
    )
    .unwrap();

    let err = tuple
        .stitch(&[RelationshipSpec::new("id", "order_id", "orders")])
        .unwrap_err();
    assert_eq!(
        err,
        RelationshipError::ParentPropertyListIncorrectType {
            property: "orders".into(),
            expected: "Order".into(),
        }
    );
}

#[test]
fn test_more_specs_than_boundaries_rejected_before_any_mutation() {
    let mut tuple = two_sets(vec![(1, "ada")], vec![(10, 1)]);
    let err = tuple
        .stitch(&[
            RelationshipSpec::new("id", "customer_id", "orders"),
            RelationshipSpec::new("id", "customer_id", "orders")
                .with_parent_index(0)
                .with_child_index(1),
        ])
        .unwrap_err();
    assert_eq!(
        err,
        RelationshipError::TooManyRelationships {
            specs: 2,
            boundaries: 1,
        }
    );
    assert!(tuple.sets.0.items()[0].orders.is_empty());
}

#[test]
fn test_spec_resolving_to_one_set_on_both_sides_rejected() {
    let mut tuple = two_sets(vec![(1, "ada")], vec![(10, 1)]);
    let err = tuple
        .stitch(&[RelationshipSpec::new("id", "customer_id", "orders")
            .with_parent_index(1)
            .with_child_index(1)])
        .unwrap_err();
    assert!(matches!(
        err,
        RelationshipError::MisconfiguredRelationship { spec_index: 0, .. }
    ));
    assert!(tuple.sets.0.items()[0].orders.is_empty());
}

#[test]
fn test_out_of_range_set_index_rejected() {
    let mut tuple = two_sets(vec![(1, "ada")], vec![(10, 1)]);
    let err = tuple
        .stitch(&[RelationshipSpec::new("id", "customer_id", "orders").with_child_index(5)])
        .unwrap_err();
    assert!(matches!(
        err,
        RelationshipError::MisconfiguredRelationship { .. }
    ));
}

#[derive(Debug, Default, Clone)]
struct Report {
    id: i64,
}

impl Populate for Report {
    fn assign(&mut self, accessor: usize, value: &Value) -> Result<(), PopulationError> {
        match accessor {
            0 => {
                self.id = value.as_i64().unwrap_or_default();
                Ok(())
            }
            _ => Err(PopulationError::UnknownAccessor {
                type_name: "Report".into(),
                accessor,
            }),
        }
    }

    fn text_of(&self, path: &str) -> Option<String> {
        (path == "id").then(|| self.id.to_string())
    }

    // No assign_children override: the declared collection is unwritable.
}

impl Model for Report {
    fn model_name() -> &'static str {
        "Report"
    }

    fn field_configs() -> Vec<FieldConfig> {
        vec![FieldConfig::scalar("id", TypeTag::Int)]
    }

    fn collection_configs() -> Vec<CollectionConfig> {
        vec![CollectionConfig::of::<OrderLine>("lines")]
    }
}

#[test]
fn test_declared_but_unwritable_collection_surfaces_as_such() {
    let registry = Arc::new(DescriptorRegistry::new());
    let reports = raw_set(&[("id", TypeTag::Int)], vec![vec![Value::Int(10)]]);
    let mut tuple = ResultTuple2::<Report, OrderLine>::assemble(
        sourced(&registry, vec![reports, lines_raw(vec![(1, 10, "widget")])]),
        &MaterializationPolicy::sequential(),
    )
    .unwrap();

    let err = tuple
        .stitch(&[RelationshipSpec::new("id", "order_id", "lines")])
        .unwrap_err();
    assert_eq!(
        err,
        RelationshipError::CollectionNotWritable {
            property: "lines".into(),
        }
    );
}

#[test]
fn test_assign_group_reports_out_of_range_parent_rows() {
    use weft::populate::MaterializedSet;
    use weft::stitch::SetView;

    let mut set: MaterializedSet<Customer> = MaterializedSet::new(Vec::new(), None);
    let err = SetView::assign_group(&mut set, 5, "orders", Box::new(Vec::<Order>::new()))
        .unwrap_err();
    assert_eq!(err, RelationshipError::ParentRowOutOfRange { row: 5, len: 0 });
}

// -- dynamic sets --------------------------------------------------------------

#[test]
fn test_dynamic_collection_accepts_children_of_any_model_type() {
    let registry = Arc::new(DescriptorRegistry::new());
    let feeds = raw_set(&[("id", TypeTag::Int)], vec![vec![Value::Int(1)]]);
    let mut tuple = DynResultTuple::assemble(
        sourced(&registry, vec![feeds, lines_raw(vec![(100, 1, "1"), (101, 1, "2"), (102, 1, "1")])]),
        &[ModelInfo::of::<Feed>(), ModelInfo::of::<OrderLine>()],
        &MaterializationPolicy::sequential(),
    )
    .unwrap();

    // Feed id 1 joins lines whose sku text is "1".
    tuple
        .stitch(&[RelationshipSpec::new("id", "sku", "entries")])
        .unwrap();

    let mut sets = tuple.into_sets();
    let lines = sets.pop().unwrap();
    let feeds = sets.pop().unwrap().downcast_items::<Feed>().unwrap();
    assert_eq!(feeds[0].entries.len(), 2);
    assert_eq!(lines.len(), 3);
}

#[test]
fn test_typed_parent_accepts_children_from_a_dynamic_child_set() {
    let registry = Arc::new(DescriptorRegistry::new());
    let mut tuple = DynResultTuple::assemble(
        sourced(
            &registry,
            vec![customers_raw(vec![(1, "ada")]), orders_raw(vec![(10, 1)])],
        ),
        &[ModelInfo::of::<Customer>(), ModelInfo::of::<Order>()],
        &MaterializationPolicy::sequential(),
    )
    .unwrap();

    tuple
        .stitch(&[RelationshipSpec::new("id", "customer_id", "orders")])
        .unwrap();

    let customers = tuple
        .into_sets()
        .remove(0)
        .downcast_items::<Customer>()
        .unwrap();
    assert_eq!(customers[0].orders.len(), 1);
    assert_eq!(customers[0].orders[0].id, 10);
}
