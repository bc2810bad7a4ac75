//! End-to-end path resolution over a small catalog service.
//!
//! Builds metadata from schema definitions, publishes it with annotations
//! through a `ServiceRegistry`, and checks and completes paths the way an
//! editor would.

use metapath::hir::{
    ActionDef, Annotation, AnnotationList, AnnotationValue, ComplexTypeDef, EdmType, EntitySetDef, EntityTypeDef,
    PathError, PathQuery, PathValue, Record, SchemaDef, SegmentUsage, ServiceRegistry,
};
use metapath::ide::{complete_path_expressions, CompletionKind};
use rstest::rstest;

const SERVICE: &str = "/srv/catalog/";
const PRODUCT: &str = "com.example.Product";

fn make_schema() -> SchemaDef {
    SchemaDef::new("com.example")
        .with_alias("Ex")
        .with_entity_type(
            EntityTypeDef::new("Product")
                .with_key("ID")
                .with_property("ID", "Edm.Guid")
                .with_property("Name", "Edm.String")
                .with_property("Address", "Ex.Address")
                .with_navigation("Supplier", "Supplier", false)
                .with_navigation("Reviews", "Review", true),
        )
        .with_entity_type(
            EntityTypeDef::new("Supplier")
                .with_property("Title", "Edm.String")
                .with_navigation("Products", "Product", true),
        )
        .with_entity_type(EntityTypeDef::new("Review").with_property("Rating", "Edm.Int32"))
        .with_complex_type(
            ComplexTypeDef::new("Address")
                .with_property("Street", "Edm.String")
                .with_property("City", "Edm.String"),
        )
        .with_entity_set(EntitySetDef::new("Products", "Product").with_binding("Supplier", "Suppliers"))
        .with_entity_set(EntitySetDef::new("Suppliers", "Supplier").with_binding("Products", "Products"))
        .with_action(
            ActionDef::new("approve")
                .bound_to("Product")
                .with_parameter("comment", "Edm.String"),
        )
}

fn make_annotations() -> Vec<AnnotationList> {
    vec![
        AnnotationList::new("Ex.Product")
            .with(
                Annotation::new("UI.LineItem").with_value(AnnotationValue::Collection(vec![
                    AnnotationValue::Record(
                        Record::typed("UI.DataField").with_property("Value", AnnotationValue::Path("Name".into())),
                    ),
                ])),
            )
            .with(Annotation::new("UI.HeaderInfo")),
        AnnotationList::new("com.example.Supplier").with(Annotation::new("UI.LineItem").with_qualifier("Short")),
        AnnotationList::new("Ex.Product/Name").with(Annotation::new("Common.Label")),
    ]
}

fn make_registry() -> ServiceRegistry {
    let registry = ServiceRegistry::new();
    registry.update(SERVICE, make_schema().into_metadata(), make_annotations());
    registry
}

#[rstest]
#[case("Name", true, None)]
#[case("Supplier/Title", true, None)]
#[case("Supplier/Products/Name", true, None)]
#[case("@UI.LineItem", true, None)]
#[case("@UI.LineItem/0/Value", true, None)]
#[case("Name/@Common.Label", true, None)]
#[case("Supplier/@UI.LineItem#Short", true, None)]
#[case("Nope", false, Some(0))]
#[case("Supplier/Nope", false, Some(1))]
#[case("Supplier/Title/Deeper", false, Some(2))]
fn test_check_unrestricted(#[case] path: &str, #[case] valid: bool, #[case] invalid_at: Option<usize>) {
    let registry = make_registry();
    let info = registry
        .check(SERVICE, Some(PRODUCT), path, &PathQuery::any())
        .unwrap();
    assert_eq!(info.valid, valid, "{path}");
    assert_eq!(info.invalid_segment_index, invalid_at, "{path}");
}

#[rstest]
#[case("Name", true)]
#[case("Address/Street", true)]
#[case("Supplier/Title", true)]
#[case("Reviews", true)]
#[case("Address", false)]
#[case("Reviews/Rating", false)]
#[case("Supplier/Products/Name", false)]
fn test_check_property_paths(#[case] path: &str, #[case] valid: bool) {
    let registry = make_registry();
    let query = PathQuery::for_kinds([EdmType::PrimitiveType]);
    let info = registry.check(SERVICE, Some("Ex.Product"), path, &query).unwrap();
    assert_eq!(info.valid, valid, "{path}");
}

#[test]
fn test_collection_leaf_is_flagged() {
    let registry = make_registry();
    let query = PathQuery::for_kinds([EdmType::PrimitiveType]);
    let info = registry.check(SERVICE, Some(PRODUCT), "Reviews", &query).unwrap();
    assert!(info.is_collection);
    assert_eq!(info.value, Some(PathValue::Target("com.example.Review".into())));
}

#[test]
fn test_collection_target_allows_to_many_hops() {
    let registry = make_registry();
    let query = PathQuery::for_kinds([EdmType::PrimitiveType]).with_collection_target(true);
    let info = registry.check(SERVICE, Some(PRODUCT), "Reviews/Rating", &query).unwrap();
    assert!(info.valid);
    assert!(info.is_collection);
}

#[test]
fn test_entity_set_paths_branch_into_entity_type() {
    let registry = make_registry();
    let info = registry
        .check(SERVICE, None, "/com.example.EntityContainer/Products/Name", &PathQuery::any())
        .unwrap();
    assert!(info.valid);
    assert!(info.is_collection);
    assert_eq!(info.value, Some(PathValue::Target("com.example.Product/Name".into())));
}

#[test]
fn test_action_parameter_path() {
    let registry = make_registry();
    let info = registry
        .check(SERVICE, None, "/com.example.approve(com.example.Product)/comment", &PathQuery::any())
        .unwrap();
    assert!(info.valid);
}

#[test]
fn test_navigation_kind_query() {
    let registry = make_registry();
    let query = PathQuery::for_kinds([EdmType::NavigationPropertyPath]);
    assert!(registry.check(SERVICE, Some(PRODUCT), "Supplier", &query).unwrap().valid);
    assert!(registry.check(SERVICE, Some(PRODUCT), "Supplier/Products", &query).unwrap().valid);
    assert!(!registry.check(SERVICE, Some(PRODUCT), "Name", &query).unwrap().valid);
}

#[test]
fn test_term_query_through_navigation() {
    let registry = make_registry();
    let query = PathQuery::for_terms(["UI.LineItem"]);
    let info = registry.complete(SERVICE, Some(PRODUCT), "", &query).unwrap();

    let line_item = info.next_segment("@UI.LineItem").unwrap();
    assert_eq!(line_item.usage, SegmentUsage::LastOrIntermediate);
    let supplier = info.next_segment("Supplier").unwrap();
    assert_eq!(supplier.usage, SegmentUsage::Intermediate);
    assert!(info.next_segment("Name").is_none());

    let deeper = registry.complete(SERVICE, Some(PRODUCT), "Supplier/", &query).unwrap();
    let names: Vec<&str> = deeper.next_segments.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["@UI.LineItem#Short", "Products"]);
    assert_eq!(deeper.next_segment("Products").unwrap().usage, SegmentUsage::Intermediate);
}

#[test]
fn test_completion_items() {
    let registry = make_registry();
    let details = registry.get(SERVICE).unwrap();
    let resolver = details.resolver(Some("Ex.Product"), Default::default()).unwrap();

    let items = complete_path_expressions(&resolver, "Supplier/Ti", &PathQuery::any());
    let title = items.iter().find(|item| &*item.name == "Title").unwrap();
    assert_eq!(title.kind, CompletionKind::Property);
    assert!(title.commit_characters.is_empty());

    let items = complete_path_expressions(&resolver, "", &PathQuery::any());
    let supplier = items.iter().find(|item| &*item.name == "Supplier").unwrap();
    assert_eq!(supplier.kind, CompletionKind::NavigationProperty);
    assert_eq!(supplier.commit_characters, vec!['/']);
    assert!(!supplier.commit_character_required);
}

#[test]
fn test_partial_segment_is_reported() {
    let registry = make_registry();
    let info = registry
        .complete(SERVICE, Some(PRODUCT), "Supplier/Ti", &PathQuery::any())
        .unwrap();
    assert!(info.valid);
    assert_eq!(info.partial, "Ti");
    assert!(info.next_segment("Title").is_some());
}

#[test]
fn test_unknown_service_and_anchor() {
    let registry = make_registry();
    assert_eq!(
        registry.check("/nope/", None, "x", &PathQuery::any()).unwrap_err(),
        PathError::UnknownService("/nope/".into())
    );
    assert!(matches!(
        registry.complete(SERVICE, Some("Ex.Missing"), "", &PathQuery::any()),
        Err(PathError::UnknownAnchor(_))
    ));
}

#[test]
fn test_metadata_is_structurally_valid() {
    let metadata = make_schema().into_metadata();
    assert!(metadata.validate().is_empty());
}
