use std::sync::Arc;
use std::thread;

use filterspec::parser::InvalidAttributeReason;
use filterspec::{
    AttributeInspector, AttributeKind, EntityMapping, EntityType, InspectionCache,
    MappedAttribute, QueryError, Schema,
};

/// user -> address (to-one) -> street; user -> orders (to-many) -> total
fn shop() -> Schema {
    Schema::from_json(
        r#"{
            "entities": {
                "user": {
                    "name": "terminal",
                    "age": "terminal",
                    "address": { "entity": "address" },
                    "orders": { "aggregate": "order" }
                },
                "address": { "street": "terminal", "city": "terminal" },
                "order": { "total": "terminal", "placed": "terminal" }
            }
        }"#,
    )
    .unwrap()
}

fn user() -> EntityType {
    EntityType::new("user")
}

fn reason(err: QueryError) -> InvalidAttributeReason {
    match err {
        QueryError::InvalidAttribute { reason, .. } => reason,
        other => panic!("expected invalid attribute, got {:?}", other),
    }
}

#[test]
fn test_one_descriptor_per_segment() {
    let inspector = AttributeInspector::new(shop());
    let inspection = inspector.inspect(&user(), "address.street").unwrap();
    assert_eq!(
        &inspection[..],
        &[
            MappedAttribute::entity("address", "address"),
            MappedAttribute::terminal("street"),
        ]
    );
}

#[test]
fn test_through_aggregate_rejected_when_traversal_disabled() {
    let inspector = AttributeInspector::new(shop()).with_aggregate_traversal(false);
    let err = inspector.inspect(&user(), "orders.total").unwrap_err();
    assert!(matches!(
        reason(err),
        InvalidAttributeReason::ThroughAggregate { segment } if segment == "orders"
    ));
}

#[test]
fn test_through_aggregate_allowed_by_default() {
    let inspector = AttributeInspector::new(shop());
    let inspection = inspector.inspect(&user(), "orders.total").unwrap();
    let kinds: Vec<AttributeKind> = inspection.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![AttributeKind::Aggregate, AttributeKind::Terminal]);
}

#[test]
fn test_ending_on_aggregate_rejected() {
    for inspector in [
        AttributeInspector::new(shop()),
        AttributeInspector::new(shop()).with_aggregate_traversal(false),
    ] {
        let err = inspector.inspect(&user(), "orders").unwrap_err();
        assert!(matches!(
            reason(err),
            InvalidAttributeReason::EndsOnAggregate { segment } if segment == "orders"
        ));
    }
}

#[test]
fn test_through_terminal_rejected() {
    let inspector = AttributeInspector::new(shop());
    let err = inspector.inspect(&user(), "age.years").unwrap_err();
    assert!(matches!(
        reason(err),
        InvalidAttributeReason::ThroughTerminal { segment } if segment == "age"
    ));
}

#[test]
fn test_unknown_segment_rejected() {
    let inspector = AttributeInspector::new(shop());
    let err = inspector.inspect(&user(), "address.zip").unwrap_err();
    assert!(err.to_string().contains("address.zip"));
    assert!(matches!(
        reason(err),
        InvalidAttributeReason::NotMapped { segment, entity }
            if segment == "zip" && entity == EntityType::new("address")
    ));
}

#[test]
fn test_unknown_entity_type_rejected() {
    let inspector = AttributeInspector::new(shop());
    assert!(inspector
        .inspect(&EntityType::new("invoice"), "name")
        .is_err());
}

/// Mapping that claims a relationship without saying where it leads
struct Broken;

impl EntityMapping for Broken {
    fn classify(&self, _entity: &EntityType, attribute: &str) -> Option<MappedAttribute> {
        Some(MappedAttribute {
            name: attribute.to_string(),
            kind: AttributeKind::Entity,
            target: None,
        })
    }
}

#[test]
fn test_relationship_without_target_rejected() {
    let inspector = AttributeInspector::new(Broken);
    let err = inspector.inspect(&user(), "a.b").unwrap_err();
    assert!(matches!(
        reason(err),
        InvalidAttributeReason::MissingTarget { segment } if segment == "a"
    ));
}

#[test]
fn test_concurrent_inspection_shares_cache() {
    let cache = Arc::new(InspectionCache::new());
    let inspector = AttributeInspector::new(shop()).with_cache(cache.clone());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let inspector = inspector.clone();
            thread::spawn(move || {
                let path = if i % 2 == 0 { "address.city" } else { "orders.placed" };
                inspector.inspect(&user(), path).unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results
        .iter()
        .all(|r| r.len() == 2 && r[1].kind == AttributeKind::Terminal));
    assert_eq!(cache.len(), 2);
}
