//! Relation resolution against the in-memory purchase-order fixtures.

use procura_client::{RelationResolver, RelationView, ResolveOutcome, ResolveRequest};
use procura_core::{Entity, RelationDirection, RelationError};
use procura_test_utils::fixtures::{self, BACKORDERED_FOR, LINE_ITEMS, PURCHASE_ORDERS, VENDORS};
use procura_test_utils::{assertions, InMemoryRelationSource, StoreData};
use std::sync::Arc;
use std::time::Duration;

fn po_items() -> ResolveRequest {
    ResolveRequest::new(PURCHASE_ORDERS, "PO-1", LINE_ITEMS)
}

async fn resolve_view(source: InMemoryRelationSource, request: ResolveRequest) -> (RelationView, Arc<InMemoryRelationSource>) {
    let source = Arc::new(source);
    let resolver = RelationResolver::new(Arc::clone(&source));
    match resolver.resolve(request).await {
        ResolveOutcome::Resolved(view) => (view, source),
        other => panic!("expected a resolved view, got {other:?}"),
    }
}

fn label(view: &RelationView, id: &str, field: &str) -> Option<String> {
    view.entity(id)
        .and_then(|e| e.resolved_field(field))
        .map(|r| r.resolved_label.clone())
}

#[tokio::test]
async fn test_purchase_order_line_items_with_vendor_labels() {
    let (view, source) = resolve_view(
        InMemoryRelationSource::new(fixtures::purchase_order_data()),
        po_items(),
    )
    .await;

    assertions::assert_ids(view.entities.iter().map(|e| e.id()), &["ITEM-A", "ITEM-B"]);
    assert_eq!(label(&view, "ITEM-A", "vendorId").as_deref(), Some("Acme Supplies"));
    assert_eq!(label(&view, "ITEM-B", "vendorId").as_deref(), Some("Globex Industrial"));
    assert_eq!(
        view.directions.iter().copied().collect::<Vec<_>>(),
        vec![RelationDirection::Outgoing]
    );
    assert_eq!(view.relation_types, vec!["Contains Item"]);
    assert!(view.error.is_none());

    let item = view.entity("ITEM-A").map(|e| (e.relation_type.clone(), e.direction));
    assert_eq!(item, Some(("CONTAINS_ITEM".to_string(), RelationDirection::Outgoing)));

    // One edge request, one fetch per distinct schema.
    assert_eq!(source.relation_calls(), 1);
    assert_eq!(source.schema_fetch_count(LINE_ITEMS), 1);
    assert_eq!(source.schema_fetch_count(VENDORS), 1);
    assert_eq!(source.entity_fetches().len(), 2);
}

#[tokio::test]
async fn test_both_directions_are_merged_without_duplicates() {
    let (view, source) = resolve_view(
        InMemoryRelationSource::new(fixtures::mixed_direction_data()),
        po_items(),
    )
    .await;

    assertions::assert_ids(
        view.entities.iter().map(|e| e.id()),
        &["ITEM-A", "ITEM-B", "ITEM-C", "ITEM-D", "ITEM-E"],
    );
    // ITEM-A is reached both ways and keeps its first tag.
    assert_eq!(
        view.entity("ITEM-A").map(|e| e.direction),
        Some(RelationDirection::Outgoing)
    );
    assert_eq!(
        view.entity("ITEM-C").map(|e| e.relation_type.as_str()),
        Some(BACKORDERED_FOR)
    );
    assert_eq!(view.directions.len(), 2);
    assert_eq!(view.relation_types, vec!["Contains Item", "Backordered For"]);

    // Each distinct vendor is fetched once, missing ones included.
    assert_eq!(source.entity_fetches().len(), 5);
    assert_eq!(source.schema_fetch_count(VENDORS), 1);
}

#[tokio::test]
async fn test_type_filter_narrows_to_one_direction() {
    let (view, _) = resolve_view(
        InMemoryRelationSource::new(fixtures::mixed_direction_data()),
        po_items().with_relation_type(BACKORDERED_FOR),
    )
    .await;

    assertions::assert_ids(
        view.entities.iter().map(|e| e.id()),
        &["ITEM-A", "ITEM-C", "ITEM-D", "ITEM-E"],
    );
    assert_eq!(
        view.directions.iter().copied().collect::<Vec<_>>(),
        vec![RelationDirection::Incoming]
    );
    assert_eq!(view.relation_types, vec!["Backordered For"]);
}

#[tokio::test]
async fn test_label_fallback_chain() {
    let data = fixtures::mixed_direction_data()
        .with_record(
            LINE_ITEMS,
            Entity::new("ITEM-F")
                .with_attr("description", "Gaskets")
                .with_attr("vendorId", "V-6"),
        )
        .with_record(VENDORS, Entity::new("V-6").with_attr("rating", 5))
        .with_relation(fixtures::link(LINE_ITEMS, "ITEM-F", PURCHASE_ORDERS, "PO-1", BACKORDERED_FOR));
    let (view, _) = resolve_view(InMemoryRelationSource::new(data), po_items()).await;

    // Title-role field, then name, then title, then the raw key.
    assert_eq!(label(&view, "ITEM-A", "vendorId").as_deref(), Some("Acme Supplies"));
    assert_eq!(label(&view, "ITEM-C", "vendorId").as_deref(), Some("Initech"));
    assert_eq!(label(&view, "ITEM-E", "vendorId").as_deref(), Some("Umbrella Corp"));
    assert_eq!(label(&view, "ITEM-F", "vendorId").as_deref(), Some("V-6"));

    // A missing referenced record leaves the field unresolved.
    let missing = view.entity("ITEM-D");
    assert!(missing.and_then(|e| e.resolved_field("vendorId")).is_none());
    assert_eq!(
        missing.and_then(|e| e.display_value("vendorId")).as_deref(),
        Some("V-404")
    );
}

#[tokio::test]
async fn test_failed_vendor_fetch_leaves_other_fields_resolved() {
    let source = InMemoryRelationSource::new(fixtures::purchase_order_data()).failing_entity(VENDORS, "V-2");
    let (view, _) = resolve_view(source, po_items()).await;

    assert_eq!(view.len(), 2);
    assert_eq!(label(&view, "ITEM-A", "vendorId").as_deref(), Some("Acme Supplies"));
    assert!(label(&view, "ITEM-B", "vendorId").is_none());
}

#[tokio::test]
async fn test_referenced_schema_unavailable_falls_back_to_raw_key() {
    let source = InMemoryRelationSource::new(fixtures::purchase_order_data()).failing_schema(VENDORS);
    let (view, _) = resolve_view(source, po_items()).await;

    // Vendor records carry only their title-role field, which is unknown
    // without the schema.
    assert_eq!(label(&view, "ITEM-A", "vendorId").as_deref(), Some("V-1"));
    assert_eq!(label(&view, "ITEM-B", "vendorId").as_deref(), Some("V-2"));
}

#[tokio::test]
async fn test_target_schema_unavailable_skips_picker_resolution() {
    let source = InMemoryRelationSource::new(fixtures::purchase_order_data()).failing_schema(LINE_ITEMS);
    let (view, source) = resolve_view(source, po_items()).await;

    assert_eq!(view.len(), 2);
    assert!(view.entities.iter().all(|e| e.resolved.is_empty()));
    assert!(source.entity_fetches().is_empty());
}

#[tokio::test]
async fn test_edge_fetch_failure_is_reported_in_view() {
    let source = InMemoryRelationSource::new(fixtures::purchase_order_data()).failing_relations();
    let (view, source) = resolve_view(source, po_items()).await;

    assert!(view.is_empty());
    assert!(matches!(
        view.error,
        Some(RelationError::FetchFailed { ref schema, ref id, .. })
            if schema == PURCHASE_ORDERS && id == "PO-1"
    ));
    assert!(source.schema_fetches().is_empty());
}

#[tokio::test]
async fn test_entity_without_links_yields_empty_view() {
    let data = StoreData::default().with_schema(fixtures::purchase_order_schema());
    let (view, _) = resolve_view(InMemoryRelationSource::new(data), po_items()).await;

    assert!(view.is_empty());
    assert!(view.directions.is_empty());
    assert!(view.relation_types.is_empty());
    assert!(view.error.is_none());
}

#[tokio::test]
async fn test_re_resolution_is_idempotent() {
    let source = Arc::new(InMemoryRelationSource::new(fixtures::mixed_direction_data()));
    let resolver = RelationResolver::new(Arc::clone(&source));

    let first = resolver.resolve(po_items()).await;
    let second = resolver.resolve(po_items()).await;

    assert!(first.view().is_some());
    assert_eq!(first, second);
    assert_eq!(resolver.current().as_ref(), second.view());
    assert_eq!(source.relation_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_identical_request_in_flight_is_skipped() {
    let source = Arc::new(
        InMemoryRelationSource::new(fixtures::purchase_order_data()).with_delay(Duration::from_millis(50)),
    );
    let resolver = RelationResolver::new(Arc::clone(&source));

    let (first, second) = tokio::join!(resolver.resolve(po_items()), resolver.resolve(po_items()));

    assert!(first.view().is_some());
    assert_eq!(second, ResolveOutcome::InFlight);
    assert_eq!(source.relation_calls(), 1);

    // The guard is released once the first call finishes.
    assert!(resolver.resolve(po_items()).await.view().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_newer_request_supersedes_older() {
    let source = Arc::new(
        InMemoryRelationSource::new(fixtures::mixed_direction_data()).with_delay(Duration::from_millis(50)),
    );
    let resolver = RelationResolver::new(Arc::clone(&source));
    let older = po_items();
    let newer = po_items().with_relation_type(BACKORDERED_FOR);

    let (first, second) = tokio::join!(resolver.resolve(older), resolver.resolve(newer));

    assert_eq!(first, ResolveOutcome::Superseded);
    let view = second.view().cloned();
    assert!(view.is_some());
    assert_eq!(resolver.current(), view);
}

#[tokio::test(start_paused = true)]
async fn test_reissued_request_wins_over_intermediate_one() {
    let source = Arc::new(
        InMemoryRelationSource::new(fixtures::mixed_direction_data()).with_delay(Duration::from_millis(50)),
    );
    let resolver = RelationResolver::new(Arc::clone(&source));
    let unfiltered = po_items();
    let filtered = po_items().with_relation_type(BACKORDERED_FOR);

    let (first, second, third) = tokio::join!(
        resolver.resolve(unfiltered.clone()),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            resolver.resolve(filtered).await
        },
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            resolver.resolve(unfiltered.clone()).await
        },
    );

    assert_eq!(third, ResolveOutcome::InFlight);
    assert_eq!(second, ResolveOutcome::Superseded);
    let view = first.into_view();
    assert_eq!(
        view.as_ref().map(|v| v.relation_types.clone()),
        Some(vec!["Contains Item".to_string(), "Backordered For".to_string()])
    );
    assert_eq!(resolver.current(), view);
}
