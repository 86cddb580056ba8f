//! Procura Test Utilities
//!
//! Shared test infrastructure for the Procura workspace:
//! - Fixtures for the purchase-order scenario
//! - An in-memory relation source with call counters and failure injection
//! - Recording revalidator and remote peer doubles
//! - Proptest generators for ids, entities, and relation groups
//! - Assertions for Procura results

pub use procura_core::{
    Company, CompanyScope, DirectionFilter, Entity, FieldDescriptor, FieldRole, FieldType,
    ProcuraError, ProcuraResult, RecordId, RelationDirection, RelationGroup, RelationLink,
    RelationQuery, SchemaDescriptor, SchemaId, StorageError,
};
pub use procura_storage::{DataSource, JsonStore, StoreData};

use async_trait::async_trait;
use procura_client::RelationSource;
use procura_storage::{PageRevalidator, RemoteCachePeer};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

fn fail(reason: impl Into<String>) -> ProcuraError {
    StorageError::Upstream {
        reason: reason.into(),
    }
    .into()
}

// ============================================================================
// IN-MEMORY RELATION SOURCE
// ============================================================================

/// [`RelationSource`] over a [`JsonStore`], with per-call counters, failure
/// injection, and an optional delay before every answer.
pub struct InMemoryRelationSource {
    store: JsonStore,
    scope: CompanyScope,
    delay: Option<Duration>,
    fail_relations: bool,
    failing_entities: HashSet<(SchemaId, RecordId)>,
    failing_schemas: HashSet<SchemaId>,
    relation_calls: AtomicUsize,
    entity_fetches: Mutex<Vec<(SchemaId, RecordId)>>,
    schema_fetches: Mutex<Vec<SchemaId>>,
}

impl InMemoryRelationSource {
    pub fn new(data: StoreData) -> Self {
        Self {
            store: JsonStore::in_memory(data),
            scope: CompanyScope::unscoped(),
            delay: None,
            fail_relations: false,
            failing_entities: HashSet::new(),
            failing_schemas: HashSet::new(),
            relation_calls: AtomicUsize::new(0),
            entity_fetches: Mutex::new(Vec::new()),
            schema_fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_relations(mut self) -> Self {
        self.fail_relations = true;
        self
    }

    pub fn failing_entity(mut self, schema: impl Into<SchemaId>, id: impl Into<RecordId>) -> Self {
        self.failing_entities.insert((schema.into(), id.into()));
        self
    }

    pub fn failing_schema(mut self, schema: impl Into<SchemaId>) -> Self {
        self.failing_schemas.insert(schema.into());
        self
    }

    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    pub fn relation_calls(&self) -> usize {
        self.relation_calls.load(Ordering::SeqCst)
    }

    pub fn entity_fetches(&self) -> Vec<(SchemaId, RecordId)> {
        self.entity_fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn schema_fetches(&self) -> Vec<SchemaId> {
        self.schema_fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times `schema` was fetched.
    pub fn schema_fetch_count(&self, schema: &str) -> usize {
        self.schema_fetches()
            .iter()
            .filter(|s| s.as_str() == schema)
            .count()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RelationSource for InMemoryRelationSource {
    async fn relations(&self, query: &RelationQuery) -> ProcuraResult<Vec<RelationGroup>> {
        self.relation_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_relations {
            return Err(fail("injected relation failure"));
        }
        self.store.relations(&self.scope, query).await
    }

    async fn entity(&self, schema: &SchemaId, id: &RecordId) -> ProcuraResult<Entity> {
        self.entity_fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((schema.clone(), id.clone()));
        self.pause().await;
        if self.failing_entities.contains(&(schema.clone(), id.clone())) {
            return Err(fail(format!("injected failure for {}/{}", schema, id)));
        }
        self.store.get_record(&self.scope, schema, id).await
    }

    async fn schema(&self, schema: &SchemaId) -> ProcuraResult<SchemaDescriptor> {
        self.schema_fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(schema.clone());
        self.pause().await;
        if self.failing_schemas.contains(schema) {
            return Err(fail(format!("injected failure for schema {}", schema)));
        }
        self.store.get_schema(&self.scope, schema).await
    }
}

// ============================================================================
// INVALIDATION DOUBLES
// ============================================================================

/// Records every revalidated path. Paths listed in `failing` are recorded
/// and then fail.
#[derive(Default)]
pub struct RecordingRevalidator {
    paths: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

impl RecordingRevalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, path: impl Into<String>) -> Self {
        self.failing.insert(path.into());
        self
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PageRevalidator for RecordingRevalidator {
    async fn revalidate(&self, path: &str) -> ProcuraResult<()> {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
        if self.failing.contains(path) {
            return Err(fail(format!("injected revalidation failure for {}", path)));
        }
        Ok(())
    }
}

/// Counts remote clears.
#[derive(Default)]
pub struct RecordingPeer {
    calls: AtomicUsize,
    fail: bool,
}

impl RecordingPeer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteCachePeer for RecordingPeer {
    async fn clear_remote(&self) -> ProcuraResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(fail("injected remote failure"));
        }
        Ok(())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Procura data types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_schema_id() -> impl Strategy<Value = SchemaId> {
        "[a-z]{3,10}(_[a-z]{3,8})?".prop_map(SchemaId::new)
    }

    pub fn arb_record_id() -> impl Strategy<Value = RecordId> {
        "[A-Z]{1,4}-[0-9]{1,4}".prop_map(RecordId::new)
    }

    pub fn arb_direction() -> impl Strategy<Value = RelationDirection> {
        prop_oneof![
            Just(RelationDirection::Outgoing),
            Just(RelationDirection::Incoming),
        ]
    }

    pub fn arb_relation_type() -> impl Strategy<Value = String> {
        "[A-Z]{3,8}(_[A-Z]{3,8})?"
    }

    /// Entity with a few text attributes.
    pub fn arb_entity() -> impl Strategy<Value = Entity> {
        (
            arb_record_id(),
            proptest::collection::btree_map("[a-z]{3,8}", "[A-Za-z ]{0,12}", 0..4),
        )
            .prop_map(|(id, attrs)| {
                attrs
                    .into_iter()
                    .fold(Entity::new(id), |entity, (k, v)| entity.with_attr(k, v))
            })
    }

    /// A relation group of `schema`. Ids may repeat across groups.
    pub fn arb_relation_group(schema: SchemaId) -> impl Strategy<Value = RelationGroup> {
        (
            arb_direction(),
            arb_relation_type(),
            proptest::collection::vec(arb_entity(), 0..6),
        )
            .prop_map(move |(direction, relation_type, data)| RelationGroup {
                schema: schema.clone(),
                direction,
                relation_type,
                data,
            })
    }

    pub fn arb_relation_groups(schema: SchemaId) -> impl Strategy<Value = Vec<RelationGroup>> {
        proptest::collection::vec(arb_relation_group(schema), 0..5)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! The purchase-order scenario: one order, two line items, two vendors.

    use super::*;

    pub const PURCHASE_ORDERS: &str = "purchase_orders";
    pub const LINE_ITEMS: &str = "line_items";
    pub const VENDORS: &str = "vendors";
    pub const CONTAINS_ITEM: &str = "CONTAINS_ITEM";
    pub const BACKORDERED_FOR: &str = "BACKORDERED_FOR";

    pub fn purchase_order_schema() -> SchemaDescriptor {
        SchemaDescriptor::new(PURCHASE_ORDERS, "Purchase Orders").with_field(
            FieldDescriptor::new("poNumber", FieldType::Text).with_role(FieldRole::Title),
        )
    }

    pub fn line_item_schema() -> SchemaDescriptor {
        SchemaDescriptor::new(LINE_ITEMS, "Line Items")
            .with_field(
                FieldDescriptor::new("description", FieldType::Text).with_role(FieldRole::Title),
            )
            .with_field(FieldDescriptor::picker("vendorId", VENDORS))
            .with_field(FieldDescriptor::new("quantity", FieldType::Number))
    }

    pub fn vendor_schema() -> SchemaDescriptor {
        SchemaDescriptor::new(VENDORS, "Vendors").with_field(
            FieldDescriptor::new("companyName", FieldType::Text).with_role(FieldRole::Title),
        )
    }

    pub fn link(
        source_schema: &str,
        source_id: &str,
        target_schema: &str,
        target_id: &str,
        relation_type: &str,
    ) -> RelationLink {
        RelationLink {
            source_schema: SchemaId::new(source_schema),
            source_id: RecordId::new(source_id),
            target_schema: SchemaId::new(target_schema),
            target_id: RecordId::new(target_id),
            relation_type: relation_type.to_string(),
        }
    }

    pub fn company(id: &str, name: &str) -> Company {
        Company {
            id: id.to_string(),
            name: name.to_string(),
            extra: Default::default(),
        }
    }

    /// PO-1 contains ITEM-A (vendor V-1) and ITEM-B (vendor V-2).
    pub fn purchase_order_data() -> StoreData {
        StoreData::default()
            .with_schema(purchase_order_schema())
            .with_schema(line_item_schema())
            .with_schema(vendor_schema())
            .with_record(
                PURCHASE_ORDERS,
                Entity::new("PO-1").with_attr("poNumber", "PO-2024-001"),
            )
            .with_record(
                LINE_ITEMS,
                Entity::new("ITEM-A")
                    .with_attr("description", "Steel bolts")
                    .with_attr("vendorId", "V-1")
                    .with_attr("quantity", 100),
            )
            .with_record(
                LINE_ITEMS,
                Entity::new("ITEM-B")
                    .with_attr("description", "Copper wire")
                    .with_attr("vendorId", "V-2")
                    .with_attr("quantity", 20),
            )
            .with_record(VENDORS, Entity::new("V-1").with_attr("companyName", "Acme Supplies"))
            .with_record(VENDORS, Entity::new("V-2").with_attr("companyName", "Globex Industrial"))
            .with_relation(link(PURCHASE_ORDERS, "PO-1", LINE_ITEMS, "ITEM-A", CONTAINS_ITEM))
            .with_relation(link(PURCHASE_ORDERS, "PO-1", LINE_ITEMS, "ITEM-B", CONTAINS_ITEM))
            .with_company(company("c-1", "Acme Holdings"))
    }

    /// The purchase-order scenario plus incoming links to PO-1:
    /// - ITEM-A again (already reached outgoing)
    /// - ITEM-C, whose vendor V-3 has only a `name`
    /// - ITEM-D, whose vendor V-404 does not exist
    /// - ITEM-E, whose vendor V-5 has only a `title`
    pub fn mixed_direction_data() -> StoreData {
        purchase_order_data()
            .with_record(
                LINE_ITEMS,
                Entity::new("ITEM-C")
                    .with_attr("description", "Rivets")
                    .with_attr("vendorId", "V-3"),
            )
            .with_record(
                LINE_ITEMS,
                Entity::new("ITEM-D")
                    .with_attr("description", "Washers")
                    .with_attr("vendorId", "V-404"),
            )
            .with_record(
                LINE_ITEMS,
                Entity::new("ITEM-E")
                    .with_attr("description", "Brackets")
                    .with_attr("vendorId", "V-5"),
            )
            .with_record(VENDORS, Entity::new("V-3").with_attr("name", "Initech"))
            .with_record(VENDORS, Entity::new("V-5").with_attr("title", "Umbrella Corp"))
            .with_relation(link(LINE_ITEMS, "ITEM-A", PURCHASE_ORDERS, "PO-1", BACKORDERED_FOR))
            .with_relation(link(LINE_ITEMS, "ITEM-C", PURCHASE_ORDERS, "PO-1", BACKORDERED_FOR))
            .with_relation(link(LINE_ITEMS, "ITEM-D", PURCHASE_ORDERS, "PO-1", BACKORDERED_FOR))
            .with_relation(link(LINE_ITEMS, "ITEM-E", PURCHASE_ORDERS, "PO-1", BACKORDERED_FOR))
    }

    pub fn purchase_order_store() -> JsonStore {
        JsonStore::in_memory(purchase_order_data())
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Procura results.

    use super::*;

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &ProcuraResult<T>) {
        match result {
            Err(err) if err.is_not_found() => {}
            other => panic!("Expected a not-found error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_upstream<T: std::fmt::Debug>(result: &ProcuraResult<T>) {
        match result {
            Err(ProcuraError::Storage(StorageError::Upstream { .. })) => {}
            other => panic!("Expected an upstream error, got: {:?}", other),
        }
    }

    /// Assert the ids of `entities`, in order.
    #[track_caller]
    pub fn assert_ids<'a>(ids: impl IntoIterator<Item = &'a RecordId>, expected: &[&str]) {
        let actual: Vec<&str> = ids.into_iter().map(|id| id.as_str()).collect();
        assert_eq!(actual, expected, "Unexpected entity ids");
    }
}

// ============================================================================
// TESTS
// ============================================================================
