use futures_util::future::join_all;
use procura_core::{
    humanize_relation_type, Entity, ProcuraResult, RecordId, RelationDirection, RelationError,
    RelationGroup, RelationQuery, ResolutionError, ResolvedEntity, ResolvedReference,
    SchemaDescriptor, SchemaId,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::source::RelationSource;

/// Identifies one resolution: a source entity, the schema on the other end,
/// and an optional relation type filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolveRequest {
    pub source_schema: SchemaId,
    pub source_id: RecordId,
    pub target_schema: SchemaId,
    pub relation_type: Option<String>,
}

impl ResolveRequest {
    pub fn new(
        source_schema: impl Into<SchemaId>,
        source_id: impl Into<RecordId>,
        target_schema: impl Into<SchemaId>,
    ) -> Self {
        Self {
            source_schema: source_schema.into(),
            source_id: source_id.into(),
            target_schema: target_schema.into(),
            relation_type: None,
        }
    }

    pub fn with_relation_type(mut self, relation_type: impl Into<String>) -> Self {
        self.relation_type = Some(relation_type.into());
        self
    }
}

/// What a table of related entities renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationView {
    pub entities: Vec<ResolvedEntity>,
    pub directions: BTreeSet<RelationDirection>,
    /// Humanized relation types in first-seen order.
    pub relation_types: Vec<String>,
    /// Set when the edges themselves could not be fetched.
    pub error: Option<RelationError>,
}

impl RelationView {
    fn failed(error: RelationError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity(&self, id: &str) -> Option<&ResolvedEntity> {
        self.entities.iter().find(|e| e.id().as_str() == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    Resolved(RelationView),
    /// The same request was already running on this resolver. That running
    /// call publishes its view unless a different request follows.
    InFlight,
    /// A newer request was issued while this one ran. Its view was dropped.
    Superseded,
}

impl ResolveOutcome {
    pub fn view(&self) -> Option<&RelationView> {
        match self {
            Self::Resolved(view) => Some(view),
            _ => None,
        }
    }

    pub fn into_view(self) -> Option<RelationView> {
        match self {
            Self::Resolved(view) => Some(view),
            _ => None,
        }
    }
}

#[derive(Default)]
struct GuardState {
    in_flight: HashSet<ResolveRequest>,
    latest: Option<ResolveRequest>,
    current: Option<RelationView>,
}

/// Removes its request from the in-flight set when dropped.
struct InFlightTicket<'a> {
    state: &'a Mutex<GuardState>,
    request: ResolveRequest,
}

impl Drop for InFlightTicket<'_> {
    fn drop(&mut self) {
        lock(self.state).in_flight.remove(&self.request);
    }
}

fn lock(state: &Mutex<GuardState>) -> MutexGuard<'_, GuardState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct RelationResolver<S: RelationSource + ?Sized> {
    source: Arc<S>,
    state: Mutex<GuardState>,
}

impl<S: RelationSource + ?Sized> RelationResolver<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            state: Mutex::new(GuardState::default()),
        }
    }

    /// The last view published by a request that was still the latest when
    /// it finished.
    pub fn current(&self) -> Option<RelationView> {
        lock(&self.state).current.clone()
    }

    pub async fn resolve(&self, request: ResolveRequest) -> ResolveOutcome {
        {
            let mut state = lock(&self.state);
            let fresh = state.in_flight.insert(request.clone());
            // The running copy of a re-issued request becomes the latest again.
            state.latest = Some(request.clone());
            if !fresh {
                debug!(source = %request.source_id, target = %request.target_schema, "Resolution already in flight");
                return ResolveOutcome::InFlight;
            }
        }
        let _ticket = InFlightTicket {
            state: &self.state,
            request: request.clone(),
        };

        let view = self.build_view(&request).await;

        let mut state = lock(&self.state);
        if state.latest.as_ref() != Some(&request) {
            debug!(source = %request.source_id, target = %request.target_schema, "Resolution superseded");
            return ResolveOutcome::Superseded;
        }
        state.current = Some(view.clone());
        ResolveOutcome::Resolved(view)
    }

    async fn build_view(&self, request: &ResolveRequest) -> RelationView {
        let query = RelationQuery::between(
            request.source_schema.clone(),
            request.source_id.clone(),
            request.target_schema.clone(),
        );
        let groups = match self.source.relations(&query).await {
            Ok(groups) => groups,
            Err(err) => {
                let error = RelationError::FetchFailed {
                    schema: request.source_schema.to_string(),
                    id: request.source_id.to_string(),
                    reason: err.to_string(),
                };
                warn!(error = %error, "Relation fetch failed");
                return RelationView::failed(error);
            }
        };

        let mut view = flatten_groups(&groups, &request.target_schema, request.relation_type.as_deref());

        match self.source.schema(&request.target_schema).await {
            Ok(schema) if schema.has_pickers() => {
                self.resolve_pickers(&schema, &mut view.entities).await;
            }
            Ok(_) => {}
            Err(err) => {
                let error = ResolutionError::SchemaUnavailable {
                    schema: request.target_schema.to_string(),
                    reason: err.to_string(),
                };
                warn!(error = %error, "Skipping picker resolution");
            }
        }
        view
    }

    async fn resolve_pickers(&self, schema: &SchemaDescriptor, entities: &mut [ResolvedEntity]) {
        let pickers: Vec<(String, SchemaId)> = schema
            .picker_fields()
            .filter_map(|f| f.picker_target().map(|t| (f.name.clone(), t.clone())))
            .collect();

        let mut wanted: BTreeSet<(SchemaId, String)> = BTreeSet::new();
        for entity in entities.iter() {
            for (field, target) in &pickers {
                if let Some(value) = entity.entity.attr_text(field) {
                    wanted.insert((target.clone(), value));
                }
            }
        }
        if wanted.is_empty() {
            return;
        }

        let fetched = join_all(wanted.into_iter().map(|(target, value)| async move {
            let result = self
                .source
                .entity(&target, &RecordId::new(value.as_str()))
                .await;
            (target, value, result)
        }))
        .await;

        let mut records: BTreeMap<(SchemaId, String), Entity> = BTreeMap::new();
        for (target, value, result) in fetched {
            match result {
                Ok(record) => {
                    records.insert((target, value), record);
                }
                Err(err) => {
                    let error = ResolutionError::RecordFetchFailed {
                        schema: target.to_string(),
                        id: value,
                        reason: err.to_string(),
                    };
                    warn!(error = %error, "Picker value left unresolved");
                }
            }
        }

        let schemas = self.referenced_schemas(schema, &records).await;

        let resolved: BTreeMap<(SchemaId, String), ResolvedReference> = records
            .into_iter()
            .map(|((target, value), record)| {
                let resolved_label = record
                    .label(schemas.get(&target))
                    .unwrap_or_else(|| value.clone());
                (
                    (target, value),
                    ResolvedReference {
                        record,
                        resolved_label,
                    },
                )
            })
            .collect();

        for entity in entities.iter_mut() {
            for (field, target) in &pickers {
                let Some(value) = entity.entity.attr_text(field) else {
                    continue;
                };
                if let Some(reference) = resolved.get(&(target.clone(), value)) {
                    entity.resolved.insert(field.clone(), reference.clone());
                }
            }
        }
    }

    /// One schema fetch per distinct referenced schema. The target schema is
    /// reused when a picker points back at it.
    async fn referenced_schemas(
        &self,
        target: &SchemaDescriptor,
        records: &BTreeMap<(SchemaId, String), Entity>,
    ) -> BTreeMap<SchemaId, SchemaDescriptor> {
        let distinct: BTreeSet<&SchemaId> = records.keys().map(|(schema, _)| schema).collect();

        let mut schemas = BTreeMap::new();
        let mut to_fetch = Vec::new();
        for schema_id in distinct {
            if schema_id == &target.id {
                schemas.insert(schema_id.clone(), target.clone());
            } else {
                to_fetch.push(schema_id.clone());
            }
        }

        let fetched: Vec<(SchemaId, ProcuraResult<SchemaDescriptor>)> =
            join_all(to_fetch.into_iter().map(|schema_id| async move {
                let result = self.source.schema(&schema_id).await;
                (schema_id, result)
            }))
            .await;

        for (schema_id, result) in fetched {
            match result {
                Ok(schema) => {
                    schemas.insert(schema_id, schema);
                }
                Err(err) => {
                    let error = ResolutionError::SchemaUnavailable {
                        schema: schema_id.to_string(),
                        reason: err.to_string(),
                    };
                    warn!(error = %error, "Labels fall back to name/title");
                }
            }
        }
        schemas
    }
}

/// Keep the groups that point at `target_schema` (and carry
/// `relation_type`, when given), then flatten them in edge order. An entity
/// reached by several edges is kept once, tagged by the first.
pub fn flatten_groups(
    groups: &[RelationGroup],
    target_schema: &SchemaId,
    relation_type: Option<&str>,
) -> RelationView {
    let mut view = RelationView::default();
    let mut seen_ids: HashSet<RecordId> = HashSet::new();
    let mut seen_types: HashSet<&str> = HashSet::new();

    let matching = groups.iter().filter(|g| {
        &g.schema == target_schema && relation_type.map_or(true, |t| g.relation_type == t)
    });
    for group in matching {
        if group.data.is_empty() {
            continue;
        }
        view.directions.insert(group.direction);
        if seen_types.insert(group.relation_type.as_str()) {
            view.relation_types.push(humanize_relation_type(&group.relation_type));
        }
        for entity in &group.data {
            if seen_ids.insert(entity.id.clone()) {
                view.entities.push(ResolvedEntity::new(
                    entity.clone(),
                    group.relation_type.clone(),
                    group.direction,
                ));
            }
        }
    }
    view
}
