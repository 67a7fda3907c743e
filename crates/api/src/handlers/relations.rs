//! Relation-listing endpoints for the admin content manager.
//!
//! "Current" lists the entries presently attached to one relation attribute
//! of one entity, in link order. "Available" lists the attachable
//! candidates: the target type's entries minus the current set and any
//! client-supplied ids to omit. Both run in preview visibility so editors
//! see drafts.

use axum::extract::{Path, Query, State};
use axum::Json;
use canopy_core::error::CoreError;
use canopy_core::populate::{
    GraphWalker, QueryParams, RelatedQuery, RelationMode,
};
use canopy_core::publication::PublicationState;
use canopy_core::sanitize::sanitize_documents;
use canopy_core::schema::{AttributeDef, SchemaSnapshot, FILE_UID};
use canopy_core::types::DbId;
use canopy_db::repositories::EntityRepo;
use canopy_db::PgEntityQuery;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::handlers::collection_types::ensure_content_type;
use crate::query::{ListQuery, RelationsQuery};
use crate::response::ResultsResponse;
use crate::state::AppState;

/// GET /content-manager/collection-types/{uid}/{id}/{field}
pub async fn current_relations(
    State(state): State<AppState>,
    Path((uid, id, field)): Path<(String, DbId, String)>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ResultsResponse<Value>>> {
    let snapshot = state.registry.snapshot();
    ensure_content_type(&snapshot, &uid)?;
    let target_uid = relation_target(&snapshot, &uid, &field)?;

    EntityRepo::find_by_id(&state.pool, &uid, id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Entity", id })?;

    let related = RelatedQuery {
        source_uid: &uid,
        source_id: Some(id),
        attribute: &field,
        target_uid: &target_uid,
        mode: RelationMode::Current,
        ids_to_omit: &[],
        params: QueryParams {
            filters: query.filter()?,
            sort: query.sort_keys()?,
            pagination: Some(query.page().unwrap_or_default()),
            published_only: false,
        },
    };

    let source = PgEntityQuery::new(state.pool.clone());
    let walker = GraphWalker::new(
        &snapshot,
        &source,
        PublicationState::Preview,
        state.walker_config(),
    );
    let page = walker.list_related(&related, None).await?;
    let results = sanitize_documents(&snapshot, &target_uid, &page.items);

    Ok(Json(ResultsResponse {
        results,
        pagination: page.meta,
    }))
}

/// GET /content-manager/relations/{uid}/{field}
pub async fn available_relations(
    State(state): State<AppState>,
    Path((uid, field)): Path<(String, String)>,
    Query(query): Query<RelationsQuery>,
) -> AppResult<Json<ResultsResponse<Value>>> {
    let snapshot = state.registry.snapshot();
    ensure_content_type(&snapshot, &uid)?;

    // Component-scoped lookups resolve the field on the component schema;
    // their current targets are inline ids, so exclusion runs entirely on
    // the client-supplied idsToOmit.
    let (holder, source_id) = match &query.component {
        Some(component) => {
            snapshot.component(component)?;
            (component.as_str(), None)
        }
        None => (uid.as_str(), query.entity_id),
    };
    let target_uid = relation_target(&snapshot, holder, &field)?;
    let ids_to_omit = query.omitted_ids()?;

    let related = RelatedQuery {
        source_uid: holder,
        source_id,
        attribute: &field,
        target_uid: &target_uid,
        mode: RelationMode::Available,
        ids_to_omit: &ids_to_omit,
        params: QueryParams {
            filters: query.filter()?,
            sort: query.sort_keys()?,
            pagination: Some(query.page()),
            published_only: false,
        },
    };

    let source = PgEntityQuery::new(state.pool.clone());
    let walker = GraphWalker::new(
        &snapshot,
        &source,
        PublicationState::Preview,
        state.walker_config(),
    );
    let page = walker.list_related(&related, None).await?;
    let results = sanitize_documents(&snapshot, &target_uid, &page.items);

    Ok(Json(ResultsResponse {
        results,
        pagination: page.meta,
    }))
}

/// The target type of a relation or media attribute; other attribute kinds
/// cannot be listed through the relation endpoints.
fn relation_target(snapshot: &SchemaSnapshot, uid: &str, field: &str) -> AppResult<String> {
    match snapshot.attribute(uid, field) {
        Some(AttributeDef::Relation { target, .. }) => Ok(target.clone()),
        Some(AttributeDef::Media { .. }) => Ok(FILE_UID.to_string()),
        Some(_) => Err(AppError::BadRequest(format!(
            "'{uid}.{field}' is not a relation attribute"
        ))),
        None => Err(AppError::BadRequest(format!(
            "'{uid}' has no attribute '{field}'"
        ))),
    }
}
