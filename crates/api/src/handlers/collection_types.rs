//! Entity CRUD, publication actions, and the populate/sanitize pipeline.
//!
//! Write payloads arrive as `{ "data": { ... } }`. Relation and media
//! attributes of content types are split out of the document and stored as
//! link rows; everything else lands in the JSONB document. Every response
//! body goes through the walker (even without a populate, for the output
//! shape) and the sanitizer.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use canopy_core::error::CoreError;
use canopy_core::populate::{
    resolve, EntityQuery, GraphWalker, PopulateSpec, QueryParams,
};
use canopy_core::publication::PublicationState;
use canopy_core::sanitize::{sanitize_document, sanitize_documents};
use canopy_core::schema::{AttributeDef, SchemaSnapshot, FILE_UID};
use canopy_core::types::{DbId, JsonMap};
use canopy_core::validate::validate_document;
use canopy_db::repositories::{EntityRepo, LinkRepo};
use canopy_db::PgEntityQuery;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::query::ListQuery;
use crate::response::{CollectionResponse, DataResponse};
use crate::state::AppState;

/// GET /collection-types/{uid}
pub async fn list_entities(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<CollectionResponse<Value>>> {
    let snapshot = state.registry.snapshot();
    ensure_content_type(&snapshot, &uid)?;

    let publication = query.state();
    let spec = resolve_spec(&snapshot, &uid, &query)?;
    let params = QueryParams {
        filters: query.filter()?,
        sort: query.sort_keys()?,
        pagination: query.page(),
        published_only: publication.published_only(&snapshot, &uid),
    };

    let source = PgEntityQuery::new(state.pool.clone());
    let page = source.find_many(&uid, &params).await?;
    let walker = GraphWalker::new(&snapshot, &source, publication, state.walker_config());
    let populated = walker.populate_page(&uid, page, spec.as_ref()).await?;
    let data = sanitize_documents(&snapshot, &uid, &populated.items);

    Ok(Json(CollectionResponse::new(data, populated.meta)))
}

/// GET /collection-types/{uid}/{id}
pub async fn get_entity(
    State(state): State<AppState>,
    Path((uid, id)): Path<(String, DbId)>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<DataResponse<Value>>> {
    let snapshot = state.registry.snapshot();
    ensure_content_type(&snapshot, &uid)?;

    let publication = query.state();
    let spec = resolve_spec(&snapshot, &uid, &query)?;
    let row = EntityRepo::find_by_id(&state.pool, &uid, id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Entity", id })?;
    if !publication.admits(&snapshot, &uid, row.published_at) {
        return Err(CoreError::NotFound { entity: "Entity", id }.into());
    }

    let data = render(&state, &snapshot, &uid, row.into_record(), spec.as_ref(), publication)
        .await?;
    Ok(Json(DataResponse { data }))
}

/// POST /collection-types/{uid}
pub async fn create_entity(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Query(query): Query<ListQuery>,
    Json(body): Json<Value>,
) -> AppResult<(StatusCode, Json<DataResponse<Value>>)> {
    let snapshot = state.registry.snapshot();
    ensure_content_type(&snapshot, &uid)?;

    let input = data_object(&body)?;
    validate_document(&snapshot, &uid, input, false)?;
    let spec = resolve_spec(&snapshot, &uid, &query)?;

    let (document, links) = split_document(&snapshot, &uid, input, JsonMap::new());
    // Types without draft/publish go live on creation.
    let publish = !snapshot.draft_and_publish(&uid);
    let row = EntityRepo::create(&state.pool, &uid, &Value::Object(document), publish).await?;
    for link in &links {
        LinkRepo::replace(
            &state.pool,
            &uid,
            row.id,
            &link.field,
            &link.target_uid,
            &link.targets,
        )
        .await?;
    }
    tracing::info!(content_type = %uid, id = row.id, "entity created");

    let data = render(
        &state,
        &snapshot,
        &uid,
        row.into_record(),
        spec.as_ref(),
        PublicationState::Preview,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data })))
}

/// PUT /collection-types/{uid}/{id}
pub async fn update_entity(
    State(state): State<AppState>,
    Path((uid, id)): Path<(String, DbId)>,
    Query(query): Query<ListQuery>,
    Json(body): Json<Value>,
) -> AppResult<Json<DataResponse<Value>>> {
    let snapshot = state.registry.snapshot();
    ensure_content_type(&snapshot, &uid)?;

    let input = data_object(&body)?;
    validate_document(&snapshot, &uid, input, true)?;
    let spec = resolve_spec(&snapshot, &uid, &query)?;

    let existing = EntityRepo::find_by_id(&state.pool, &uid, id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Entity", id })?;
    let stored = match existing.document {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    };

    let (document, links) = split_document(&snapshot, &uid, input, stored);
    let row = EntityRepo::update_document(&state.pool, &uid, id, &Value::Object(document))
        .await?
        .ok_or(CoreError::NotFound { entity: "Entity", id })?;
    for link in &links {
        LinkRepo::replace(
            &state.pool,
            &uid,
            row.id,
            &link.field,
            &link.target_uid,
            &link.targets,
        )
        .await?;
    }
    tracing::info!(content_type = %uid, id, "entity updated");

    let data = render(
        &state,
        &snapshot,
        &uid,
        row.into_record(),
        spec.as_ref(),
        PublicationState::Preview,
    )
    .await?;
    Ok(Json(DataResponse { data }))
}

/// DELETE /collection-types/{uid}/{id}
pub async fn delete_entity(
    State(state): State<AppState>,
    Path((uid, id)): Path<(String, DbId)>,
) -> AppResult<Json<DataResponse<Value>>> {
    let snapshot = state.registry.snapshot();
    ensure_content_type(&snapshot, &uid)?;

    let row = EntityRepo::find_by_id(&state.pool, &uid, id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Entity", id })?;
    let data = render(
        &state,
        &snapshot,
        &uid,
        row.into_record(),
        None,
        PublicationState::Preview,
    )
    .await?;
    EntityRepo::delete(&state.pool, &uid, id).await?;
    tracing::info!(content_type = %uid, id, "entity deleted");

    Ok(Json(DataResponse { data }))
}

/// POST /collection-types/{uid}/{id}/actions/publish
pub async fn publish_entity(
    State(state): State<AppState>,
    Path((uid, id)): Path<(String, DbId)>,
) -> AppResult<Json<DataResponse<Value>>> {
    set_publication(state, uid, id, true).await
}

/// POST /collection-types/{uid}/{id}/actions/unpublish
pub async fn unpublish_entity(
    State(state): State<AppState>,
    Path((uid, id)): Path<(String, DbId)>,
) -> AppResult<Json<DataResponse<Value>>> {
    set_publication(state, uid, id, false).await
}

async fn set_publication(
    state: AppState,
    uid: String,
    id: DbId,
    publish: bool,
) -> AppResult<Json<DataResponse<Value>>> {
    let snapshot = state.registry.snapshot();
    ensure_content_type(&snapshot, &uid)?;
    if !snapshot.draft_and_publish(&uid) {
        return Err(CoreError::application(
            "entity.publicationDisabled",
            format!("Content type '{uid}' does not use draft and publish"),
        )
        .into());
    }

    let row = EntityRepo::set_published(&state.pool, &uid, id, publish)
        .await?
        .ok_or(CoreError::NotFound { entity: "Entity", id })?;
    tracing::info!(content_type = %uid, id, publish, "publication state changed");

    let data = render(
        &state,
        &snapshot,
        &uid,
        row.into_record(),
        None,
        PublicationState::Preview,
    )
    .await?;
    Ok(Json(DataResponse { data }))
}

/// Reject routes addressing content types the current schema does not
/// define (components are not routable).
pub(crate) fn ensure_content_type(snapshot: &SchemaSnapshot, uid: &str) -> AppResult<()> {
    if snapshot.get_content_type(uid).is_none() {
        return Err(AppError::UnknownContentType(uid.to_string()));
    }
    Ok(())
}

fn resolve_spec(
    snapshot: &SchemaSnapshot,
    uid: &str,
    query: &ListQuery,
) -> AppResult<Option<PopulateSpec>> {
    match query.populate_value()? {
        Some(raw) => Ok(resolve(snapshot, uid, &raw)?),
        None => Ok(None),
    }
}

fn data_object(body: &Value) -> AppResult<&JsonMap> {
    body.get("data").and_then(Value::as_object).ok_or_else(|| {
        CoreError::validation("data", "request body must carry a data object", "required").into()
    })
}

/// One relation attribute's replacement target set.
struct LinkSet {
    field: String,
    target_uid: String,
    targets: Vec<DbId>,
}

/// Merge `input` over `base` while splitting entity-level relation and media
/// attributes into link sets. Keys outside the schema are dropped.
fn split_document(
    snapshot: &SchemaSnapshot,
    uid: &str,
    input: &JsonMap,
    mut base: JsonMap,
) -> (JsonMap, Vec<LinkSet>) {
    let mut links = Vec::new();
    for (name, value) in input {
        let Some(def) = snapshot.attribute(uid, name) else {
            continue;
        };
        match def {
            AttributeDef::Relation { target, .. } => links.push(LinkSet {
                field: name.clone(),
                target_uid: target.clone(),
                targets: canopy_core::populate::inline_ids(Some(value)),
            }),
            AttributeDef::Media { .. } => links.push(LinkSet {
                field: name.clone(),
                target_uid: FILE_UID.to_string(),
                targets: canopy_core::populate::inline_ids(Some(value)),
            }),
            _ => {
                base.insert(name.clone(), value.clone());
            }
        }
    }
    (base, links)
}

/// Walk and sanitize a single entity for a response body.
async fn render(
    state: &AppState,
    snapshot: &SchemaSnapshot,
    uid: &str,
    record: canopy_core::populate::EntityRecord,
    spec: Option<&PopulateSpec>,
    publication: PublicationState,
) -> AppResult<Value> {
    let source = PgEntityQuery::new(state.pool.clone());
    let walker = GraphWalker::new(snapshot, &source, publication, state.walker_config());
    let tree = walker.populate_record(uid, &record, spec).await?;
    Ok(sanitize_document(snapshot, uid, &tree))
}
