//! Administrative endpoints.

use axum::extract::State;
use axum::Json;
use canopy_core::schema::loader;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /admin/schema/reload
///
/// Recompiles the schema directory and swaps the registry snapshot. A
/// compile failure leaves the running schema untouched.
pub async fn reload_schema(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Value>>> {
    let snapshot = loader::load_dir(&state.config.schema_dir)?;
    let content_types = snapshot.content_type_uids().count();
    state.registry.install(snapshot);
    tracing::info!(content_types, "schema reloaded");
    Ok(Json(DataResponse {
        data: json!({ "contentTypes": content_types }),
    }))
}
