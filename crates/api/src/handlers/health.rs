//! Health check handler.

use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::error::AppResult;
use crate::state::AppState;

/// GET /healthz — liveness probe, includes a database round trip.
pub async fn healthz(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    canopy_db::health_check(&state.pool).await?;
    Ok(Json(json!({ "status": "ok" })))
}
