//! Shared harness for HTTP-level integration tests.
//!
//! Builds the real router (same middleware stack as `main.rs`) over a test
//! database pool and a fixed schema fixture, and provides request helpers on
//! top of `tower::ServiceExt`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use canopy_core::schema::loader::snapshot_from_values;
use canopy_core::schema::SchemaRegistry;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

use canopy_api::config::ServerConfig;
use canopy_api::router::build_app_router;
use canopy_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        schema_dir: PathBuf::from("./schemas"),
        populate_max_depth: 10,
        max_db_connections: 5,
    }
}

/// The schema fixture shared by the integration tests: a draft-and-publish
/// article type with a to-one relation, a to-many relation, and a dynamic
/// zone; a plain author type with a private field; a draft-and-publish tag
/// type.
pub fn test_registry() -> SchemaRegistry {
    let definitions = [
        json!({
            "uid": "api::article.article",
            "draftAndPublish": true,
            "attributes": {
                "title": {"type": "string", "required": true},
                "body": {"type": "text"},
                "author": {"type": "relation", "relation": "manyToOne", "target": "api::author.author"},
                "tags": {"type": "relation", "relation": "manyToMany", "target": "api::tag.tag"},
                "blocks": {"type": "dynamiczone", "components": ["shared.quote"]},
            }
        }),
        json!({
            "uid": "api::author.author",
            "attributes": {
                "name": {"type": "string", "required": true},
                "token": {"type": "password"},
            }
        }),
        json!({
            "uid": "api::tag.tag",
            "draftAndPublish": true,
            "attributes": {
                "label": {"type": "string"},
            }
        }),
        json!({
            "uid": "shared.quote",
            "kind": "component",
            "attributes": {
                "quote_body": {"type": "text", "required": true},
            }
        }),
    ];
    let snapshot = snapshot_from_values(&definitions).expect("test schema compiles");
    SchemaRegistry::new(snapshot)
}

/// Build the full application router with all middleware layers, using the
/// given database pool. Mirrors the construction in `main.rs`.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_config(pool, test_config())
}

/// Variant taking a custom config, for tests that point `schema_dir` at a
/// temporary directory.
pub fn build_test_app_with_config(pool: PgPool, config: ServerConfig) -> Router {
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        registry: Arc::new(test_registry()),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn delete(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn put_json(app: Router, uri: &str, body: Value) -> Response {
    app.oneshot(
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// POST an entity through the public API and return its id.
pub async fn create_entity(pool: &PgPool, uid: &str, data: Value) -> i64 {
    let app = build_test_app(pool.clone());
    let response = post_json(
        app,
        &format!("/content-api/collection-types/{uid}"),
        json!({ "data": data }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}
