use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use canopy_core::error::CoreError;
use serde_json::{json, Value};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce the standard error envelope:
/// `{ "data": null, "error": { "status", "name", "message", "details" } }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `canopy_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A route addresses a content type the schema does not define.
    #[error("Content type '{0}' not found")]
    UnknownContentType(String),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, name, message, details) = match &self {
            AppError::Core(core) => match core {
                CoreError::Validation(errors) => (
                    StatusCode::BAD_REQUEST,
                    "ValidationError",
                    core.to_string(),
                    json!({ "errors": errors }),
                ),
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NotFoundError",
                    format!("{entity} with id {id} not found"),
                    Value::Null,
                ),
                CoreError::Application { key, message } => (
                    StatusCode::BAD_REQUEST,
                    "ApplicationError",
                    message.clone(),
                    json!({ "key": key }),
                ),
                CoreError::Config(msg) => {
                    tracing::error!(error = %msg, "Configuration error");
                    internal()
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            AppError::Database(err) => classify_sqlx_error(err),

            AppError::UnknownContentType(uid) => (
                StatusCode::NOT_FOUND,
                "NotFoundError",
                format!("Content type '{uid}' not found"),
                Value::Null,
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BadRequestError",
                msg.clone(),
                Value::Null,
            ),
        };

        let body = json!({
            "data": Value::Null,
            "error": {
                "status": status.as_u16(),
                "name": name,
                "message": message,
                "details": details,
            },
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String, Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "InternalServerError",
        "An internal server error occurred".to_string(),
        Value::Null,
    )
}

/// Classify a sqlx error into the envelope fields.
///
/// - `RowNotFound` maps to 404.
/// - The folder sibling-name unique index maps to a 400 validation error.
/// - Foreign-key violations map to 400 (the referenced row does not exist).
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String, Value) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NotFoundError",
            "Resource not found".to_string(),
            Value::Null,
        ),
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint == "idx_folders_sibling_name" {
                    return (
                        StatusCode::BAD_REQUEST,
                        "ValidationError",
                        "A folder with this name already exists".to_string(),
                        json!({ "errors": [{
                            "path": "name",
                            "message": "A folder with this name already exists",
                            "name": "unique",
                        }] }),
                    );
                }
                (
                    StatusCode::CONFLICT,
                    "ConflictError",
                    format!("Duplicate value violates unique constraint: {constraint}"),
                    Value::Null,
                )
            }
            Some("23503") => (
                StatusCode::BAD_REQUEST,
                "ValidationError",
                "A referenced entity does not exist".to_string(),
                Value::Null,
            ),
            _ => {
                tracing::error!(error = %db_err, "Database error");
                internal()
            }
        },
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
