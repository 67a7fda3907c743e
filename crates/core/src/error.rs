//! Domain-level error taxonomy.
//!
//! Validation failures are path-addressed and collected in full before any
//! mutation runs; application errors carry a stable machine-readable key
//! alongside the human message so clients can branch without string matching.

use serde::Serialize;

use crate::types::DbId;

/// A single field-level validation failure.
///
/// `path` is the dotted attribute path that failed (`"blocks.0.body"`),
/// `name` the error class (`"required"`, `"maxLength"`, ...).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub message: String,
    pub name: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>, name: &str) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            name: name.to_string(),
        }
    }
}

/// Domain error for the content engine.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed input. Carries every failing field, not just the first.
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    /// A referenced entity does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// A domain rule was violated (moving a folder into itself, deleting a
    /// default resource, ...). `key` is stable and machine-readable.
    #[error("{message}")]
    Application { key: &'static str, message: String },

    /// Broken runtime configuration (a populate target with no schema, an
    /// unparsable content-type definition). Fatal, never user-retriable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else that should surface as a 500.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Single-field validation failure.
    pub fn validation(path: impl Into<String>, message: impl Into<String>, name: &str) -> Self {
        CoreError::Validation(vec![FieldError::new(path, message, name)])
    }

    pub fn application(key: &'static str, message: impl Into<String>) -> Self {
        CoreError::Application {
            key,
            message: message.into(),
        }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.path, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias used throughout the core crate.
pub type CoreResult<T> = Result<T, CoreError>;
