//! File entity model and DTOs.

use canopy_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `files` table. `folder_path` mirrors the containing
/// folder's materialized path (`/` when the file sits at the root).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct File {
    pub id: DbId,
    pub name: String,
    pub alternative_text: Option<String>,
    pub url: String,
    pub mime: Option<String>,
    pub size: Option<f64>,
    pub folder_id: Option<DbId>,
    #[serde(skip_serializing)]
    pub folder_path: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering a file.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFile {
    pub name: String,
    pub alternative_text: Option<String>,
    pub url: String,
    pub mime: Option<String>,
    pub size: Option<f64>,
    pub folder: Option<DbId>,
}

/// DTO for updating file metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFile {
    pub name: Option<String>,
    pub alternative_text: Option<String>,
}
