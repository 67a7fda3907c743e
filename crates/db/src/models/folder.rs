//! Folder entity model and DTOs.

use canopy_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `folders` table. `path` is the slash-joined chain of
/// ancestor `path_id` segments.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Folder {
    pub id: DbId,
    pub name: String,
    pub path_id: DbId,
    pub path: String,
    pub parent_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a folder. `parent` is `None` for a root-level folder.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFolder {
    pub name: String,
    pub parent: Option<DbId>,
}

/// DTO for renaming and/or moving a folder. Absent fields are unchanged;
/// `parent: null` moves the folder to the root level.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFolder {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub parent: Option<Option<DbId>>,
}

/// Distinguishes an absent key from an explicit `null`.
fn deserialize_some<'de, D>(deserializer: D) -> Result<Option<Option<DbId>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}
