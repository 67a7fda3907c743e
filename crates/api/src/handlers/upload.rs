//! Media-library endpoints: folder tree management, file metadata, and the
//! bulk actions.
//!
//! Folder moves are validated before any row changes: a move into the
//! folder's own subtree is rejected outright, and bulk moves pre-check every
//! folder name against the destination's children and against the other
//! folders being moved. The mutations themselves run in single repository
//! transactions, so a failure slipping past validation still leaves the tree
//! untouched.

use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use canopy_core::error::CoreError;
use canopy_core::folders;
use canopy_core::types::DbId;
use canopy_db::models::file::{CreateFile, File, UpdateFile};
use canopy_db::models::folder::{CreateFolder, Folder, UpdateFolder};
use canopy_db::repositories::{FileRepo, FolderRepo, Relocation};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FolderListQuery {
    /// When present, list the direct children of this folder (`0` is not a
    /// valid id; root-level folders are listed by omitting the key).
    pub parent: Option<DbId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FileListQuery {
    pub folder: Option<DbId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BulkActionBody {
    #[serde(default, rename = "fileIds")]
    pub file_ids: Vec<DbId>,
    #[serde(default, rename = "folderIds")]
    pub folder_ids: Vec<DbId>,
    #[serde(rename = "destinationFolderId")]
    pub destination_folder_id: Option<DbId>,
}

/// The rows a bulk action touched.
#[derive(Debug, Serialize)]
pub struct BulkActionResult {
    pub files: Vec<File>,
    pub folders: Vec<Folder>,
}

/// POST /upload/folders
pub async fn create_folder(
    State(state): State<AppState>,
    Json(input): Json<CreateFolder>,
) -> AppResult<(StatusCode, Json<DataResponse<Folder>>)> {
    folders::validate_folder_name(&input.name)?;
    if let Some(parent) = input.parent {
        FolderRepo::find_by_id(&state.pool, parent)
            .await?
            .ok_or(CoreError::NotFound { entity: "Folder", id: parent })?;
    }
    let folder = FolderRepo::create(&state.pool, &input.name, input.parent).await?;
    tracing::info!(id = folder.id, path = %folder.path, "folder created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: folder })))
}

/// GET /upload/folders
pub async fn list_folders(
    State(state): State<AppState>,
    Query(query): Query<FolderListQuery>,
) -> AppResult<Json<DataResponse<Vec<Folder>>>> {
    let data = match query.parent {
        Some(parent) => FolderRepo::list_children(&state.pool, Some(parent)).await?,
        None => FolderRepo::list_all(&state.pool).await?,
    };
    Ok(Json(DataResponse { data }))
}

/// PUT /upload/folders/{id} — rename and/or re-parent. Both changes apply in
/// one transaction; a sibling-name collision leaves the folder where and as
/// it was.
pub async fn update_folder(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateFolder>,
) -> AppResult<Json<DataResponse<Folder>>> {
    if let Some(name) = &input.name {
        folders::validate_folder_name(name)?;
    }

    let folder = FolderRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Folder", id })?;

    let relocation = match input.parent {
        Some(new_parent) => {
            let destination_path = resolve_destination(&state, new_parent).await?;
            if folders::is_self_or_descendant(&folder.path, &destination_path) {
                return Err(CoreError::application(
                    "folder.moveIntoSelf",
                    "cannot move a folder inside itself or its children",
                )
                .into());
            }
            Some(Relocation {
                new_parent,
                old_path: folder.path.clone(),
                new_path: folders::join_path(&destination_path, folder.path_id),
            })
        }
        None => None,
    };

    let folder = FolderRepo::update(&state.pool, id, input.name.as_deref(), relocation.as_ref())
        .await?
        .ok_or(CoreError::NotFound { entity: "Folder", id })?;
    tracing::info!(id, path = %folder.path, "folder updated");
    Ok(Json(DataResponse { data: folder }))
}

/// POST /upload/files — register file metadata.
pub async fn create_file(
    State(state): State<AppState>,
    Json(input): Json<CreateFile>,
) -> AppResult<(StatusCode, Json<DataResponse<File>>)> {
    if input.name.is_empty() {
        return Err(CoreError::validation("name", "name is required", "required").into());
    }
    if let Some(folder) = input.folder {
        FolderRepo::find_by_id(&state.pool, folder)
            .await?
            .ok_or(CoreError::NotFound { entity: "Folder", id: folder })?;
    }
    let file = FileRepo::create(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: file })))
}

/// GET /upload/files — files directly inside one folder (root by default).
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<FileListQuery>,
) -> AppResult<Json<DataResponse<Vec<File>>>> {
    let data = FileRepo::list_in_folder(&state.pool, query.folder).await?;
    Ok(Json(DataResponse { data }))
}

/// PUT /upload/files/{id} — metadata update.
pub async fn update_file(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateFile>,
) -> AppResult<Json<DataResponse<File>>> {
    let file = FileRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(CoreError::NotFound { entity: "File", id })?;
    Ok(Json(DataResponse { data: file }))
}

/// POST /upload/actions/bulk-delete — removes everything in one transaction
/// and returns the deleted rows.
pub async fn bulk_delete(
    State(state): State<AppState>,
    Json(body): Json<BulkActionBody>,
) -> AppResult<Json<DataResponse<BulkActionResult>>> {
    let (removed_folders, removed_files) =
        FolderRepo::bulk_delete(&state.pool, &body.folder_ids, &body.file_ids).await?;
    tracing::info!(
        files = removed_files.len(),
        folders = removed_folders.len(),
        "bulk delete"
    );
    Ok(Json(DataResponse {
        data: BulkActionResult {
            files: removed_files,
            folders: removed_folders,
        },
    }))
}

/// POST /upload/actions/bulk-move
///
/// Every validation (destination existence, subtree cycles, sibling-name
/// collisions with the destination's children and within the moving set)
/// runs before the first move; the moves themselves share one transaction.
pub async fn bulk_move(
    State(state): State<AppState>,
    Json(body): Json<BulkActionBody>,
) -> AppResult<Json<DataResponse<BulkActionResult>>> {
    let destination = body.destination_folder_id;
    let destination_path = resolve_destination(&state, destination).await?;

    let moving = FolderRepo::find_by_ids(&state.pool, &body.folder_ids).await?;
    for folder in &moving {
        if folders::is_self_or_descendant(&folder.path, &destination_path) {
            return Err(CoreError::application(
                "folder.moveIntoSelf",
                "cannot move a folder inside itself or its children",
            )
            .into());
        }
    }

    let moving_ids: HashSet<DbId> = moving.iter().map(|f| f.id).collect();
    let existing: HashSet<String> = FolderRepo::list_children(&state.pool, destination)
        .await?
        .into_iter()
        .filter(|f| !moving_ids.contains(&f.id))
        .map(|f| f.name)
        .collect();
    // A name clashes when the destination already holds it or when two of
    // the moving folders carry it (they all land under the same parent).
    let mut seen: HashSet<&str> = HashSet::new();
    let mut duplicates: Vec<&str> = Vec::new();
    for folder in &moving {
        let name = folder.name.as_str();
        if (existing.contains(name) || !seen.insert(name)) && !duplicates.contains(&name) {
            duplicates.push(name);
        }
    }
    if !duplicates.is_empty() {
        return Err(CoreError::application(
            "folder.duplicateName",
            format!("some folders already exists: {}", duplicates.join(", ")),
        )
        .into());
    }

    let moves: Vec<(DbId, Relocation)> = moving
        .iter()
        .map(|folder| {
            (
                folder.id,
                Relocation {
                    new_parent: destination,
                    old_path: folder.path.clone(),
                    new_path: folders::join_path(&destination_path, folder.path_id),
                },
            )
        })
        .collect();
    let (moved_folders, moved_files) =
        FolderRepo::bulk_move(&state.pool, &moves, &body.file_ids, destination).await?;
    tracing::info!(
        folders = moved_folders.len(),
        files = moved_files.len(),
        "bulk move"
    );

    Ok(Json(DataResponse {
        data: BulkActionResult {
            files: moved_files,
            folders: moved_folders,
        },
    }))
}

/// The materialized path of a move destination (`None` is the root).
async fn resolve_destination(state: &AppState, parent: Option<DbId>) -> AppResult<String> {
    match parent {
        Some(id) => {
            let folder = FolderRepo::find_by_id(&state.pool, id)
                .await?
                .ok_or(CoreError::NotFound { entity: "Folder", id })?;
            Ok(folder.path)
        }
        None => Ok(folders::ROOT_PATH.to_string()),
    }
}
