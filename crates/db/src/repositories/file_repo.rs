//! Repository for the `files` table.

use canopy_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::file::{CreateFile, File, UpdateFile};

const COLUMNS: &str =
    "id, name, alternative_text, url, mime, size, folder_id, folder_path, created_at, updated_at";

pub struct FileRepo;

impl FileRepo {
    /// Register a file. `folder_path` mirrors the containing folder's path
    /// (`/` for root-level files).
    pub async fn create(pool: &PgPool, input: &CreateFile) -> Result<File, sqlx::Error> {
        let query = format!(
            "INSERT INTO files (name, alternative_text, url, mime, size, folder_id, folder_path)
             VALUES ($1, $2, $3, $4, $5, $6,
                     COALESCE((SELECT path FROM folders WHERE id = $6), '/'))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, File>(&query)
            .bind(&input.name)
            .bind(&input.alternative_text)
            .bind(&input.url)
            .bind(&input.mime)
            .bind(input.size)
            .bind(input.folder)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<File>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM files WHERE id = $1");
        sqlx::query_as::<_, File>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Files directly inside `folder` (`None` = root level), sorted by name.
    pub async fn list_in_folder(
        pool: &PgPool,
        folder: Option<DbId>,
    ) -> Result<Vec<File>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM files
             WHERE folder_id IS NOT DISTINCT FROM $1
             ORDER BY name ASC"
        );
        sqlx::query_as::<_, File>(&query)
            .bind(folder)
            .fetch_all(pool)
            .await
    }

    /// Update file metadata. Only non-`None` fields in `input` are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateFile,
    ) -> Result<Option<File>, sqlx::Error> {
        let query = format!(
            "UPDATE files SET
                name = COALESCE($2, name),
                alternative_text = COALESCE($3, alternative_text),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, File>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.alternative_text)
            .fetch_optional(pool)
            .await
    }

    /// Move files into `folder` (`None` = root), refreshing the mirrored
    /// path. Runs on the caller's connection so bulk actions keep folder and
    /// file moves in one transaction. Returns the moved rows.
    pub async fn move_many(
        conn: &mut PgConnection,
        ids: &[DbId],
        folder: Option<DbId>,
    ) -> Result<Vec<File>, sqlx::Error> {
        let query = format!(
            "UPDATE files
             SET folder_id = $2,
                 folder_path = COALESCE((SELECT path FROM folders WHERE id = $2), '/'),
                 updated_at = NOW()
             WHERE id = ANY($1)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, File>(&query)
            .bind(ids.to_vec())
            .bind(folder)
            .fetch_all(&mut *conn)
            .await
    }

    /// Delete files by id, on the caller's connection. Returns the removed
    /// rows.
    pub async fn delete_many(
        conn: &mut PgConnection,
        ids: &[DbId],
    ) -> Result<Vec<File>, sqlx::Error> {
        let query = format!("DELETE FROM files WHERE id = ANY($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, File>(&query)
            .bind(ids.to_vec())
            .fetch_all(&mut *conn)
            .await
    }
}
