//! Repository for the `entities` table.

use canopy_core::types::DbId;
use serde_json::Value;
use sqlx::PgPool;

use crate::models::entity::EntityRow;

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str =
    "id, content_type, document, published_at, created_at, updated_at";

/// CRUD for entity rows. Listing with filters lives in
/// [`crate::query_source::PgEntityQuery`].
pub struct EntityRepo;

impl EntityRepo {
    /// Insert a new entity. `publish` stamps `published_at` immediately
    /// (content types without draft/publish always pass `true`).
    pub async fn create(
        pool: &PgPool,
        uid: &str,
        document: &Value,
        publish: bool,
    ) -> Result<EntityRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO entities (content_type, document, published_at)
             VALUES ($1, $2, CASE WHEN $3 THEN NOW() END)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EntityRow>(&query)
            .bind(uid)
            .bind(document)
            .bind(publish)
            .fetch_one(pool)
            .await
    }

    /// Find an entity by id, scoped to its content type so a route cannot
    /// read another type's rows.
    pub async fn find_by_id(
        pool: &PgPool,
        uid: &str,
        id: DbId,
    ) -> Result<Option<EntityRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM entities WHERE id = $1 AND content_type = $2");
        sqlx::query_as::<_, EntityRow>(&query)
            .bind(id)
            .bind(uid)
            .fetch_optional(pool)
            .await
    }

    /// Replace the stored document. Returns `None` if no such entity.
    pub async fn update_document(
        pool: &PgPool,
        uid: &str,
        id: DbId,
        document: &Value,
    ) -> Result<Option<EntityRow>, sqlx::Error> {
        let query = format!(
            "UPDATE entities SET document = $3, updated_at = NOW()
             WHERE id = $1 AND content_type = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EntityRow>(&query)
            .bind(id)
            .bind(uid)
            .bind(document)
            .fetch_optional(pool)
            .await
    }

    /// Stamp or clear `published_at`.
    pub async fn set_published(
        pool: &PgPool,
        uid: &str,
        id: DbId,
        publish: bool,
    ) -> Result<Option<EntityRow>, sqlx::Error> {
        let query = format!(
            "UPDATE entities SET
                published_at = CASE WHEN $3 THEN NOW() END,
                updated_at = NOW()
             WHERE id = $1 AND content_type = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EntityRow>(&query)
            .bind(id)
            .bind(uid)
            .bind(publish)
            .fetch_optional(pool)
            .await
    }

    /// Delete an entity; its link rows cascade. Returns `true` if a row was
    /// removed.
    pub async fn delete(pool: &PgPool, uid: &str, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM entities WHERE id = $1 AND content_type = $2")
            .bind(id)
            .bind(uid)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
