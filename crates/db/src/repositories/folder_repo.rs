//! Repository for the `folders` table.
//!
//! Path composition and cycle checks use `canopy_core::folders`; everything
//! here is row plumbing. Every mutation that touches more than one row
//! (renames combined with moves, subtree rewrites, the bulk actions) runs in
//! a single transaction so a failure on any row leaves the tree untouched.

use canopy_core::folders;
use canopy_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::file::File;
use crate::models::folder::Folder;
use crate::repositories::FileRepo;

const COLUMNS: &str = "id, name, path_id, path, parent_id, created_at, updated_at";

/// A planned re-parent: the destination and the subtree path rewrite it
/// implies. Callers build it after loading the folder and validating the
/// destination (existence and cycle checks).
#[derive(Debug, Clone)]
pub struct Relocation {
    pub new_parent: Option<DbId>,
    pub old_path: String,
    pub new_path: String,
}

pub struct FolderRepo;

impl FolderRepo {
    /// Create a folder under `parent` (`None` = root level). The sibling-name
    /// unique index rejects duplicates.
    pub async fn create(
        pool: &PgPool,
        name: &str,
        parent: Option<DbId>,
    ) -> Result<Folder, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let parent_path = match parent {
            Some(parent_id) => {
                let row: Option<(String,)> =
                    sqlx::query_as("SELECT path FROM folders WHERE id = $1")
                        .bind(parent_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                row.ok_or(sqlx::Error::RowNotFound)?.0
            }
            None => folders::ROOT_PATH.to_string(),
        };

        let (path_id,): (DbId,) = sqlx::query_as("SELECT nextval('folders_path_id_seq')")
            .fetch_one(&mut *tx)
            .await?;
        let path = folders::join_path(&parent_path, path_id);

        let query = format!(
            "INSERT INTO folders (name, parent_id, path_id, path)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        let folder = sqlx::query_as::<_, Folder>(&query)
            .bind(name)
            .bind(parent)
            .bind(path_id)
            .bind(&path)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(folder)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Folder>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM folders WHERE id = $1");
        sqlx::query_as::<_, Folder>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<Folder>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM folders WHERE id = ANY($1) ORDER BY path ASC");
        sqlx::query_as::<_, Folder>(&query)
            .bind(ids.to_vec())
            .fetch_all(pool)
            .await
    }

    /// Direct children of `parent` (`None` = root level), sorted by name.
    pub async fn list_children(
        pool: &PgPool,
        parent: Option<DbId>,
    ) -> Result<Vec<Folder>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM folders
             WHERE parent_id IS NOT DISTINCT FROM $1
             ORDER BY name ASC"
        );
        sqlx::query_as::<_, Folder>(&query)
            .bind(parent)
            .fetch_all(pool)
            .await
    }

    /// The whole tree, sorted by path so parents precede children.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Folder>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM folders ORDER BY path ASC");
        sqlx::query_as::<_, Folder>(&query).fetch_all(pool).await
    }

    /// Apply a rename and/or a re-parent in one transaction. Descendant path
    /// rewrites run first; the closing UPDATE carries both the new name and
    /// the new parent, so the sibling-name unique index is checked once,
    /// against the final state. An index violation rolls the rewrites back.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        name: Option<&str>,
        relocation: Option<&Relocation>,
    ) -> Result<Option<Folder>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        if let Some(relocation) = relocation {
            rebase_paths(&mut tx, &relocation.old_path, &relocation.new_path).await?;
        }
        let query = format!(
            "UPDATE folders SET
                name = COALESCE($2, name),
                parent_id = CASE WHEN $3 THEN $4 ELSE parent_id END,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let folder = sqlx::query_as::<_, Folder>(&query)
            .bind(id)
            .bind(name)
            .bind(relocation.is_some())
            .bind(relocation.and_then(|r| r.new_parent))
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(folder)
    }

    /// Move folders (with their subtrees) and files in one transaction, so a
    /// failure on any row leaves every tree untouched. The caller has already
    /// rejected cycles and sibling-name collisions; the unique index still
    /// backstops the latter. Returns the moved rows.
    pub async fn bulk_move(
        pool: &PgPool,
        moves: &[(DbId, Relocation)],
        file_ids: &[DbId],
        file_destination: Option<DbId>,
    ) -> Result<(Vec<Folder>, Vec<File>), sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut moved = Vec::with_capacity(moves.len());
        for (id, relocation) in moves {
            rebase_paths(&mut tx, &relocation.old_path, &relocation.new_path).await?;
            let query = format!(
                "UPDATE folders SET parent_id = $2, updated_at = NOW()
                 WHERE id = $1
                 RETURNING {COLUMNS}"
            );
            let folder = sqlx::query_as::<_, Folder>(&query)
                .bind(id)
                .bind(relocation.new_parent)
                .fetch_optional(&mut *tx)
                .await?;
            moved.extend(folder);
        }
        let files = if file_ids.is_empty() {
            Vec::new()
        } else {
            FileRepo::move_many(&mut tx, file_ids, file_destination).await?
        };
        tx.commit().await?;
        Ok((moved, files))
    }

    /// Delete folders (descendants and contained files cascade) and files in
    /// one transaction. Returns the rows removed; files swept away by a
    /// folder cascade are not listed.
    pub async fn bulk_delete(
        pool: &PgPool,
        folder_ids: &[DbId],
        file_ids: &[DbId],
    ) -> Result<(Vec<Folder>, Vec<File>), sqlx::Error> {
        let mut tx = pool.begin().await?;
        let files = if file_ids.is_empty() {
            Vec::new()
        } else {
            FileRepo::delete_many(&mut tx, file_ids).await?
        };
        let query = format!("DELETE FROM folders WHERE id = ANY($1) RETURNING {COLUMNS}");
        let removed = sqlx::query_as::<_, Folder>(&query)
            .bind(folder_ids.to_vec())
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok((removed, files))
    }
}

/// Rewrite a subtree's materialized paths, the root folder's own path and
/// the mirrored `files.folder_path` included. Runs on the caller's
/// connection so it shares the caller's transaction.
async fn rebase_paths(
    conn: &mut PgConnection,
    old_path: &str,
    new_path: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE folders
         SET path = $2 || substr(path, length($1) + 1), updated_at = NOW()
         WHERE path = $1 OR path LIKE $1 || '/%'",
    )
    .bind(old_path)
    .bind(new_path)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE files
         SET folder_path = $2 || substr(folder_path, length($1) + 1), updated_at = NOW()
         WHERE folder_path = $1 OR folder_path LIKE $1 || '/%'",
    )
    .bind(old_path)
    .bind(new_path)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
