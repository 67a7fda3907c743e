//! Repository for the `entity_links` table.

use canopy_core::types::DbId;
use sqlx::PgPool;

/// Ordered relation edges for entity-level relation attributes.
pub struct LinkRepo;

impl LinkRepo {
    /// Replace every link of one relation attribute with the given targets,
    /// preserving their order. Runs in a transaction so readers never see a
    /// half-written relation.
    pub async fn replace(
        pool: &PgPool,
        source_uid: &str,
        source_id: DbId,
        field: &str,
        target_uid: &str,
        targets: &[DbId],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM entity_links WHERE source_id = $1 AND field = $2")
            .bind(source_id)
            .bind(field)
            .execute(&mut *tx)
            .await?;
        if !targets.is_empty() {
            let ords: Vec<i32> = (0..targets.len() as i32).collect();
            sqlx::query(
                "INSERT INTO entity_links (source_uid, source_id, field, target_uid, target_id, ord)
                 SELECT $1, $2, $3, $4, t.id, t.ord
                 FROM UNNEST($5::bigint[], $6::int[]) AS t(id, ord)",
            )
            .bind(source_uid)
            .bind(source_id)
            .bind(field)
            .bind(target_uid)
            .bind(targets.to_vec())
            .bind(ords)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await
    }

    /// Target ids of one relation attribute, in link order.
    pub async fn targets(
        pool: &PgPool,
        source_id: DbId,
        field: &str,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT target_id FROM entity_links
             WHERE source_id = $1 AND field = $2
             ORDER BY ord ASC, id ASC",
        )
        .bind(source_id)
        .bind(field)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
