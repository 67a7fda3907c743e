//! The Postgres implementation of the core's row-fetching seam.
//!
//! Every method builds its predicate from the same translated filter tree,
//! so the walker's semantics do not depend on which storage path a relation
//! takes. Current relations follow link rows in `ord` order; available
//! relations are the complement of the current set.

use async_trait::async_trait;
use canopy_core::error::{CoreError, CoreResult};
use canopy_core::populate::{
    EntityQuery, EntityRecord, Page, PageMeta, QueryParams, RelatedQuery, RelationMode,
};
use canopy_core::types::DbId;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::entity::EntityRow;
use crate::repositories::entity_repo::COLUMNS;
use crate::repositories::EntityRepo;
use crate::sql;

pub struct PgEntityQuery {
    pool: PgPool,
}

impl PgEntityQuery {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn internal(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "entity query failed");
    CoreError::Internal(err.to_string())
}

/// Aliased column list for joined queries.
fn aliased_columns() -> String {
    COLUMNS
        .split(", ")
        .map(|c| format!("e.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Push `content_type = $uid` plus the shared publication and filter
/// predicates. `prefix` is `""` or `"e."`.
fn push_base_conditions(
    qb: &mut QueryBuilder<'_, Postgres>,
    prefix: &str,
    uid: &str,
    params: &QueryParams,
) -> CoreResult<()> {
    qb.push(format!("{prefix}content_type = "));
    qb.push_bind(uid.to_string());
    if params.published_only {
        qb.push(format!(" AND {prefix}published_at IS NOT NULL"));
    }
    if let Some(filter) = &params.filters {
        qb.push(" AND ");
        sql::push_filter(qb, prefix, filter)?;
    }
    Ok(())
}

/// Push the link-membership predicate of a related query. For `Current` the
/// entity must sit in the link set; for `Available` it must not, and the
/// client-supplied omit list is excluded as well.
fn push_relation_conditions(
    qb: &mut QueryBuilder<'_, Postgres>,
    query: &RelatedQuery<'_>,
) -> CoreResult<()> {
    push_base_conditions(qb, "e.", query.target_uid, &query.params)?;

    if let Some(source_id) = query.source_id {
        let membership = match query.mode {
            RelationMode::Current => " AND EXISTS ",
            RelationMode::Available => " AND NOT EXISTS ",
        };
        qb.push(membership);
        qb.push("(SELECT 1 FROM entity_links l WHERE l.source_id = ");
        qb.push_bind(source_id);
        qb.push(" AND l.field = ");
        qb.push_bind(query.attribute.to_string());
        qb.push(" AND l.target_id = e.id)");
    }

    if query.mode == RelationMode::Available && !query.ids_to_omit.is_empty() {
        qb.push(" AND e.id <> ALL(");
        qb.push_bind(query.ids_to_omit.to_vec());
        qb.push(")");
    }
    Ok(())
}

#[async_trait]
impl EntityQuery for PgEntityQuery {
    async fn find_one(&self, uid: &str, id: DbId) -> CoreResult<Option<EntityRecord>> {
        let row = EntityRepo::find_by_id(&self.pool, uid, id)
            .await
            .map_err(internal)?;
        Ok(row.map(EntityRow::into_record))
    }

    async fn find_many(&self, uid: &str, params: &QueryParams) -> CoreResult<Page<EntityRecord>> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM entities WHERE ");
        push_base_conditions(&mut count_qb, "", uid, params)?;
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;

        let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM entities WHERE "));
        push_base_conditions(&mut qb, "", uid, params)?;
        sql::push_order_by(&mut qb, "", &params.sort)?;
        sql::push_page(&mut qb, params.page());
        let rows: Vec<EntityRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;

        Ok(Page {
            items: rows.into_iter().map(EntityRow::into_record).collect(),
            meta: PageMeta::compute(params.page(), total as u64),
        })
    }

    async fn find_related(&self, query: &RelatedQuery<'_>) -> CoreResult<Page<EntityRecord>> {
        // A current-relations query without an entity context has nothing to
        // follow.
        if query.mode == RelationMode::Current && query.source_id.is_none() {
            return Ok(Page {
                items: Vec::new(),
                meta: PageMeta::compute(query.params.page(), 0),
            });
        }

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM entities e WHERE ");
        push_relation_conditions(&mut count_qb, query)?;
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;

        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM entities e WHERE ",
            aliased_columns()
        ));
        push_relation_conditions(&mut qb, query)?;

        // Current relations default to link order; an explicit sort wins.
        if query.mode == RelationMode::Current && query.params.sort.is_empty() {
            qb.push(" ORDER BY (SELECT l.ord FROM entity_links l WHERE l.source_id = ");
            // source_id is Some here, checked above.
            qb.push_bind(query.source_id.unwrap_or_default());
            qb.push(" AND l.field = ");
            qb.push_bind(query.attribute.to_string());
            qb.push(" AND l.target_id = e.id) ASC, e.id ASC");
        } else {
            sql::push_order_by(&mut qb, "e.", &query.params.sort)?;
        }
        sql::push_page(&mut qb, query.params.page());

        let rows: Vec<EntityRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        Ok(Page {
            items: rows.into_iter().map(EntityRow::into_record).collect(),
            meta: PageMeta::compute(query.params.page(), total as u64),
        })
    }

    async fn find_by_ids(
        &self,
        uid: &str,
        ids: &[DbId],
        params: &QueryParams,
    ) -> CoreResult<Vec<EntityRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM entities WHERE id = ANY("));
        qb.push_bind(ids.to_vec());
        qb.push(") AND ");
        push_base_conditions(&mut qb, "", uid, params)?;

        if params.sort.is_empty() {
            // Preserve the caller's id order (inline relation lists are
            // ordered).
            qb.push(" ORDER BY array_position(");
            qb.push_bind(ids.to_vec());
            qb.push(", id) ASC");
        } else {
            sql::push_order_by(&mut qb, "", &params.sort)?;
        }
        sql::push_page(&mut qb, params.page());

        let rows: Vec<EntityRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        Ok(rows.into_iter().map(EntityRow::into_record).collect())
    }
}
