//! The entity-query collaborator seam.
//!
//! The walker never touches storage; it asks an [`EntityQuery`] for rows.
//! `canopy-db` provides the Postgres implementation; tests provide an
//! in-memory one.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::plan::{PageRequest, SortKey};
use crate::error::CoreResult;
use crate::filter::Filter;
use crate::types::{DbId, JsonMap, Timestamp};

/// A stored entity as the collaborator returns it: scalar document plus the
/// bookkeeping columns. Relations live in link rows, never in `document`.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub id: DbId,
    pub document: JsonMap,
    pub published_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Pagination metadata in the collection-response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u64,
    pub page_size: u64,
    pub page_count: u64,
    pub total: u64,
}

impl PageMeta {
    pub fn compute(request: PageRequest, total: u64) -> Self {
        Self {
            page: request.page,
            page_size: request.page_size,
            page_count: total.div_ceil(request.page_size),
            total,
        }
    }
}

/// One page of results plus its metadata.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

/// Query parameters common to every row fetch.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub filters: Option<Filter>,
    pub sort: Vec<SortKey>,
    pub pagination: Option<PageRequest>,
    /// Per-hop publication predicate: restrict to non-null `published_at`.
    pub published_only: bool,
}

impl QueryParams {
    pub fn page(&self) -> PageRequest {
        self.pagination.unwrap_or_default()
    }
}

/// The two relation query modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationMode {
    /// Entries currently related to the context entity, in link order.
    Current,
    /// Candidates available to attach: target entries *not* currently
    /// related to the context entity (when one is given), minus any
    /// client-supplied ids to omit.
    Available,
}

/// A relation fetch for one attribute of one (optional) context entity.
#[derive(Debug, Clone)]
pub struct RelatedQuery<'a> {
    pub source_uid: &'a str,
    /// `None` means no entity context: `Available` then returns all
    /// candidates minus `ids_to_omit`.
    pub source_id: Option<DbId>,
    pub attribute: &'a str,
    pub target_uid: &'a str,
    pub mode: RelationMode,
    pub ids_to_omit: &'a [DbId],
    pub params: QueryParams,
}

/// Row-fetching collaborator. Implementations own SQL and transactions; the
/// core owns plans, filtering semantics, and sanitization.
#[async_trait]
pub trait EntityQuery: Send + Sync {
    async fn find_one(&self, uid: &str, id: DbId) -> CoreResult<Option<EntityRecord>>;

    async fn find_many(&self, uid: &str, params: &QueryParams) -> CoreResult<Page<EntityRecord>>;

    async fn find_related(&self, query: &RelatedQuery<'_>) -> CoreResult<Page<EntityRecord>>;

    /// Fetch specific ids, preserving the given order unless `params.sort`
    /// overrides it. Used for relations embedded in component payloads,
    /// which store their target ids inline instead of in link rows.
    async fn find_by_ids(
        &self,
        uid: &str,
        ids: &[DbId],
        params: &QueryParams,
    ) -> CoreResult<Vec<EntityRecord>>;
}

impl EntityRecord {
    /// The document plus bookkeeping fields as one JSON object — the shape
    /// filters and sanitizers see.
    pub fn to_output(&self) -> JsonMap {
        let mut out = JsonMap::new();
        out.insert("id".to_string(), Value::from(self.id));
        for (key, value) in &self.document {
            out.insert(key.clone(), value.clone());
        }
        out.insert(
            "published_at".to_string(),
            match self.published_at {
                Some(ts) => Value::String(ts.to_rfc3339()),
                None => Value::Null,
            },
        );
        out.insert(
            "created_at".to_string(),
            Value::String(self.created_at.to_rfc3339()),
        );
        out.insert(
            "updated_at".to_string(),
            Value::String(self.updated_at.to_rfc3339()),
        );
        out
    }
}
