//! Shared response envelope types for API handlers.
//!
//! Single entities and action results use `{ "data": ... }`; collection
//! endpoints add `meta.pagination`; relation-listing endpoints use the
//! `{ "results": [...], "pagination": ... }` shape.

use canopy_core::populate::PageMeta;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Collection envelope: `{ "data": [...], "meta": { "pagination": ... } }`.
#[derive(Debug, Serialize)]
pub struct CollectionResponse<T: Serialize> {
    pub data: Vec<T>,
    pub meta: Meta,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub pagination: PageMeta,
}

impl<T: Serialize> CollectionResponse<T> {
    pub fn new(data: Vec<T>, pagination: PageMeta) -> Self {
        Self {
            data,
            meta: Meta { pagination },
        }
    }
}

/// Relation-listing envelope: `{ "results": [...], "pagination": ... }`.
#[derive(Debug, Serialize)]
pub struct ResultsResponse<T: Serialize> {
    pub results: Vec<T>,
    pub pagination: PageMeta,
}
