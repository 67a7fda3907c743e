//! HTTP handlers, grouped by API surface.

pub mod admin;
pub mod collection_types;
pub mod health;
pub mod relations;
pub mod upload;
