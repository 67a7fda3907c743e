//! Canopy core: the relations & population engine of the content platform.
//!
//! This crate is storage- and transport-agnostic. It owns the runtime
//! content schema (compiled snapshots behind a copy-on-write registry),
//! populate spec resolution, the relation graph walker, output
//! sanitization, publication-state filtering, document validation, and the
//! folder materialized-path rules. Row fetching is delegated to the
//! [`populate::EntityQuery`] collaborator implemented in `canopy-db`.

pub mod error;
pub mod filter;
pub mod folders;
pub mod populate;
pub mod publication;
pub mod sanitize;
pub mod schema;
pub mod types;
pub mod validate;
