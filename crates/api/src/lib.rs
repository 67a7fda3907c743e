//! Canopy HTTP API: entity CRUD with populate/sanitize, relation listing
//! for the content manager, the media library, and schema administration.

pub mod config;
pub mod error;
pub mod handlers;
pub mod query;
pub mod response;
pub mod router;
pub mod state;
