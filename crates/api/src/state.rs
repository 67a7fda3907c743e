use std::sync::Arc;

use canopy_core::populate::WalkerConfig;
use canopy_core::schema::SchemaRegistry;
use sqlx::PgPool;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: PgPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Copy-on-write schema registry; handlers pin one snapshot per request.
    pub registry: Arc<SchemaRegistry>,
}

impl AppState {
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            max_depth: self.config.populate_max_depth,
        }
    }
}
