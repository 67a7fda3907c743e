//! Canopy database layer: Postgres repositories, the filter-to-SQL
//! translator, and the [`canopy_core::populate::EntityQuery`] implementation
//! the graph walker runs against.

pub mod models;
pub mod query_source;
pub mod repositories;
pub mod sql;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub use query_source::PgEntityQuery;

/// Connect to Postgres with a bounded pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Apply all pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}

/// Cheap liveness probe for health endpoints.
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
