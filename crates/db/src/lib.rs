//! Persistence layer for trial sessions, payment attempts, subscriptions
//! and the activity log.
//!
//! The services talk to the [`store::TrialStore`] and
//! [`store::BillingStore`] traits. [`store::PgStore`] implements them on
//! top of the Postgres repositories; [`store::MemoryStore`] is a
//! process-local implementation for tests and local development.

pub mod models;
pub mod repositories;
pub mod store;

use sqlx::postgres::PgPoolOptions;

pub use store::{BillingStore, MemoryStore, PgStore, StoreError, TrialStore};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

/// Apply all pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
