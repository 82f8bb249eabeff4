//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! dv-cli migrate
//! ```
//!
//! Applies `crates/storefront/migrations/` (the `store` schema) and then
//! creates the session table used by `tower-sessions`. Both steps are
//! idempotent.

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;

use super::{MissingDatabaseUrl, database_url};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingDatabaseUrl),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(url.expose_secret()).await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(pool.clone()).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
