//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod users;

use secrecy::SecretString;
use sqlx::PgPool;

/// Environment variable holding the `PostgreSQL` connection string.
pub const DATABASE_URL_VAR: &str = "DISCVAULT_DATABASE_URL";

/// The variable is missing.
#[derive(Debug, thiserror::Error)]
#[error("Missing environment variable: DISCVAULT_DATABASE_URL")]
pub struct MissingDatabaseUrl;

/// Read the database URL from the environment (after loading `.env`),
/// falling back to `DATABASE_URL` like the storefront does.
///
/// # Errors
///
/// Returns [`MissingDatabaseUrl`] when neither variable is set.
pub fn database_url() -> Result<SecretString, MissingDatabaseUrl> {
    dotenvy::dotenv().ok();
    std::env::var(DATABASE_URL_VAR)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MissingDatabaseUrl)
}

/// Connect using the storefront's pool settings.
///
/// # Errors
///
/// Returns an error if the variable is missing or the connection fails.
pub async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    let url = database_url()?;
    tracing::info!("Connecting to database...");
    let pool = discvault_storefront::db::create_pool(&url).await?;
    Ok(pool)
}
