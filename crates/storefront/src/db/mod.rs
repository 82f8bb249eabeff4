//! Database operations for the storefront `PostgreSQL` schema.
//!
//! # Schema: `store`
//!
//! - `user` - Accounts, profile fields and roles
//! - `category`, `genre`, `product_genre`, `creator`, `product`,
//!   `promotion`, `highlight` - Catalog
//! - `cart_item`, `order`, `order_item` - Commerce
//! - `review` - Product reviews
//! - `collection`, `collection_item` - Per-user saved product lists
//! - `channel`, `post`, `comment`, `post_vote`, `comment_vote` - Forum
//! - `author`, `news`, `tag`, `news_tag` - News metadata (bodies live on disk)
//!
//! Sessions are stored by `tower-sessions-sqlx-store` in its own table.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p discvault-cli -- migrate
//! ```

pub mod cart;
pub mod catalog;
pub mod collections;
pub mod forum;
pub mod news;
pub mod orders;
pub mod reviews;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use cart::CartRepository;
pub use catalog::CatalogRepository;
pub use collections::CollectionRepository;
pub use forum::ForumRepository;
pub use news::NewsRepository;
pub use orders::OrderRepository;
pub use reviews::ReviewRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate username).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
    pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }

    /// Map a foreign-key violation to `NotFound`, anything else to `Database`.
    pub(crate) fn not_found_on_foreign_key(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_foreign_key_violation()
        {
            return Self::NotFound;
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
