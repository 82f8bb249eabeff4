//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::content::NewsContentStore;
use crate::services::EmailQueue;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    news_content: NewsContentStore,
    email: EmailQueue,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        pool: PgPool,
        news_content: NewsContentStore,
        email: EmailQueue,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                news_content,
                email,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get the news body store.
    #[must_use]
    pub fn news_content(&self) -> &NewsContentStore {
        &self.inner.news_content
    }

    /// Get the outgoing email queue.
    #[must_use]
    pub fn email(&self) -> &EmailQueue {
        &self.inner.email
    }
}
