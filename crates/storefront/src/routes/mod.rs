//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Identity (strict rate limit)
//! POST   /register                             - Create account, start session
//! POST   /auth                                 - Log in with username or email
//! GET    /auth                                 - Current session user
//! POST   /auth/logout                          - End session
//!
//! # Account (requires auth)
//! GET    /api/account/profile                  - Profile
//! PUT    /api/account/profile                  - Update profile fields
//! POST   /api/account/password                 - Change password
//!
//! # Catalog
//! GET    /api/products                         - Filtered, paged product list
//! GET    /api/products/{id}                    - Product detail
//! POST   /api/products                         - Create product (admin)
//! PUT    /api/products/{id}                    - Update product (admin)
//! DELETE /api/products/{id}                    - Delete product (admin)
//! GET    /api/categories                       - Categories
//! GET    /api/genres?categoryId=               - Genres
//! POST   /api/genres                           - Create genre (admin)
//! GET    /api/creators?kind=                   - Creators
//! POST   /api/creators                         - Create creator (admin)
//! GET    /api/highlights?categoryId=           - Highlights
//! POST   /api/highlights                       - Create highlight (admin)
//! POST   /api/promotions                       - Create promotion (admin)
//! DELETE /api/promotions/{id}                  - Delete promotion (admin)
//!
//! # Reviews
//! GET    /api/products/{id}/reviews            - Reviews and rating summary
//! POST   /api/products/{id}/reviews            - Review a product
//! GET    /api/reviews/mine                     - Own reviews
//! PUT    /api/reviews/{id}                     - Edit own review
//! DELETE /api/reviews/{id}                     - Delete (owner or admin)
//!
//! # Cart & orders (requires auth)
//! GET    /api/cart                             - Cart with live prices
//! POST   /api/cart                             - Add to cart
//! DELETE /api/cart                             - Empty cart
//! PUT    /api/cart/{productId}                 - Set quantity (0 removes)
//! DELETE /api/cart/{productId}                 - Remove line
//! POST   /api/orders                           - Place order (Idempotency-Key)
//! GET    /api/orders                           - Own orders
//! GET    /api/orders/{id}                      - Order (owner or admin)
//! POST   /api/orders/{id}/cancel               - Cancel own order
//! PUT    /api/orders/{id}/status               - Change status (admin)
//!
//! # Collections (requires auth)
//! GET    /api/collections                      - Collections with counts
//! POST   /api/collections                      - Create collection
//! GET    /api/collections/{name}               - One collection
//! PUT    /api/collections/{name}               - Rename
//! DELETE /api/collections/{name}               - Delete with items
//! GET    /api/collections/{name}/items         - Items
//! POST   /api/collections/{name}/items         - Add item
//! DELETE /api/collections/{name}/items/{productId} - Remove item
//!
//! # Forum
//! GET    /api/channels                         - Channels
//! POST   /api/channels                         - Create channel (admin)
//! GET    /api/channels/{slug}/posts            - Posts in channel
//! POST   /api/channels/{slug}/posts            - New post
//! GET    /api/posts/{id}                       - Post with comment thread
//! DELETE /api/posts/{id}                       - Delete (owner or admin)
//! POST   /api/posts/{id}/vote                  - Toggle vote
//! POST   /api/posts/{id}/comments              - Comment or reply
//! DELETE /api/comments/{id}                    - Delete (owner or admin)
//! POST   /api/comments/{id}/vote               - Toggle vote
//!
//! # News
//! GET    /api/news                             - Feed (?tag, ?year, ?author)
//! GET    /api/news/tags                        - Tags with counts
//! GET    /api/news/years                       - Years with counts
//! GET    /api/news/authors                     - Authors
//! POST   /api/news/authors                     - Create author (admin)
//! GET    /api/news/{slug}                      - Article with rendered body
//! POST   /api/news                             - Publish (admin)
//! PUT    /api/news/{slug}                      - Update (admin)
//! DELETE /api/news/{slug}                      - Delete (admin)
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod collections;
pub mod forum;
pub mod news;
pub mod orders;
pub mod products;
pub mod reviews;

use axum::{
    Router,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};

use discvault_core::UserId;

use crate::error::AppError;
use crate::models::CurrentUser;
use crate::state::AppState;

/// JSON body extractor whose rejections use the API error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections use the API error body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Path extractor whose rejections use the API error body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Pagination query shared by list endpoints.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    #[must_use]
    pub fn request(&self) -> discvault_core::PageRequest {
        discvault_core::PageRequest::new(self.page, self.page_size)
    }
}

/// Allow the owner of a resource or any administrator.
pub(crate) fn ensure_owner_or_admin(user: &CurrentUser, owner: UserId) -> Result<(), AppError> {
    if user.id == owner || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the author or an administrator may do this".to_string(),
        ))
    }
}

/// Reject blank or oversized free-text input.
pub(crate) fn require_text(field: &str, value: &str, max: usize) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{field} cannot be empty")));
    }
    if trimmed.chars().count() > max {
        return Err(AppError::BadRequest(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Login and registration, which get the strict rate limiter.
pub fn identity_routes() -> Router<AppState> {
    auth::router()
}

/// The JSON API.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(account::router())
        .merge(products::router())
        .merge(catalog::router())
        .merge(reviews::router())
        .merge(cart::router())
        .merge(orders::router())
        .merge(collections::router())
        .merge(forum::router())
        .merge(news::router())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use axum::Router;
    use sqlx::postgres::PgPoolOptions;

    use crate::config::{SentryConfig, StorefrontConfig};
    use crate::content::NewsContentStore;
    use crate::services::EmailQueue;
    use crate::state::AppState;

    /// State backed by a pool that never connects. Handlers that reach the
    /// database fail, so tests only exercise rejections that happen first.
    #[allow(clippy::unwrap_used)]
    pub fn state() -> AppState {
        let config = StorefrontConfig {
            database_url: "postgres://localhost/discvault_test".to_string().into(),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".parse().unwrap(),
            content_dir: "content/news".into(),
            images_dir: "static/images".into(),
            cors_origins: Vec::new(),
            email: None,
            sentry: SentryConfig::default(),
        };
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/discvault_test")
            .unwrap();
        let news = NewsContentStore::load(Path::new("/nonexistent/discvault-news")).unwrap();
        AppState::new(config, pool, news, EmailQueue::disabled())
    }

    pub fn app() -> Router {
        super::identity_routes()
            .merge(super::api_routes())
            .with_state(state())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use discvault_core::{Email, Role, Username};

    use super::*;

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: UserId::generate(),
            username: Username::parse("vinyl_fan").unwrap(),
            email: Email::parse("fan@example.com").unwrap(),
            role,
        }
    }

    #[test]
    fn test_ensure_owner_or_admin() {
        let owner = user(Role::User);
        let other = user(Role::User);
        let admin = user(Role::Admin);

        assert!(ensure_owner_or_admin(&owner, owner.id).is_ok());
        assert!(ensure_owner_or_admin(&admin, owner.id).is_ok());
        assert!(matches!(
            ensure_owner_or_admin(&other, owner.id),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("title", "  Hi ", 10).unwrap(), "Hi");
        assert!(require_text("title", "   ", 10).is_err());
        assert!(require_text("title", "abcdef", 5).is_err());
    }
}
