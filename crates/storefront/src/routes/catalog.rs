//! Catalog reference data: categories, genres, creators, highlights and
//! promotions.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use discvault_core::pricing::{MAX_DISCOUNT_PERCENT, is_valid_discount};
use discvault_core::{CategoryId, CreatorKind, ProductId, PromotionId};

use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::catalog::{Category, Creator, Genre, Highlight};
use crate::routes::{ApiJson, ApiPath, ApiQuery, require_text};
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 120;

/// Build the catalog reference data router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(categories))
        .route("/api/genres", get(genres).post(create_genre))
        .route("/api/creators", get(creators).post(create_creator))
        .route("/api/highlights", get(highlights).post(create_highlight))
        .route("/api/promotions", post(create_promotion))
        .route("/api/promotions/{id}", delete(delete_promotion))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryQuery {
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreatorQuery {
    pub kind: Option<CreatorKind>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreRequest {
    pub category_id: CategoryId,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorRequest {
    pub name: String,
    pub kind: CreatorKind,
    pub bio: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightRequest {
    pub category_id: CategoryId,
    pub title: String,
    pub image_url: String,
    pub link_url: Option<String>,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRequest {
    pub product_id: ProductId,
    pub discount_percent: i32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// List categories.
///
/// # Errors
///
/// 500 if the database is unavailable.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = CatalogRepository::new(state.pool()).list_categories().await?;
    Ok(Json(categories))
}

/// List genres, optionally for one category.
///
/// # Errors
///
/// 500 if the database is unavailable.
#[instrument(skip(state))]
pub async fn genres(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<Json<Vec<Genre>>> {
    let genres = CatalogRepository::new(state.pool())
        .list_genres(query.category_id)
        .await?;
    Ok(Json(genres))
}

/// Create a genre.
///
/// # Errors
///
/// 409 if the category already has it, 404 for an unknown category.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn create_genre(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<GenreRequest>,
) -> Result<impl IntoResponse> {
    let name = require_text("name", &body.name, MAX_NAME_LENGTH)?;
    let genre = CatalogRepository::new(state.pool())
        .create_genre(body.category_id, &name)
        .await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

/// List creators, optionally of one kind.
///
/// # Errors
///
/// 500 if the database is unavailable.
#[instrument(skip(state))]
pub async fn creators(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CreatorQuery>,
) -> Result<Json<Vec<Creator>>> {
    let creators = CatalogRepository::new(state.pool())
        .list_creators(query.kind)
        .await?;
    Ok(Json(creators))
}

/// Create a creator.
///
/// # Errors
///
/// 409 if a creator of the same kind and name exists.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn create_creator(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<CreatorRequest>,
) -> Result<impl IntoResponse> {
    let name = require_text("name", &body.name, MAX_NAME_LENGTH)?;
    let creator = CatalogRepository::new(state.pool())
        .create_creator(
            &name,
            body.kind,
            body.bio.as_deref().map(str::trim).filter(|b| !b.is_empty()),
            body.image_url.as_deref().filter(|u| !u.trim().is_empty()),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(creator)))
}

/// List highlights in display order.
///
/// # Errors
///
/// 500 if the database is unavailable.
#[instrument(skip(state))]
pub async fn highlights(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<Json<Vec<Highlight>>> {
    let highlights = CatalogRepository::new(state.pool())
        .list_highlights(query.category_id)
        .await?;
    Ok(Json(highlights))
}

/// Create a highlight.
///
/// # Errors
///
/// 400 for a blank title or image, 404 for an unknown category.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn create_highlight(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<HighlightRequest>,
) -> Result<impl IntoResponse> {
    let title = require_text("title", &body.title, MAX_NAME_LENGTH)?;
    let image_url = require_text("imageUrl", &body.image_url, 2048)?;
    let highlight = CatalogRepository::new(state.pool())
        .create_highlight(
            body.category_id,
            &title,
            &image_url,
            body.link_url.as_deref().filter(|u| !u.trim().is_empty()),
            body.position,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(highlight)))
}

/// Create a promotion.
///
/// # Errors
///
/// 400 for a discount outside 1..=90 or an empty window, 404 for an
/// unknown product.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn create_promotion(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<PromotionRequest>,
) -> Result<impl IntoResponse> {
    if !is_valid_discount(body.discount_percent) {
        return Err(AppError::BadRequest(format!(
            "discountPercent must be between 1 and {MAX_DISCOUNT_PERCENT}"
        )));
    }
    if body.ends_at <= body.starts_at {
        return Err(AppError::BadRequest(
            "endsAt must be after startsAt".to_string(),
        ));
    }

    let promotion = CatalogRepository::new(state.pool())
        .create_promotion(
            body.product_id,
            body.discount_percent,
            body.starts_at,
            body.ends_at,
        )
        .await?;
    tracing::info!(promotion_id = %promotion.id, product_id = %body.product_id, "Promotion created");
    Ok((StatusCode::CREATED, Json(promotion)))
}

/// Delete a promotion.
///
/// # Errors
///
/// 404 if the promotion does not exist.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_promotion(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<PromotionId>,
) -> Result<StatusCode> {
    CatalogRepository::new(state.pool())
        .delete_promotion(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::routes::test_support;

    #[tokio::test]
    async fn test_unknown_creator_kind_is_rejected() {
        let response = test_support::app()
            .oneshot(
                Request::builder()
                    .uri("/api/creators?kind=painter")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_promotion_requires_session() {
        let response = test_support::app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/promotions")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"productId":1,"discountPercent":20,"startsAt":"2026-01-01T00:00:00Z","endsAt":"2026-02-01T00:00:00Z"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
