//! Review route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde::Deserialize;
use tracing::instrument;

use discvault_core::{ProductId, Rating, ReviewId};

use crate::db::{CatalogRepository, ReviewRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::community::{ProductReviews, Review};
use crate::routes::{ApiJson, ApiPath, ensure_owner_or_admin};
use crate::state::AppState;

const MAX_BODY_LENGTH: usize = 5_000;

/// Build the review router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/products/{id}/reviews",
            get(for_product).post(create),
        )
        .route("/api/reviews/mine", get(mine))
        .route("/api/reviews/{id}", put(update).delete(destroy))
}

/// Review request body. The rating is validated on deserialization.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: Rating,
    #[serde(default)]
    pub body: String,
}

impl ReviewRequest {
    fn body(&self) -> Result<&str> {
        let body = self.body.trim();
        if body.chars().count() > MAX_BODY_LENGTH {
            return Err(AppError::BadRequest(format!(
                "body must be at most {MAX_BODY_LENGTH} characters"
            )));
        }
        Ok(body)
    }
}

/// Reviews of a product with their rating summary.
///
/// # Errors
///
/// 404 if the product does not exist.
#[instrument(skip(state), fields(product_id = %id))]
pub async fn for_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ProductReviews>> {
    if !CatalogRepository::new(state.pool()).product_exists(id).await? {
        return Err(AppError::NotFound(format!("Product {id} not found")));
    }
    let reviews = ReviewRepository::new(state.pool()).for_product(id).await?;
    Ok(Json(reviews))
}

/// Review a product.
///
/// # Errors
///
/// 409 if the caller already reviewed it, 404 for an unknown product.
#[instrument(skip(state, user, body), fields(user_id = %user.id, product_id = %id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<ReviewRequest>,
) -> Result<impl IntoResponse> {
    let review = ReviewRepository::new(state.pool())
        .create(id, user.id, body.rating, body.body()?)
        .await?;
    add_breadcrumb("review", "created", Some(&[("product_id", &id.to_string())]));
    Ok((StatusCode::CREATED, Json(review)))
}

/// The caller's reviews.
///
/// # Errors
///
/// 401 without a session.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Review>>> {
    let reviews = ReviewRepository::new(state.pool()).for_user(user.id).await?;
    Ok(Json(reviews))
}

/// Edit the caller's own review.
///
/// # Errors
///
/// 404 if missing, 403 if written by someone else.
#[instrument(skip(state, user, body), fields(user_id = %user.id, review_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<ReviewId>,
    ApiJson(body): ApiJson<ReviewRequest>,
) -> Result<Json<Review>> {
    let repo = ReviewRepository::new(state.pool());
    let existing = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Review {id} not found")))?;
    if existing.user_id != user.id {
        return Err(AppError::Forbidden(
            "Only the author may edit a review".to_string(),
        ));
    }

    let review = repo.update(id, user.id, body.rating, body.body()?).await?;
    Ok(Json(review))
}

/// Delete a review.
///
/// # Errors
///
/// 404 if missing, 403 unless the caller wrote it or is an administrator.
#[instrument(skip(state, user), fields(user_id = %user.id, review_id = %id))]
pub async fn destroy(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<ReviewId>,
) -> Result<StatusCode> {
    let repo = ReviewRepository::new(state.pool());
    let existing = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Review {id} not found")))?;
    ensure_owner_or_admin(&user, existing.user_id)?;

    repo.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::routes::test_support;

    #[test]
    fn test_rating_out_of_range_fails_to_parse() {
        assert!(serde_json::from_str::<ReviewRequest>(r#"{"rating":6}"#).is_err());
        assert!(serde_json::from_str::<ReviewRequest>(r#"{"rating":0}"#).is_err());
        let ok: ReviewRequest = serde_json::from_str(r#"{"rating":4,"body":" Great "}"#).unwrap();
        assert_eq!(ok.rating.get(), 4);
        assert_eq!(ok.body().unwrap(), "Great");
    }

    #[tokio::test]
    async fn test_create_requires_session() {
        let response = test_support::app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/products/1/reviews")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"rating":5}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
