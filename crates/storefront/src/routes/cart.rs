//! Cart route handlers.
//!
//! Carts are stored per user; prices are read live from the catalog each
//! time the cart is shown.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;
use tracing::instrument;

use discvault_core::ProductId;

use crate::db::CartRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::commerce::Cart;
use crate::routes::{ApiJson, ApiPath};
use crate::state::AppState;

/// Largest quantity accepted for a single line.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// Build the cart router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/cart", get(show).post(add).delete(clear))
        .route("/api/cart/{product_id}", put(set_quantity).delete(remove))
}

/// Add to cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

/// Set quantity request body.
#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i32,
}

fn check_quantity(quantity: i32, min: i32) -> Result<i32> {
    if (min..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(quantity)
    } else {
        Err(AppError::BadRequest(format!(
            "quantity must be between {min} and {MAX_LINE_QUANTITY}"
        )))
    }
}

/// Show the caller's cart.
///
/// # Errors
///
/// 401 without a session.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Cart>> {
    let cart = CartRepository::new(state.pool()).get(user.id).await?;
    Ok(Json(cart))
}

/// Add a product, incrementing an existing line.
///
/// # Errors
///
/// 400 for a quantity outside 1..=99 or one that would take the line past
/// 99, 404 for an unknown product.
#[instrument(skip(state, user), fields(user_id = %user.id, product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<AddToCartRequest>,
) -> Result<Json<Cart>> {
    let quantity = check_quantity(body.quantity, 1)?;
    let repo = CartRepository::new(state.pool());
    if !repo
        .add(user.id, body.product_id, quantity, MAX_LINE_QUANTITY)
        .await?
    {
        return Err(line_limit_exceeded());
    }
    Ok(Json(repo.get(user.id).await?))
}

fn line_limit_exceeded() -> AppError {
    AppError::BadRequest(format!(
        "a cart line cannot hold more than {MAX_LINE_QUANTITY} of one product"
    ))
}

/// Set a line's quantity. Zero removes the line.
///
/// # Errors
///
/// 400 for a quantity outside 0..=99, 404 if the product is not in the cart.
#[instrument(skip(state, user), fields(user_id = %user.id, product_id = %product_id))]
pub async fn set_quantity(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<QuantityRequest>,
) -> Result<Json<Cart>> {
    let quantity = check_quantity(body.quantity, 0)?;
    let repo = CartRepository::new(state.pool());
    repo.set_quantity(user.id, product_id, quantity).await?;
    Ok(Json(repo.get(user.id).await?))
}

/// Remove a line.
///
/// # Errors
///
/// 404 if the product is not in the cart.
#[instrument(skip(state, user), fields(user_id = %user.id, product_id = %product_id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<Cart>> {
    let repo = CartRepository::new(state.pool());
    repo.remove(user.id, product_id).await?;
    Ok(Json(repo.get(user.id).await?))
}

/// Empty the cart.
///
/// # Errors
///
/// 401 without a session.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<StatusCode> {
    CartRepository::new(state.pool()).clear(user.id).await?;
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
    fn test_quantity_bounds() {
        assert!(check_quantity(0, 1).is_err());
        assert_eq!(check_quantity(1, 1).unwrap(), 1);
        assert_eq!(check_quantity(0, 0).unwrap(), 0);
        assert_eq!(check_quantity(99, 0).unwrap(), 99);
        assert!(check_quantity(100, 0).is_err());
        assert!(check_quantity(-1, 0).is_err());
    }

    #[test]
    fn test_line_limit_is_bad_request() {
        let err = line_limit_exceeded();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_add_defaults_to_one() {
        let body: AddToCartRequest = serde_json::from_str(r#"{"productId":7}"#).unwrap();
        assert_eq!(body.product_id, ProductId::new(7));
        assert_eq!(body.quantity, 1);
    }

    #[tokio::test]
    async fn test_cart_requires_session() {
        let response = test_support::app()
            .oneshot(Request::builder().uri("/api/cart").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
