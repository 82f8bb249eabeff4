//! Order route handlers.
//!
//! Orders are placed from the cart or from explicit lines. Clients may send
//! an `Idempotency-Key` header; a retry with the same key returns the first
//! order with `200 OK` instead of `201 Created`.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use tracing::instrument;

use discvault_core::{OrderId, OrderStatus, PageRequest, Paged, ProductId};

use crate::db::OrderRepository;
use crate::db::orders::OrderSource;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::commerce::{Order, OrderLineRequest, OrderSummary};
use crate::routes::cart::MAX_LINE_QUANTITY;
use crate::routes::{ApiJson, ApiPath, ApiQuery, PageQuery};
use crate::services::EmailMessage;
use crate::state::AppState;

const IDEMPOTENCY_HEADER: &str = "idempotency-key";
const MAX_KEY_LENGTH: usize = 128;
const MAX_ADDRESS_LENGTH: usize = 1_000;

/// Build the order router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(index).post(place))
        .route("/api/orders/{id}", get(show))
        .route("/api/orders/{id}/cancel", post(cancel))
        .route("/api/orders/{id}/status", put(update_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineBody {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Place order request body. Without `items` the cart is ordered.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub shipping_address: Option<String>,
    pub items: Option<Vec<OrderLineBody>>,
}

impl PlaceOrderRequest {
    fn lines(&self) -> Result<Option<Vec<OrderLineRequest>>> {
        let Some(items) = &self.items else {
            return Ok(None);
        };
        if items.is_empty() {
            return Err(AppError::BadRequest("items cannot be empty".to_string()));
        }
        items
            .iter()
            .map(|item| {
                if (1..=MAX_LINE_QUANTITY).contains(&item.quantity) {
                    Ok(OrderLineRequest {
                        product_id: item.product_id,
                        quantity: item.quantity,
                    })
                } else {
                    Err(AppError::BadRequest(format!(
                        "quantity must be between 1 and {MAX_LINE_QUANTITY}"
                    )))
                }
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    fn shipping_address(&self) -> Result<Option<&str>> {
        let address = self
            .shipping_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty());
        if address.is_some_and(|a| a.chars().count() > MAX_ADDRESS_LENGTH) {
            return Err(AppError::BadRequest(format!(
                "shippingAddress must be at most {MAX_ADDRESS_LENGTH} characters"
            )));
        }
        Ok(address)
    }
}

/// Status change request body.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<&str>> {
    let Some(value) = headers.get(IDEMPOTENCY_HEADER) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map_err(|_| AppError::BadRequest("Idempotency-Key must be ASCII".to_string()))?
        .trim();
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Idempotency-Key must be 1 to {MAX_KEY_LENGTH} characters"
        )));
    }
    Ok(Some(key))
}

/// Place an order.
///
/// # Errors
///
/// 400 for an empty order, 404 for an unknown product, 409 when stock is
/// insufficient.
#[instrument(skip(state, user, headers, body), fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    ApiJson(body): ApiJson<PlaceOrderRequest>,
) -> Result<impl IntoResponse> {
    let key = idempotency_key(&headers)?;
    let lines = body.lines()?;
    let source = lines
        .as_deref()
        .map_or(OrderSource::Cart, OrderSource::Lines);

    let placed = OrderRepository::new(state.pool())
        .place(user.id, source, body.shipping_address()?, key)
        .await?;

    if !placed.created {
        tracing::info!(order_id = %placed.order.id, "Replayed order for idempotency key");
        return Ok((StatusCode::OK, Json(placed.order)));
    }

    let order = placed.order;
    tracing::info!(order_id = %order.id, total = %order.total, "Order placed");
    add_breadcrumb("order", "placed", Some(&[("order_id", &order.id.to_string())]));

    state.email().enqueue(EmailMessage::OrderConfirmation {
        to: user.email.to_string(),
        username: user.username.as_str().to_owned(),
        order_id: order.id,
        total: order.total,
        item_count: order.items.iter().map(|i| i64::from(i.quantity)).sum(),
    });

    Ok((StatusCode::CREATED, Json(order)))
}

/// The caller's orders, newest first.
///
/// # Errors
///
/// 401 without a session.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Paged<OrderSummary>>> {
    let page: PageRequest = query.request();
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id, page)
        .await?;
    Ok(Json(orders))
}

/// One order. Other users' orders are reported as missing.
///
/// # Errors
///
/// 404 unless the order exists and the caller owns it or is an admin.
#[instrument(skip(state, user), fields(user_id = %user.id, order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|order| order.user_id == user.id || user.is_admin())
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))
}

/// Cancel one of the caller's orders and restock its items.
///
/// # Errors
///
/// 404 if the order is not the caller's, 409 once it has shipped.
#[instrument(skip(state, user), fields(user_id = %user.id, order_id = %id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool())
        .cancel(id, user.id)
        .await?;
    Ok(Json(order))
}

/// Move an order along its lifecycle.
///
/// # Errors
///
/// 404 if the order does not exist, 409 for a disallowed transition.
#[instrument(skip(state, admin), fields(admin_id = %admin.id, order_id = %id, status = %body.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool())
        .update_status(id, body.status)
        .await?;
    Ok(Json(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::routes::test_support;

    #[test]
    fn test_lines_absent_means_cart() {
        let body: PlaceOrderRequest = serde_json::from_str("{}").unwrap();
        assert!(body.lines().unwrap().is_none());
        assert_eq!(body.shipping_address().unwrap(), None);
    }

    #[test]
    fn test_explicit_lines_are_validated() {
        let body: PlaceOrderRequest =
            serde_json::from_str(r#"{"items":[{"productId":3,"quantity":2}]}"#).unwrap();
        let lines = body.lines().unwrap().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id, ProductId::new(3));

        let empty: PlaceOrderRequest = serde_json::from_str(r#"{"items":[]}"#).unwrap();
        assert!(empty.lines().is_err());

        let zero: PlaceOrderRequest =
            serde_json::from_str(r#"{"items":[{"productId":3,"quantity":0}]}"#).unwrap();
        assert!(zero.lines().is_err());
    }

    #[test]
    fn test_idempotency_key_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers).unwrap(), None);

        headers.insert(IDEMPOTENCY_HEADER, " abc-123 ".parse().unwrap());
        assert_eq!(idempotency_key(&headers).unwrap(), Some("abc-123"));

        headers.insert(IDEMPOTENCY_HEADER, "x".repeat(MAX_KEY_LENGTH + 1).parse().unwrap());
        assert!(idempotency_key(&headers).is_err());
    }

    #[test]
    fn test_unknown_status_fails_to_parse() {
        assert!(serde_json::from_str::<StatusRequest>(r#"{"status":"lost"}"#).is_err());
        let ok: StatusRequest = serde_json::from_str(r#"{"status":"shipped"}"#).unwrap();
        assert_eq!(ok.status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_place_requires_session() {
        let response = test_support::app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/orders")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
