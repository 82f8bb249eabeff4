//! Cart, orders and stock.
//!
//! Requires a running storefront with a seeded catalog and the admin
//! credentials from the crate docs.

#![allow(clippy::unwrap_used)]

use discvault_integration_tests::{TestClient, create_product};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

fn decimal(value: &Value) -> f64 {
    value.as_str().and_then(|s| s.parse().ok()).unwrap()
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_order_from_cart_charges_current_price_and_decrements_stock() {
    let admin = TestClient::admin().await.unwrap();
    let product = create_product(&admin, "music", "12.50", 5).await;
    let id = &product["id"];

    let (client, _) = TestClient::register("buyer").await;
    let resp = client
        .post("/api/cart", &json!({ "productId": id, "quantity": 2 }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post("/api/orders", &json!({ "shippingAddress": "1 Vault Street" }))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.unwrap();
    assert!((decimal(&order["total"]) - 25.0).abs() < f64::EPSILON);
    assert_eq!(order["status"], "pending");

    let cart: Value = client.get("/api/cart").await.json().await.unwrap();
    assert_eq!(cart["lines"].as_array().unwrap().len(), 0);

    let product: Value = client
        .get(&format!("/api/products/{id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(product["stock"], 3);

    let resp = admin
        .put(
            &format!("/api/products/{id}"),
            &json!({
                "categoryId": product["category"]["id"],
                "title": product["title"],
                "price": "99.00",
                "stock": 3,
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let placed: Value = client
        .get(&format!("/api/orders/{}", order["id"]))
        .await
        .json()
        .await
        .unwrap();
    assert!((decimal(&placed["total"]) - 25.0).abs() < f64::EPSILON);
    let item = &placed["items"][0];
    assert!((decimal(&item["unitPrice"]) - 12.5).abs() < f64::EPSILON);
    assert_eq!(item["quantity"], 2);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_cart_line_is_capped_at_ninety_nine() {
    let admin = TestClient::admin().await.unwrap();
    let product = create_product(&admin, "movie", "3.00", 500).await;
    let id = &product["id"];

    let (client, _) = TestClient::register("bulk").await;
    let resp = client
        .post("/api/cart", &json!({ "productId": id, "quantity": 99 }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post("/api/cart", &json!({ "productId": id, "quantity": 1 }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let cart: Value = client.get("/api/cart").await.json().await.unwrap();
    assert_eq!(cart["lines"][0]["quantity"], 99);
    assert_eq!(cart["itemCount"], 99);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_category_and_price_bounds_filter_together() {
    let admin = TestClient::admin().await.unwrap();
    let below = create_product(&admin, "game", "99.99", 1).await;
    let at_min = create_product(&admin, "game", "100.00", 1).await;
    let inside = create_product(&admin, "game", "300.00", 1).await;
    let at_max = create_product(&admin, "game", "500.00", 1).await;
    let above = create_product(&admin, "game", "500.01", 1).await;
    let elsewhere = create_product(&admin, "music", "300.00", 1).await;
    let category_id = &inside["category"]["id"];

    let page: Value = admin
        .get(&format!(
            "/api/products?categoryId={category_id}&priceMin=100&priceMax=500&pageSize=100&sort=newest"
        ))
        .await
        .json()
        .await
        .unwrap();
    let items = page["items"].as_array().unwrap();
    for item in items {
        assert_eq!(&item["categoryId"], category_id);
        let price = decimal(&item["price"]);
        assert!((100.0..=500.0).contains(&price), "price {price} out of bounds");
    }

    let ids: Vec<&Value> = items.iter().map(|p| &p["id"]).collect();
    for expected in [&at_min, &inside, &at_max] {
        assert!(ids.contains(&&expected["id"]));
    }
    for excluded in [&below, &above, &elsewhere] {
        assert!(!ids.contains(&&excluded["id"]));
    }
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_insufficient_stock_is_conflict_and_changes_nothing() {
    let admin = TestClient::admin().await.unwrap();
    let product = create_product(&admin, "game", "40.00", 1).await;
    let id = &product["id"];

    let (client, _) = TestClient::register("greedy").await;
    let resp = client
        .post(
            "/api/orders",
            &json!({ "items": [{ "productId": id, "quantity": 2 }] }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let product: Value = client
        .get(&format!("/api/products/{id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(product["stock"], 1);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_idempotency_key_replays_the_same_order() {
    let admin = TestClient::admin().await.unwrap();
    let product = create_product(&admin, "movie", "9.99", 10).await;
    let body = json!({ "items": [{ "productId": product["id"], "quantity": 1 }] });
    let key = Uuid::new_v4().to_string();

    let (client, _) = TestClient::register("retry").await;
    let first = client.post_idempotent("/api/orders", &key, &body).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first: Value = first.json().await.unwrap();

    let second = client.post_idempotent("/api/orders", &key, &body).await;
    assert_eq!(second.status(), StatusCode::OK);
    let second: Value = second.json().await.unwrap();
    assert_eq!(first["id"], second["id"]);

    let orders: Value = client.get("/api/orders").await.json().await.unwrap();
    assert_eq!(orders["total"], 1);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_cancel_restocks_and_other_users_cannot_see_the_order() {
    let admin = TestClient::admin().await.unwrap();
    let product = create_product(&admin, "music", "15.00", 4).await;
    let id = &product["id"];

    let (client, _) = TestClient::register("cancel").await;
    let order: Value = client
        .post(
            "/api/orders",
            &json!({ "items": [{ "productId": id, "quantity": 3 }] }),
        )
        .await
        .json()
        .await
        .unwrap();
    let order_id = &order["id"];

    let (stranger, _) = TestClient::register("stranger").await;
    let resp = stranger.get(&format!("/api/orders/{order_id}")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .post(&format!("/api/orders/{order_id}/cancel"), &json!({}))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cancelled: Value = resp.json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");

    let product: Value = client
        .get(&format!("/api/products/{id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(product["stock"], 4);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_ordering_an_empty_cart_is_bad_request() {
    let (client, _) = TestClient::register("empty").await;
    let resp = client.post("/api/orders", &json!({})).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
