//! Reviews, collections and forum votes.
//!
//! Requires a running storefront with a seeded catalog and the admin
//! credentials from the crate docs.

#![allow(clippy::unwrap_used)]

use discvault_integration_tests::{TestClient, create_product};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_second_review_of_a_product_is_conflict() {
    let admin = TestClient::admin().await.unwrap();
    let product = create_product(&admin, "music", "10.00", 1).await;
    let path = format!("/api/products/{}/reviews", product["id"]);

    let (client, _) = TestClient::register("critic").await;
    let resp = client.post(&path, &json!({ "rating": 4, "body": "Good" })).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client.post(&path, &json!({ "rating": 2, "body": "Changed my mind" })).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = client.post(&path, &json!({ "rating": 6, "body": "Too much" })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_rating_filter_uses_average_rating() {
    let admin = TestClient::admin().await.unwrap();
    let product = create_product(&admin, "movie", "10.00", 1).await;
    let id = product["id"].as_i64().unwrap();
    let path = format!("/api/products/{id}/reviews");

    let (first, _) = TestClient::register("rate_a").await;
    let (second, _) = TestClient::register("rate_b").await;
    first.post(&path, &json!({ "rating": 5, "body": "" })).await;
    second.post(&path, &json!({ "rating": 4, "body": "" })).await;

    let page: Value = admin
        .get("/api/products?minRating=4&pageSize=100&sort=newest")
        .await
        .json()
        .await
        .unwrap();
    let ids: Vec<i64> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["id"].as_i64())
        .collect();
    assert!(ids.contains(&id));

    let page: Value = admin
        .get("/api/products?minRating=5&pageSize=100&sort=newest")
        .await
        .json()
        .await
        .unwrap();
    assert!(
        page["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|p| p["id"].as_i64() != Some(id))
    );
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_built_in_collections_cannot_be_renamed_or_deleted() {
    let (client, _) = TestClient::register("lists").await;

    let resp = client.delete("/api/collections/Favorites").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = client
        .put("/api/collections/look%20again", &json!({ "name": "Later" }))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = client
        .post("/api/collections", &json!({ "name": "favorites" }))
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = client
        .post("/api/collections", &json!({ "name": "Road Trip" }))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = client.delete("/api/collections/road%20trip").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_deleted_collection_takes_its_items_along() {
    let admin = TestClient::admin().await.unwrap();
    let product = create_product(&admin, "music", "18.00", 1).await;

    let (client, _) = TestClient::register("roadtrip").await;
    let resp = client
        .post("/api/collections", &json!({ "name": "Road Trip" }))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client
        .post(
            "/api/collections/road%20trip/items",
            &json!({ "productId": product["id"] }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let items: Value = resp.json().await.unwrap();
    assert_eq!(items.as_array().unwrap().len(), 1);

    let resp = client.delete("/api/collections/road%20trip").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client
        .post("/api/collections", &json!({ "name": "Road Trip" }))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let collections: Value = client.get("/api/collections").await.json().await.unwrap();
    let road_trip = collections
        .as_array()
        .and_then(|all| all.iter().find(|c| c["name"] == "Road Trip"))
        .unwrap();
    assert_eq!(road_trip["itemCount"], 0);

    let items: Value = client
        .get("/api/collections/road%20trip/items")
        .await
        .json()
        .await
        .unwrap();
    assert!(items.as_array().unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_repeating_a_vote_removes_it() {
    let admin = TestClient::admin().await.unwrap();
    let channels: Value = admin.get("/api/channels").await.json().await.unwrap();
    let slug = channels
        .as_array()
        .and_then(|all| all.first())
        .and_then(|c| c["slug"].as_str())
        .unwrap()
        .to_owned();

    let (author, _) = TestClient::register("poster").await;
    let post: Value = author
        .post(
            &format!("/api/channels/{slug}/posts"),
            &json!({ "title": "Best pressing?", "body": "Discuss." }),
        )
        .await
        .json()
        .await
        .unwrap();
    let vote_path = format!("/api/posts/{}/vote", post["id"]);

    let (voter, _) = TestClient::register("voter").await;
    let outcome: Value = voter.post(&vote_path, &json!({ "value": 1 })).await.json().await.unwrap();
    assert_eq!(outcome["score"], 1);
    assert_eq!(outcome["myVote"], 1);

    let outcome: Value = voter.post(&vote_path, &json!({ "value": -1 })).await.json().await.unwrap();
    assert_eq!(outcome["score"], -1);
    assert_eq!(outcome["myVote"], -1);

    let outcome: Value = voter.post(&vote_path, &json!({ "value": -1 })).await.json().await.unwrap();
    assert_eq!(outcome["score"], 0);
    assert_eq!(outcome["myVote"], Value::Null);

    let resp = voter.post(&vote_path, &json!({ "value": 2 })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
