//! Registration, login and built-in collections.
//!
//! Requires a migrated database and a running storefront. See the crate
//! docs for the environment variables.

#![allow(clippy::unwrap_used)]

use discvault_integration_tests::{TEST_PASSWORD, TestClient, unique_username};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_registration_logs_in_and_creates_built_in_collections() {
    let (client, user) = TestClient::register("acct").await;

    let me: Value = client.get("/auth").await.json().await.unwrap();
    assert_eq!(me["id"], user["id"]);
    assert_eq!(me["role"], "user");

    let collections: Value = client.get("/api/collections").await.json().await.unwrap();
    let names: Vec<&str> = collections
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert!(names.contains(&"Favorites"));
    assert!(names.contains(&"Look Again"));
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_duplicate_username_is_conflict() {
    let client = TestClient::anonymous();
    let username = unique_username("dup");
    let body = json!({
        "username": username,
        "email": format!("{username}@example.com"),
        "password": TEST_PASSWORD,
    });
    assert_eq!(client.post_identity("/register", &body).await.status(), StatusCode::CREATED);

    let again = json!({
        "username": username.to_uppercase(),
        "email": format!("other-{username}@example.com"),
        "password": TEST_PASSWORD,
    });
    let resp = TestClient::anonymous().post_identity("/register", &again).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_short_password_is_rejected() {
    let username = unique_username("weak");
    let resp = TestClient::anonymous()
        .post_identity(
            "/register",
            &json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "short",
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_login_with_email_and_logout() {
    let (registered, user) = TestClient::register("login").await;
    drop(registered);

    let client = TestClient::anonymous();
    let resp = client
        .post_identity(
            "/auth",
            &json!({ "login": user["email"], "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.post("/auth/logout", &json!({})).await;
    assert!(resp.status().is_success());
    assert_eq!(client.get("/auth").await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_wrong_password_is_unauthorized() {
    let (_, user) = TestClient::register("badpw").await;
    let resp = TestClient::anonymous()
        .post_identity(
            "/auth",
            &json!({ "login": user["username"], "password": "not-the-password" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
