//! End-to-end tests for the Disc Vault storefront API.
//!
//! The tests talk HTTP to a running server and are `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! dv-cli migrate
//! dv-cli user create -u vaultadmin -e admin@example.com -p 'admin-password' --admin
//! cargo run -p discvault-storefront &
//!
//! DISCVAULT_TEST_ADMIN_LOGIN=vaultadmin \
//! DISCVAULT_TEST_ADMIN_PASSWORD=admin-password \
//!     cargo test -p discvault-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `DISCVAULT_TEST_BASE_URL` - Storefront URL (default `http://localhost:3000`)
//! - `DISCVAULT_TEST_ADMIN_LOGIN` / `DISCVAULT_TEST_ADMIN_PASSWORD` - An
//!   administrator account, needed by tests that create catalog data

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Identity routes allow a burst of five, then one request every six seconds.
const IDENTITY_RETRY_DELAY: Duration = Duration::from_secs(6);
const IDENTITY_RETRIES: usize = 10;

/// Password used for every throwaway account.
pub const TEST_PASSWORD: &str = "integration-pass";

/// Base URL of the storefront under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("DISCVAULT_TEST_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A fresh username that will not collide with earlier runs.
#[must_use]
pub fn unique_username(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", suffix.get(..10).unwrap_or(&suffix))
}

/// An HTTP client bound to one session.
pub struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    /// A client with its own cookie jar and no session yet.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn anonymous() -> Self {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: base_url(),
        }
    }

    /// Register a new account and keep its session.
    ///
    /// # Panics
    ///
    /// Panics if registration does not return 201.
    pub async fn register(prefix: &str) -> (Self, Value) {
        let this = Self::anonymous();
        let username = unique_username(prefix);
        let resp = this
            .post_identity(
                "/register",
                &json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": TEST_PASSWORD,
                }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED, "registration failed");
        let user = resp.json().await.expect("Failed to parse user");
        (this, user)
    }

    /// Log in as the administrator named by the environment.
    ///
    /// Returns `None` when the variables are not set.
    ///
    /// # Panics
    ///
    /// Panics if the credentials are rejected.
    pub async fn admin() -> Option<Self> {
        let login = std::env::var("DISCVAULT_TEST_ADMIN_LOGIN").ok()?;
        let password = std::env::var("DISCVAULT_TEST_ADMIN_PASSWORD").ok()?;
        let this = Self::anonymous();
        let resp = this
            .post_identity("/auth", &json!({ "login": login, "password": password }))
            .await;
        assert_eq!(resp.status(), StatusCode::OK, "admin login failed");
        Some(this)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST request failed")
    }

    /// POST to an identity route, waiting out the rate limiter.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn post_identity(&self, path: &str, body: &Value) -> Response {
        for _ in 0..IDENTITY_RETRIES {
            let resp = self.post(path, body).await;
            if resp.status() != StatusCode::TOO_MANY_REQUESTS {
                return resp;
            }
            tokio::time::sleep(IDENTITY_RETRY_DELAY).await;
        }
        self.post(path, body).await
    }

    /// POST with an `Idempotency-Key` header.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn post_idempotent(&self, path: &str, key: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .header("idempotency-key", key)
            .json(body)
            .send()
            .await
            .expect("POST request failed")
    }

    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn put(&self, path: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("PUT request failed")
    }

    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("DELETE request failed")
    }
}

/// Create a product in the first category of the given kind.
///
/// # Panics
///
/// Panics if the category is missing or creation fails.
pub async fn create_product(admin: &TestClient, kind: &str, price: &str, stock: i32) -> Value {
    let categories: Value = admin
        .get("/api/categories")
        .await
        .json()
        .await
        .expect("Failed to parse categories");
    let category = categories
        .as_array()
        .and_then(|all| all.iter().find(|c| c["kind"] == kind))
        .unwrap_or_else(|| panic!("no '{kind}' category; run dv-cli seed first"));

    let resp = admin
        .post(
            "/api/products",
            &json!({
                "categoryId": category["id"],
                "title": format!("Test {}", Uuid::new_v4()),
                "price": price,
                "stock": stock,
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED, "product creation failed");
    resp.json().await.expect("Failed to parse product")
}
