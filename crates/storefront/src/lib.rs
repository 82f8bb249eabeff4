//! Disc Vault storefront library.
//!
//! The storefront binary is a thin wrapper around [`app`]; exposing the
//! router here lets the CLI share the repositories and lets tests build the
//! full application.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the complete application router.
///
/// Layer order, outermost first: Sentry, tracing, request id, security
/// headers, CORS, session.
/// Rate limits apply per route group.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());
    let cors = cors_layer(&state.config().cors_origins);
    let images = ServeDir::new(&state.config().images_dir);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::identity_routes().layer(middleware::auth_rate_limiter()))
        .merge(routes::api_routes().layer(middleware::api_rate_limiter()))
        .nest_service("/images", images)
        .layer(session_layer)
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::security_headers_middleware))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// CORS for the configured browser origins. Credentials are allowed so the
/// session cookie travels with cross-origin requests.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|e| tracing::warn!(origin, "Ignoring invalid CORS origin: {e}"))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("idempotency-key"),
        ])
        .allow_credentials(true)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!("Readiness check failed: {e}");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
