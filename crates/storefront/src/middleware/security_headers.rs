//! Security headers for API and image responses.
//!
//! The storefront serves JSON and images only, so the policy denies every
//! active content type and framing outright.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

/// Path prefixes whose responses may carry per-user data.
const PRIVATE_PREFIXES: [&str; 3] = ["/api/", "/auth", "/register"];

fn is_private(path: &str) -> bool {
    PRIVATE_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Add security headers to all responses.
///
/// - `X-Content-Type-Options: nosniff`
/// - `X-Frame-Options: DENY` and `frame-ancestors 'none'`
/// - `Referrer-Policy: no-referrer`
/// - `Content-Security-Policy: default-src 'none'`
/// - `Cross-Origin-Resource-Policy: same-site`
///
/// API and identity responses also get `Cache-Control: no-store` unless the
/// handler set its own; images keep whatever the file service sends.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let private = is_private(request.uri().path());
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.insert(
        CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-site"),
    );

    if private && !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/api/cart", get(|| async { "{}" }))
            .route("/images/cover.jpg", get(|| async { "jpeg" }))
            .route(
                "/api/news",
                get(|| async { ([(CACHE_CONTROL, "public, max-age=60")], "[]") }),
            )
            .layer(axum::middleware::from_fn(security_headers_middleware))
    }

    async fn headers_for(path: &str) -> axum::http::HeaderMap {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        app().oneshot(request).await.unwrap().headers().clone()
    }

    #[tokio::test]
    async fn test_api_responses_are_not_cached() {
        let headers = headers_for("/api/cart").await;
        assert_eq!(headers[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[CACHE_CONTROL], "no-store");
    }

    #[tokio::test]
    async fn test_images_keep_default_caching() {
        let headers = headers_for("/images/cover.jpg").await;
        assert_eq!(headers[REFERRER_POLICY], "no-referrer");
        assert!(!headers.contains_key(CACHE_CONTROL));
    }

    #[tokio::test]
    async fn test_handler_cache_control_wins() {
        let headers = headers_for("/api/news").await;
        assert_eq!(headers[CACHE_CONTROL], "public, max-age=60");
    }

    #[test]
    fn test_private_prefixes() {
        assert!(is_private("/auth/logout"));
        assert!(is_private("/register"));
        assert!(!is_private("/health"));
    }
}
