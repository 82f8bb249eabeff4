//! Request ID middleware.
//!
//! Reuses a well-formed `x-request-id` from an upstream proxy, otherwise
//! assigns a UUID v4. The id is recorded on the tracing span, tagged on the
//! Sentry scope, stored in request extensions as [`RequestId`] and echoed in
//! the response headers.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream request id accepted verbatim.
const MAX_REQUEST_ID_LENGTH: usize = 128;

/// The id assigned to the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Accept an upstream id only if it is short visible ASCII.
fn sanitize(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= MAX_REQUEST_ID_LENGTH
        && trimmed.bytes().all(|b| b.is_ascii_graphic());
    valid.then_some(trimmed)
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(sanitize)
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, http::Request as HttpRequest, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route(
                "/",
                get(|axum::Extension(id): axum::Extension<RequestId>| async move { id.0 }),
            )
            .layer(axum::middleware::from_fn(request_id_middleware))
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize(" abc-123 "), Some("abc-123"));
        assert_eq!(sanitize(""), None);
        assert_eq!(sanitize("has space"), None);
        assert_eq!(sanitize(&"x".repeat(MAX_REQUEST_ID_LENGTH + 1)), None);
    }

    #[tokio::test]
    async fn test_generates_id_when_missing() {
        let response = app()
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let header = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert!(Uuid::parse_str(header.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_reuses_upstream_id() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header(REQUEST_ID_HEADER, "edge-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "edge-42");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"edge-42");
    }
}
