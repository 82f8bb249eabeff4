//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: strict limits for login and registration (~10/min)
//! - `api_rate_limiter`: relaxed limits for the JSON API (~100/min)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Key extractor that prefers reverse-proxy headers and falls back to the
/// peer address of the TCP connection.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();

        // First hop of X-Forwarded-For is the original client
        if let Some(ip) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(ip);
        }

        if let Some(ip) = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(ip);
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create rate limiter for auth endpoints: ~10 requests per minute per IP.
///
/// Configuration: 1 request every 6 seconds (replenish), burst of 5.
///
/// # Panics
///
/// Does not panic: `per_second(6)` and `burst_size(5)` are both non-zero,
/// which is all `GovernorConfigBuilder::finish` checks.
#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Create rate limiter for the JSON API: ~100 requests per minute per IP.
///
/// Configuration: 1 request per second (replenish), burst of 100.
///
/// # Panics
///
/// Does not panic: `per_second(1)` and `burst_size(100)` are both non-zero.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(1)
        .burst_size(100)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(100) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn request() -> axum::http::request::Builder {
        Request::builder().uri("/")
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let req = request()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        let ip = ClientIpKeyExtractor.extract(&req).unwrap();
        assert_eq!(ip, "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_real_ip_header() {
        let req = request().header("x-real-ip", "198.51.100.2").body(()).unwrap();
        let ip = ClientIpKeyExtractor.extract(&req).unwrap();
        assert_eq!(ip, "198.51.100.2".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let mut req = request().body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("192.0.2.10:5555".parse::<SocketAddr>().unwrap()));
        let ip = ClientIpKeyExtractor.extract(&req).unwrap();
        assert_eq!(ip, "192.0.2.10".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_no_source_is_an_error() {
        let req = request().body(()).unwrap();
        assert!(ClientIpKeyExtractor.extract(&req).is_err());
    }
}
