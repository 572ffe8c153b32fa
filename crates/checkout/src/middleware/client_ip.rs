//! Client IP extraction for rate-limit keying.
//!
//! The service sits behind Cloudflare and the platform edge, so the real
//! client address arrives in forwarding headers. Checked in order:
//! `CF-Connecting-IP`, first hop of `X-Forwarded-For`, `X-Real-IP`,
//! `Fly-Client-IP`; the socket peer address is the last resort.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use std::convert::Infallible;

/// The originating client address of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Extract the client IP from proxy forwarding headers.
#[must_use]
pub fn from_forwarding_headers(headers: &HeaderMap) -> Option<IpAddr> {
    // Try CF-Connecting-IP first (Cloudflare's real client IP)
    if let Some(ip) = headers
        .get("cf-connecting-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    // Try X-Forwarded-For (first IP in the chain)
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    // Try X-Real-IP
    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    // Try Fly-Client-IP (Fly.io's header)
    if let Some(ip) = headers
        .get("fly-client-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    None
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = from_forwarding_headers(&parts.headers)
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|info| info.0.ip())
            })
            // No forwarding headers and no socket info (e.g. in-process
            // test harness): all such requests share one counter.
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        Ok(Self(ip))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_cf_connecting_ip_takes_precedence() {
        let map = headers(&[
            ("cf-connecting-ip", "198.51.100.7"),
            ("x-forwarded-for", "203.0.113.1"),
        ]);
        assert_eq!(
            from_forwarding_headers(&map),
            Some("198.51.100.7".parse().unwrap())
        );
    }

    #[test]
    fn test_x_forwarded_for_first_hop() {
        let map = headers(&[("x-forwarded-for", "203.0.113.1, 10.0.0.2, 10.0.0.3")]);
        assert_eq!(
            from_forwarding_headers(&map),
            Some("203.0.113.1".parse().unwrap())
        );
    }

    #[test]
    fn test_x_real_ip_fallback() {
        let map = headers(&[("x-real-ip", " 192.0.2.44 ")]);
        assert_eq!(
            from_forwarding_headers(&map),
            Some("192.0.2.44".parse().unwrap())
        );
    }

    #[test]
    fn test_fly_client_ip_fallback() {
        let map = headers(&[("fly-client-ip", "2001:db8::1")]);
        assert_eq!(
            from_forwarding_headers(&map),
            Some("2001:db8::1".parse().unwrap())
        );
    }

    #[test]
    fn test_unparseable_headers_skipped() {
        let map = headers(&[
            ("cf-connecting-ip", "not-an-ip"),
            ("x-forwarded-for", "192.0.2.9"),
        ]);
        assert_eq!(
            from_forwarding_headers(&map),
            Some("192.0.2.9".parse().unwrap())
        );
    }

    #[test]
    fn test_no_headers() {
        assert_eq!(from_forwarding_headers(&HeaderMap::new()), None);
    }
}
