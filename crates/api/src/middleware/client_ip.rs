//! Caller IP extraction.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

/// The caller's IP as reported by the reverse proxy, if any.
///
/// Reads the first hop of `X-Forwarded-For`, then `X-Real-IP`.
#[derive(Debug, Clone, Default)]
pub struct ClientIp(pub Option<String>);

impl ClientIp {
    /// Prefer the proxy-reported address over a client-supplied one.
    pub fn or(self, fallback: Option<String>) -> Option<String> {
        normalize_ip(self.0).or_else(|| normalize_ip(fallback))
    }
}

/// Drop blank values and the `unknown` placeholder some clients send.
pub fn normalize_ip(ip: Option<String>) -> Option<String> {
    ip.map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("unknown"))
}

fn from_headers(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::to_string);
    let real = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    normalize_ip(forwarded).or_else(|| normalize_ip(real()))
}

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(from_headers(&parts.headers)))
    }
}
