//! Plain HTTP reverse-proxy transport.
//!
//! # Responsibilities
//! - Forward a request to its rewritten upstream URL
//! - Pool idle upstream connections
//! - Strip hop-by-hop headers in both directions
//!
//! # Design Decisions
//! - Method, headers (Host included) and body are passed through untouched
//! - No retries: a transport error becomes a 502 at the dispatcher
//! - Upstream requests always go out as HTTP/1.1

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Uri, Version};
use axum::response::Response;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rustls::ClientConfig;

use crate::proxy::error::ProxyError;

/// Pooled upstream client type.
pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Pool idle timeout is the configured base times this factor.
pub const IDLE_TIMEOUT_FACTOR: u32 = 8;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Idle timeout for pooled upstream connections.
pub fn pool_idle_timeout(base_secs: u64) -> Duration {
    Duration::from_secs(base_secs) * IDLE_TIMEOUT_FACTOR
}

/// Reverse-proxy transport over a pooled hyper client.
#[derive(Clone)]
pub struct HttpTransport {
    client: UpstreamClient,
}

impl HttpTransport {
    /// Build a transport using `tls` for `https` upstreams.
    pub fn new(tls: &ClientConfig, idle_timeout: Duration, max_idle_per_host: usize) -> Self {
        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls.clone())
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(idle_timeout)
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_timer(TokioTimer::new())
            .build(connector);

        Self { client }
    }

    /// Send `request` to `target` and stream the upstream response back.
    pub async fn forward(
        &self,
        mut request: Request<Body>,
        target: Uri,
        peer: SocketAddr,
    ) -> Result<Response, ProxyError> {
        *request.uri_mut() = target;
        *request.version_mut() = Version::HTTP_11;
        strip_hop_by_hop(request.headers_mut());
        append_forwarded_for(request.headers_mut(), peer);

        let response = self.client.request(request).await?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Append the client address to `X-Forwarded-For`.
pub fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let ip = peer.ip().to_string();
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{}, {}", existing, ip),
        _ => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_timeout_scales_base() {
        assert_eq!(pool_idle_timeout(10), Duration::from_secs(80));
    }

    #[test]
    fn strips_standard_and_listed_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-session-hop"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-session-hop", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::COOKIE, HeaderValue::from_static("a=b"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::COOKIE));
    }

    #[test]
    fn forwarded_for_appends_peer() {
        let peer: SocketAddr = "192.0.2.7:50000".parse().unwrap();
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, peer);
        assert_eq!(headers.get("x-forwarded-for").unwrap(), "192.0.2.7");

        append_forwarded_for(&mut headers, "198.51.100.1:1".parse().unwrap());
        assert_eq!(headers.get("x-forwarded-for").unwrap(), "192.0.2.7, 198.51.100.1");
    }
}
