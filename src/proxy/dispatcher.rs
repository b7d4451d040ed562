//! Protocol dispatch.
//!
//! # Responsibilities
//! - Look up the proxy route for a request
//! - Rewrite the request target onto the upstream base URL
//! - Choose the HTTP or WebSocket transport from the upgrade headers
//!
//! # Design Decisions
//! - Planning is pure and synchronous; forwarding is the only async step
//! - No route means "not mine": the caller serves the request statically
//! - Both transports share one TLS client configuration

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, Uri};
use axum::response::{IntoResponse, Response};
use rustls::ClientConfig;

use crate::config::UpstreamConfig;
use crate::observability::metrics;
use crate::proxy::error::ProxyError;
use crate::proxy::transport::{pool_idle_timeout, HttpTransport};
use crate::proxy::websocket::WebSocketTransport;
use crate::routing::{rewrite_target, RouteKeys, RouteMatch, RouteTable};

/// Transport selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    WebSocket,
}

/// A routed request, ready to forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub route: RouteMatch,
    /// Rewritten upstream URI (still `http`/`https`).
    pub target: Uri,
    pub protocol: Protocol,
}

/// Routes requests to upstreams over the right transport.
#[derive(Debug)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    http: HttpTransport,
    websocket: WebSocketTransport,
}

impl Dispatcher {
    pub fn new(routes: Arc<RouteTable>, tls: Arc<ClientConfig>, upstream: &UpstreamConfig) -> Self {
        let http = HttpTransport::new(
            &tls,
            pool_idle_timeout(upstream.idle_timeout_base_secs),
            upstream.max_idle_per_host,
        );
        Self {
            routes,
            http,
            websocket: WebSocketTransport::new(tls),
        }
    }

    /// Decide where a request goes. `Ok(None)` means no proxy route matched.
    pub fn plan(&self, host: &str, uri: &Uri, headers: &HeaderMap) -> Result<Option<Dispatch>, ProxyError> {
        let keys = RouteKeys::new(host, uri.path());
        let Some(route) = self.routes.lookup_proxy(&keys) else {
            return Ok(None);
        };

        let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        let target = rewrite_target(&route, path_and_query).map_err(|source| ProxyError::InvalidTarget {
            key: route.key.clone(),
            source,
        })?;

        let protocol = if is_websocket_upgrade(headers) {
            Protocol::WebSocket
        } else {
            Protocol::Http
        };

        Ok(Some(Dispatch { route, target, protocol }))
    }

    /// Forward a planned request and produce the client response.
    pub async fn dispatch(&self, dispatch: Dispatch, request: Request<Body>, peer: SocketAddr) -> Response {
        let started = Instant::now();
        let Dispatch { route, target, protocol } = dispatch;

        tracing::debug!(
            route = %route.key,
            kind = ?route.kind,
            protocol = ?protocol,
            upstream = %target,
            "Proxying request"
        );

        let (kind, result) = match protocol {
            Protocol::Http => ("http_proxy", self.http.forward(request, target, peer).await),
            Protocol::WebSocket => ("ws_proxy", self.websocket.forward(request, target, peer).await),
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(route = %route.key, peer = %peer, error = %e, "Proxy error");
                e.into_response()
            }
        };

        metrics::record_request(kind, response.status().as_u16(), started);
        response
    }
}

/// True for `Connection: Upgrade` plus `Upgrade: websocket` (case-insensitive).
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let has_token = |name: header::HeaderName, token: &str| {
        headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.to_ascii_lowercase().contains(token))
    };
    has_token(header::CONNECTION, "upgrade") && has_token(header::UPGRADE, "websocket")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteEntry;
    use crate::net::tls::client_config;
    use crate::routing::MatchKind;
    use axum::http::HeaderValue;

    fn dispatcher() -> Dispatcher {
        let routes = RouteTable::from_config(
            &[
                RouteEntry::new("blog", "http://10.0.0.5:8080/"),
                RouteEntry::new("chat", "https://chat.internal/ws/"),
                RouteEntry::new("api.example.com", "http://10.0.0.1:9000/"),
                RouteEntry::new("api", "http://10.0.0.2:9000/"),
            ],
            &[],
        );
        Dispatcher::new(Arc::new(routes), client_config().unwrap(), &UpstreamConfig::default())
    }

    fn upgrade_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        headers
    }

    #[tokio::test]
    async fn plain_request_uses_http_transport() {
        let d = dispatcher();
        let uri: Uri = "/blog/posts/1".parse().unwrap();
        let plan = d.plan("www.example.com", &uri, &HeaderMap::new()).unwrap().unwrap();

        assert_eq!(plan.protocol, Protocol::Http);
        assert_eq!(plan.target.to_string(), "http://10.0.0.5:8080/posts/1");
        assert_eq!(plan.route.kind, MatchKind::Path);
    }

    #[tokio::test]
    async fn upgrade_request_uses_websocket_transport() {
        let d = dispatcher();
        let uri: Uri = "/chat/room?id=7".parse().unwrap();
        let plan = d.plan("www.example.com", &uri, &upgrade_headers()).unwrap().unwrap();

        assert_eq!(plan.protocol, Protocol::WebSocket);
        assert_eq!(crate::routing::websocket_url(&plan.target), "wss://chat.internal/ws/room?id=7");
    }

    #[tokio::test]
    async fn host_route_has_priority() {
        let d = dispatcher();
        let uri: Uri = "/api/users".parse().unwrap();
        let plan = d.plan("api.example.com", &uri, &HeaderMap::new()).unwrap().unwrap();

        assert_eq!(plan.route.kind, MatchKind::Host);
        assert_eq!(plan.target.to_string(), "http://10.0.0.1:9000/api/users");
    }

    #[tokio::test]
    async fn matched_segment_never_reaches_upstream() {
        let d = dispatcher();
        let uri: Uri = "//blog/posts/1".parse().unwrap();
        let plan = d.plan("www.example.com", &uri, &HeaderMap::new()).unwrap().unwrap();
        assert_eq!(plan.route.key, "blog");
        assert_eq!(plan.target.to_string(), "http://10.0.0.5:8080/posts/1");

        let uri: Uri = "/blog%2Fx/posts/1".parse().unwrap();
        assert!(d.plan("www.example.com", &uri, &HeaderMap::new()).unwrap().is_none());
    }

    #[tokio::test]
    async fn unrouted_request_is_not_planned() {
        let d = dispatcher();
        let uri: Uri = "/index.html".parse().unwrap();
        assert!(d.plan("www.example.com", &uri, &HeaderMap::new()).unwrap().is_none());
    }

    #[test]
    fn upgrade_detection_needs_both_headers() {
        assert!(is_websocket_upgrade(&upgrade_headers()));

        let mut only_upgrade = HeaderMap::new();
        only_upgrade.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        assert!(!is_websocket_upgrade(&only_upgrade));

        let mut h2c = upgrade_headers();
        h2c.insert(header::UPGRADE, HeaderValue::from_static("h2c"));
        assert!(!is_websocket_upgrade(&h2c));
    }
}
