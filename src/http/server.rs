//! HTTP server setup and connection handling.
//!
//! # Responsibilities
//! - Create the Axum router and wire up middleware (tracing, request ID,
//!   timeouts, compression, site headers)
//! - Order request handling: proxy route, redirect route, static content
//! - Accept plain and TLS connections and serve them with HTTP/1.1 and HTTP/2
//! - Start the cache refresher and drain connections on shutdown

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderValue, Request, StatusCode, Uri};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::Router;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnectionBuilder;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tower_http::compression::CompressionLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::http::request::{peer_addr, request_id, UuidRequestId, X_REQUEST_ID};
use crate::http::response::{site_headers, CachePolicy, SiteHeaders};
use crate::http::static_files::StaticSite;
use crate::lifecycle::Shutdown;
use crate::net::{client_config, ConnectionTracker, Listener, ListenerError, TlsError};
use crate::observability::metrics;
use crate::proxy::{Dispatcher, ProxyError};
use crate::refresh::{CacheRefresher, RefreshError};
use crate::routing::{request_host, rewrite_target, RouteKeys, RouteMatch, RouteTable};
use crate::vhost::HostResolver;

/// Time allowed to read request headers.
pub const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed to produce a response.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for open connections to finish after shutdown.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Errors building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("failed to start cache refresher: {0}")]
    Refresh(#[from] RefreshError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub dispatcher: Arc<Dispatcher>,
    pub site: Arc<StaticSite>,
}

/// The gateway's HTTP server.
pub struct HttpServer {
    app: Router,
    plain_app: Router,
    refresher: Option<CacheRefresher>,
    connections: Arc<ConnectionBuilder<TokioExecutor>>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Build the server from an already adjusted configuration.
    pub fn new(config: &GatewayConfig) -> Result<Self, ServerError> {
        let root = PathBuf::from(&config.server.root);
        let tls = client_config()?;

        let routes = Arc::new(RouteTable::from_config(&config.proxies, &config.redirects));
        let resolver = Arc::new(HostResolver::new(
            &root,
            config.vhost.dynamic_serving,
            config.vhost.cache_lookups,
        ));
        let site = Arc::new(StaticSite::new(
            &root,
            resolver,
            config.cache.enabled,
            CachePolicy::from_hours(config.headers.caching_hours),
        ));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&routes), Arc::clone(&tls), &config.upstream));

        tracing::info!(
            proxies = config.proxies.len(),
            redirects = config.redirects.len(),
            dynamic_serving = config.vhost.dynamic_serving,
            "Routes loaded"
        );

        let headers = Arc::new(SiteHeaders::from_config(&config.server, &config.headers, config.server.https));
        let state = AppState { routes, dispatcher, site };

        let app = Self::build_router(
            Router::new().fallback(gateway_handler).with_state(state),
            Arc::clone(&headers),
            config.headers.gzip,
        );

        let plain_app = if config.server.https && config.headers.hsts.enabled {
            Self::build_router(Router::new().fallback(https_redirect), headers, false)
        } else {
            app.clone()
        };

        let refresher = if config.cache.enabled {
            Some(CacheRefresher::new(
                root.join("cache"),
                Duration::from_secs(config.cache.update_interval_secs),
                Duration::from_secs(config.cache.fetch_timeout_secs),
                tls,
            )?)
        } else {
            None
        };

        let idle = Duration::from_secs(config.server.keep_alive_timeout_secs);
        let mut connections = ConnectionBuilder::new(TokioExecutor::new());
        connections
            .http1()
            .keep_alive(true)
            .timer(TokioTimer::new())
            .header_read_timeout(HEADER_READ_TIMEOUT);
        connections
            .http2()
            .timer(TokioTimer::new())
            .keep_alive_interval(Some(idle))
            .keep_alive_timeout(idle);

        Ok(Self {
            app,
            plain_app,
            refresher,
            connections: Arc::new(connections),
            tracker: ConnectionTracker::new(),
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(router: Router, headers: Arc<SiteHeaders>, gzip: bool) -> Router {
        router
            .layer(middleware::from_fn_with_state(headers, site_headers))
            .layer(CompressionLayer::new().gzip(gzip))
            .layer(TimeoutLayer::new(WRITE_TIMEOUT))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id(request),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), UuidRequestId))
    }

    /// Serve until `shutdown` fires, then drain open connections.
    pub async fn run(
        self,
        plain: Listener,
        secure: Option<(Listener, TlsAcceptor)>,
        shutdown: Shutdown,
    ) -> Result<(), ServerError> {
        let mut background = Vec::new();
        if let Some(refresher) = self.refresher {
            background.push(tokio::spawn(refresher.run(shutdown.subscribe())));
        }

        let mut listeners = JoinSet::new();
        listeners.spawn(accept_loop(
            plain,
            None,
            self.plain_app,
            Arc::clone(&self.connections),
            self.tracker.clone(),
            shutdown.subscribe(),
        ));
        if let Some((listener, acceptor)) = secure {
            listeners.spawn(accept_loop(
                listener,
                Some(acceptor),
                self.app,
                Arc::clone(&self.connections),
                self.tracker.clone(),
                shutdown.subscribe(),
            ));
        }

        let mut outcome = Ok(());
        while let Some(joined) = listeners.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Listener failed, shutting down");
                    shutdown.trigger();
                    outcome = Err(e.into());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Listener task panicked, shutting down");
                    shutdown.trigger();
                }
            }
        }

        let active = self.tracker.active_count();
        if active > 0 {
            tracing::info!(active, "Draining connections");
            if !self.tracker.drain(DRAIN_TIMEOUT).await {
                tracing::warn!(
                    remaining = self.tracker.active_count(),
                    "Drain timeout reached, closing remaining connections"
                );
            }
        }

        for task in background {
            let _ = task.await;
        }

        tracing::info!("HTTP server stopped");
        outcome
    }
}

async fn accept_loop(
    listener: Listener,
    tls: Option<TlsAcceptor>,
    app: Router,
    connections: Arc<ConnectionBuilder<TokioExecutor>>,
    tracker: ConnectionTracker,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), ListenerError> {
    let scheme = if tls.is_some() { "https" } else { "http" };
    match listener.local_addr() {
        Ok(addr) => tracing::info!(address = %addr, scheme, "Accepting connections"),
        Err(e) => tracing::warn!(error = %e, scheme, "Listener address unavailable"),
    }

    loop {
        let (stream, peer, permit) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(connection) => connection,
                Err(ListenerError::Accept(e)) => {
                    tracing::warn!(error = %e, scheme, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
                Err(e) => return Err(e),
            },
            _ = shutdown.recv() => {
                tracing::info!(scheme, "Shutdown signal received, no longer accepting");
                return Ok(());
            }
        };

        let guard = tracker.track();
        let app = app.clone();
        let tls = tls.clone();
        let connections = Arc::clone(&connections);
        let shutdown = shutdown.resubscribe();

        tokio::spawn(async move {
            let _permit = permit;
            tracing::trace!(connection = %guard.id(), peer = %peer, scheme, "Connection accepted");

            match tls {
                Some(acceptor) => match tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                    Ok(Ok(stream)) => serve_connection(stream, peer, app, &connections, shutdown).await,
                    Ok(Err(e)) => tracing::debug!(peer = %peer, error = %e, "TLS handshake failed"),
                    Err(_) => tracing::debug!(peer = %peer, "TLS handshake timed out"),
                },
                None => serve_connection(stream, peer, app, &connections, shutdown).await,
            }

            drop(guard);
        });
    }
}

async fn serve_connection<I>(
    io: I,
    peer: SocketAddr,
    app: Router,
    connections: &ConnectionBuilder<TokioExecutor>,
    mut shutdown: broadcast::Receiver<()>,
) where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        app.clone().oneshot(request)
    });

    let connection = connections.serve_connection_with_upgrades(TokioIo::new(io), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = shutdown.recv() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };

    if let Err(e) = result {
        tracing::debug!(peer = %peer, error = %e, "Connection closed with error");
    }
}

/// Proxy, then redirect, then static content.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let peer = peer_addr(&request);
    let host = request_host(request.headers(), request.uri()).to_string();

    match state.dispatcher.plan(&host, request.uri(), request.headers()) {
        Ok(Some(plan)) => return state.dispatcher.dispatch(plan, request, peer).await,
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(host = %host, error = %e, "Proxy route unusable");
            return e.into_response();
        }
    }

    let redirect = state
        .routes
        .lookup_redirect(&RouteKeys::new(&host, request.uri().path()));
    if let Some(route) = redirect {
        return route_redirect(&route, request.uri());
    }

    state.site.serve(&host, request).await
}

fn route_redirect(route: &RouteMatch, uri: &Uri) -> Response {
    let started = Instant::now();
    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    let response = match rewrite_target(route, path_and_query) {
        Ok(target) => moved_permanently(&target.to_string()),
        Err(source) => ProxyError::InvalidTarget {
            key: route.key.clone(),
            source,
        }
        .into_response(),
    };

    metrics::record_request("redirect", response.status().as_u16(), started);
    response
}

/// Plain-listener handler while HTTPS with HSTS is active.
async fn https_redirect(request: Request<Body>) -> Response {
    let started = Instant::now();
    let host = strip_port(request_host(request.headers(), request.uri()));
    let path_and_query = request.uri().path_and_query().map(|p| p.as_str()).unwrap_or("/");

    let response = moved_permanently(&format!("https://{}{}", host, path_and_query));
    metrics::record_request("redirect", response.status().as_u16(), started);
    response
}

fn moved_permanently(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// Host without a trailing `:port` (IPv6 literals keep their brackets).
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}
