//! WebSocket-aware reverse-proxy transport.
//!
//! # Responsibilities
//! - Complete the upstream WebSocket handshake (`ws`/`wss`)
//! - Upgrade the client connection once the upstream accepted
//! - Bidirectional frame forwarding
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Gateway ←──── WebSocket frames ────→ Upstream
//! ```
//!
//! # Design Decisions
//! - Upstream is dialed before answering 101, so a dead upstream is a 502
//! - The subprotocol chosen upstream is echoed to the client
//! - Close frames propagated in both directions

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::{CloseFrame as ClientCloseFrame, Message as ClientMessage, WebSocket, WebSocketUpgrade};
use axum::extract::FromRequestParts;
use axum::http::{header, HeaderMap, Request, Uri};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as UpstreamCloseFrame;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};

use crate::proxy::error::ProxyError;
use crate::proxy::transport::{append_forwarded_for, strip_hop_by_hop};
use crate::routing::websocket_url;

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handshake headers the WebSocket client library generates itself.
const GENERATED: [header::HeaderName; 4] = [
    header::HOST,
    header::SEC_WEBSOCKET_KEY,
    header::SEC_WEBSOCKET_VERSION,
    header::SEC_WEBSOCKET_EXTENSIONS,
];

/// Transport that bridges a client WebSocket to an upstream one.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    tls: Arc<ClientConfig>,
}

impl WebSocketTransport {
    pub fn new(tls: Arc<ClientConfig>) -> Self {
        Self { tls }
    }

    /// Connect to `target` (rewritten to `ws`/`wss`) and upgrade the client.
    pub async fn forward(
        &self,
        request: Request<Body>,
        target: Uri,
        peer: SocketAddr,
    ) -> Result<Response, ProxyError> {
        let (mut parts, _body) = request.into_parts();
        let upgrade = WebSocketUpgrade::from_request_parts(&mut parts, &()).await?;

        let url = websocket_url(&target);
        let mut upstream_request = url.as_str().into_client_request()?;
        copy_client_headers(&parts.headers, upstream_request.headers_mut());
        append_forwarded_for(upstream_request.headers_mut(), peer);

        let (upstream, handshake) = connect_async_tls_with_config(
            upstream_request,
            None,
            false,
            Some(Connector::Rustls(Arc::clone(&self.tls))),
        )
        .await?;

        let selected = handshake
            .headers()
            .get(header::SEC_WEBSOCKET_PROTOCOL)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let upgrade = match selected {
            Some(protocol) => upgrade.protocols([protocol]),
            None => upgrade,
        };

        tracing::debug!(upstream = %url, peer = %peer, "WebSocket upstream connected");
        Ok(upgrade.on_upgrade(move |socket| relay(socket, upstream, url)))
    }
}

/// Copy end-to-end client headers (cookies, auth, origin, subprotocols) upstream.
fn copy_client_headers(from: &HeaderMap, to: &mut HeaderMap) {
    let mut headers = from.clone();
    strip_hop_by_hop(&mut headers);
    for name in &GENERATED {
        headers.remove(name);
    }
    for (name, value) in headers.iter() {
        to.append(name.clone(), value.clone());
    }
}

async fn relay(client: WebSocket, upstream: UpstreamSocket, url: String) {
    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let client_to_upstream = async {
        while let Some(Ok(message)) = client_rx.next().await {
            let closing = matches!(message, ClientMessage::Close(_));
            if upstream_tx.send(to_upstream(message)).await.is_err() || closing {
                break;
            }
        }
    };

    let upstream_to_client = async {
        while let Some(Ok(message)) = upstream_rx.next().await {
            let Some(message) = to_client(message) else {
                continue;
            };
            let closing = matches!(message, ClientMessage::Close(_));
            if client_tx.send(message).await.is_err() || closing {
                break;
            }
        }
    };

    tokio::select! {
        _ = client_to_upstream => {}
        _ = upstream_to_client => {}
    }

    tracing::debug!(upstream = %url, "WebSocket proxy closed");
}

fn to_upstream(message: ClientMessage) -> UpstreamMessage {
    match message {
        ClientMessage::Text(text) => UpstreamMessage::text(text.as_str()),
        ClientMessage::Binary(data) => UpstreamMessage::Binary(data),
        ClientMessage::Ping(data) => UpstreamMessage::Ping(data),
        ClientMessage::Pong(data) => UpstreamMessage::Pong(data),
        ClientMessage::Close(frame) => UpstreamMessage::Close(frame.map(|f| UpstreamCloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.as_str().into(),
        })),
    }
}

fn to_client(message: UpstreamMessage) -> Option<ClientMessage> {
    let message = match message {
        UpstreamMessage::Text(text) => ClientMessage::Text(text.as_str().into()),
        UpstreamMessage::Binary(data) => ClientMessage::Binary(data),
        UpstreamMessage::Ping(data) => ClientMessage::Ping(data),
        UpstreamMessage::Pong(data) => ClientMessage::Pong(data),
        UpstreamMessage::Close(frame) => ClientMessage::Close(frame.map(|f| ClientCloseFrame {
            code: f.code.into(),
            reason: f.reason.as_str().into(),
        })),
        UpstreamMessage::Frame(_) => return None,
    };
    Some(message)
}
