//! Proxy error type.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::uri::InvalidUri;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors raised while forwarding a request upstream.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("route {key:?} produced an invalid upstream URL: {source}")]
    InvalidTarget {
        key: String,
        #[source]
        source: InvalidUri,
    },

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream websocket handshake failed: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid websocket upgrade: {0}")]
    Upgrade(#[from] WebSocketUpgradeRejection),
}

impl ProxyError {
    /// Status code shown to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Upgrade(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match status {
            StatusCode::BAD_REQUEST => "Invalid WebSocket upgrade request",
            _ => "Upstream request failed",
        };
        (status, message).into_response()
    }
}
