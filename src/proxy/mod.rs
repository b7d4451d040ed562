//! Reverse-proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Request (host, path, headers)
//!     → dispatcher.rs (route lookup, URL rewrite, protocol choice)
//!     → transport.rs   (plain HTTP, pooled upstream connections)
//!       or websocket.rs (upstream handshake, frame relay)
//!     → Response (or 502 on transport failure)
//! ```
//!
//! # Design Decisions
//! - One upstream per route, no health checks, no retries
//! - Upgrade detection by header inspection only

pub mod dispatcher;
pub mod error;
pub mod transport;
pub mod websocket;

pub use dispatcher::{is_websocket_upgrade, Dispatch, Dispatcher, Protocol};
pub use error::ProxyError;
pub use transport::HttpTransport;
pub use websocket::WebSocketTransport;
