//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → tls.rs (optional TLS handshake, shared crypto policy)
//!     → connection.rs (lifecycle tracking)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - One connection budget shared by every listener
//! - Each connection tracked for graceful shutdown
//! - Inbound and upstream TLS use the same cipher/curve policy

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionLimit, Listener, ListenerError};
pub use tls::{client_config, load_server_config, TlsError};
