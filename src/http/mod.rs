//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (accept loop, hyper connection, Axum router)
//!     → request.rs (request ID, peer address)
//!     → proxy::Dispatcher (proxied routes)
//!       or redirect route (301)
//!       or static_files.rs (/cache/ and per-host document roots)
//!     → response.rs (site headers, caching headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod static_files;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use response::{CachePolicy, SiteHeaders};
pub use server::{AppState, HttpServer, ServerError};
pub use static_files::StaticSite;
