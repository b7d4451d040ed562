//! Multi-site static web server and reverse proxy library

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;
pub mod vhost;

// Traffic handling
pub mod proxy;
pub mod refresh;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
