//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! conf.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → lifecycle::startup adjusts for the on-disk layout
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CacheConfig, GatewayConfig, HeaderConfig, HstsConfig, ObservabilityConfig, RouteEntry, ServerConfig,
    UpdateCheckConfig, UpstreamConfig, VhostConfig,
};
