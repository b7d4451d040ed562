//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener and site layout settings.
    pub server: ServerConfig,

    /// Virtual host resolution settings.
    pub vhost: VhostConfig,

    /// Response header policy.
    pub headers: HeaderConfig,

    /// Pull-through file cache settings.
    pub cache: CacheConfig,

    /// Upstream connection pool settings.
    pub upstream: UpstreamConfig,

    /// Reverse-proxy routes, in configuration order.
    #[serde(rename = "proxy")]
    pub proxies: Vec<RouteEntry>,

    /// HTTP redirect routes, in configuration order.
    #[serde(rename = "redirect")]
    pub redirects: Vec<RouteEntry>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Release update check.
    pub update_check: UpdateCheckConfig,
}

/// Listener and site layout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Value of the `Server` response header.
    pub name: String,

    /// Directory holding `html/`, `error/`, `ssl/`, `cache/` and host directories.
    pub root: String,

    /// Plain HTTP bind address.
    pub http_address: String,

    /// HTTPS bind address, used when `https` is on.
    pub https_address: String,

    /// Serve HTTPS with the certificates in `ssl/`.
    pub https: bool,

    /// Idle keep-alive timeout for inbound connections.
    pub keep_alive_timeout_secs: u64,

    /// Maximum concurrent inbound connections per listener.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "vhost-gateway".to_string(),
            root: ".".to_string(),
            http_address: "0.0.0.0:80".to_string(),
            https_address: "0.0.0.0:443".to_string(),
            https: false,
            keep_alive_timeout_secs: 10,
            max_connections: 10_000,
        }
    }
}

/// Virtual host resolution.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VhostConfig {
    /// Serve `<host>/` directories instead of always using `html/`.
    pub dynamic_serving: bool,

    /// Remember which host directories exist to avoid repeated disk probes.
    pub cache_lookups: bool,
}

impl Default for VhostConfig {
    fn default() -> Self {
        Self {
            dynamic_serving: true,
            cache_lookups: true,
        }
    }
}

/// Response header policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Browser caching window in hours (0 disables caching headers).
    pub caching_hours: u64,

    /// Strict-Transport-Security settings.
    pub hsts: HstsConfig,

    /// Send `X-Content-Type-Options: nosniff`.
    pub nosniff: bool,

    /// Send `X-Frame-Options: sameorigin`.
    pub sameorigin: bool,

    /// Gzip responses when the client accepts it.
    pub gzip: bool,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            caching_hours: 12,
            hsts: HstsConfig::default(),
            nosniff: true,
            sameorigin: true,
            gzip: true,
        }
    }
}

/// Strict-Transport-Security settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HstsConfig {
    pub enabled: bool,
    pub include_subdomains: bool,
    pub preload: bool,
}

/// Pull-through file cache.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve `/cache/...` and run the background refresher.
    pub enabled: bool,

    /// Seconds to sleep between refresh passes.
    pub update_interval_secs: u64,

    /// Upper bound for a single remote fetch.
    pub fetch_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            update_interval_secs: 3600,
            fetch_timeout_secs: 30,
        }
    }
}

/// Upstream connection pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base for the idle pool timeout (multiplied by a fixed factor).
    pub idle_timeout_base_secs: u64,

    /// Idle connections kept per upstream host.
    pub max_idle_per_host: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            idle_timeout_base_secs: 10,
            max_idle_per_host: 256,
        }
    }
}

/// A `(location, target)` route: `location` is a hostname or a single path segment.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteEntry {
    /// Hostname or first path segment to match.
    pub location: String,

    /// Absolute upstream base URL.
    pub target: String,
}

impl RouteEntry {
    pub fn new(location: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            target: target.into(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// `pretty` or `json`.
    pub log_format: String,

    /// Suppress per-request and cache chatter (forces `warn`).
    pub silent: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            silent: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Release update check.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpdateCheckConfig {
    pub enabled: bool,

    /// Endpoint returning JSON with a `tag_name` field.
    pub url: String,

    /// Tag of the running build, e.g. `v0.1.0`.
    pub current_version: String,
}

impl Default for UpdateCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            current_version: concat!("v", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert!(config.vhost.dynamic_serving);
        assert!(config.vhost.cache_lookups);
        assert!(!config.cache.enabled);
        assert!(config.proxies.is_empty());
        assert_eq!(config.upstream.max_idle_per_host, 256);
    }

    #[test]
    fn parses_route_tables() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [vhost]
            dynamic_serving = false

            [[proxy]]
            location = "blog"
            target = "http://10.0.0.5:8080/"

            [[proxy]]
            location = "api.example.com"
            target = "https://api.internal/"

            [[redirect]]
            location = "old"
            target = "https://example.com/new/"
            "#,
        )
        .unwrap();

        assert!(!config.vhost.dynamic_serving);
        assert_eq!(config.proxies.len(), 2);
        assert_eq!(config.proxies[0], RouteEntry::new("blog", "http://10.0.0.5:8080/"));
        assert_eq!(config.redirects[0].location, "old");
    }
}
