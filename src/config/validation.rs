//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate route locations and upstream targets
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{GatewayConfig, RouteEntry};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A route location is empty or contains a `/`.
    InvalidLocation { table: &'static str, location: String },
    /// A route target is not an absolute http(s) URL.
    InvalidTarget { table: &'static str, location: String, target: String },
    /// A socket address does not parse.
    InvalidAddress { field: &'static str, value: String },
    /// A duration that must be positive is zero.
    ZeroDuration { field: &'static str },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidLocation { table, location } => {
                write!(f, "{} location {:?} must be a hostname or a single path segment", table, location)
            }
            ValidationError::InvalidTarget { table, location, target } => {
                write!(f, "{} target {:?} for {:?} must be an absolute http(s) URL", table, target, location)
            }
            ValidationError::InvalidAddress { field, value } => {
                write!(f, "{} {:?} is not a valid socket address", field, value)
            }
            ValidationError::ZeroDuration { field } => write!(f, "{} must be greater than zero", field),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_routes("proxy", &config.proxies, &mut errors);
    validate_routes("redirect", &config.redirects, &mut errors);

    validate_address("server.http_address", &config.server.http_address, &mut errors);
    if config.server.https {
        validate_address("server.https_address", &config.server.https_address, &mut errors);
    }
    if config.observability.metrics_enabled {
        validate_address("observability.metrics_address", &config.observability.metrics_address, &mut errors);
    }

    if config.server.keep_alive_timeout_secs == 0 {
        errors.push(ValidationError::ZeroDuration { field: "server.keep_alive_timeout_secs" });
    }
    if config.upstream.idle_timeout_base_secs == 0 {
        errors.push(ValidationError::ZeroDuration { field: "upstream.idle_timeout_base_secs" });
    }
    if config.cache.enabled {
        if config.cache.update_interval_secs == 0 {
            errors.push(ValidationError::ZeroDuration { field: "cache.update_interval_secs" });
        }
        if config.cache.fetch_timeout_secs == 0 {
            errors.push(ValidationError::ZeroDuration { field: "cache.fetch_timeout_secs" });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_routes(table: &'static str, entries: &[RouteEntry], errors: &mut Vec<ValidationError>) {
    for entry in entries {
        if entry.location.is_empty() || entry.location.contains('/') {
            errors.push(ValidationError::InvalidLocation {
                table,
                location: entry.location.clone(),
            });
        }

        let valid_target = url::Url::parse(&entry.target)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !valid_target {
            errors.push(ValidationError::InvalidTarget {
                table,
                location: entry.location.clone(),
                target: entry.target.clone(),
            });
        }
    }
}

fn validate_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
