//! Response header policy.
//!
//! # Responsibilities
//! - Add site-wide headers (Server, Keep-Alive, HSTS, nosniff, frame options)
//! - Add browser caching headers to static responses
//!
//! # Design Decisions
//! - Header values are rendered once at startup
//! - HSTS is only sent while HTTPS is actually being served
//! - `preload` is only emitted together with `includeSubDomains`

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::config::{HeaderConfig, HstsConfig, ServerConfig};

/// HSTS max-age (one year).
pub const HSTS_MAX_AGE_SECS: u64 = 31_536_000;

static KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// Headers added to every response.
#[derive(Debug, Clone)]
pub struct SiteHeaders {
    server: HeaderValue,
    keep_alive: HeaderValue,
    hsts: Option<HeaderValue>,
    nosniff: bool,
    sameorigin: bool,
}

impl SiteHeaders {
    pub fn from_config(server: &ServerConfig, headers: &HeaderConfig, https_active: bool) -> Self {
        let server_name = HeaderValue::from_str(&server.name).unwrap_or_else(|_| {
            tracing::warn!(name = %server.name, "Invalid server name, using default");
            HeaderValue::from_static("vhost-gateway")
        });

        let keep_alive = HeaderValue::from_str(&format!("timeout={}", server.keep_alive_timeout_secs))
            .unwrap_or_else(|_| HeaderValue::from_static("timeout=10"));

        let hsts = if https_active {
            hsts_value(&headers.hsts).and_then(|v| HeaderValue::from_str(&v).ok())
        } else {
            None
        };

        Self {
            server: server_name,
            keep_alive,
            hsts,
            nosniff: headers.nosniff,
            sameorigin: headers.sameorigin,
        }
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(header::SERVER, self.server.clone());
        headers.insert(KEEP_ALIVE.clone(), self.keep_alive.clone());
        if let Some(hsts) = &self.hsts {
            headers.insert(header::STRICT_TRANSPORT_SECURITY, hsts.clone());
        }
        if self.nosniff {
            headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        }
        if self.sameorigin {
            headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("sameorigin"));
        }
    }
}

/// `Strict-Transport-Security` value, if enabled.
pub fn hsts_value(hsts: &HstsConfig) -> Option<String> {
    if !hsts.enabled {
        return None;
    }
    let mut value = format!("max-age={}", HSTS_MAX_AGE_SECS);
    if hsts.include_subdomains {
        value.push_str(";includeSubDomains");
        if hsts.preload {
            value.push_str(";preload");
        }
    }
    Some(value)
}

/// Middleware adding [`SiteHeaders`] to every response.
pub async fn site_headers(State(site): State<Arc<SiteHeaders>>, request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    site.apply(response.headers_mut());
    response
}

/// Browser caching for static content.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    max_age: Duration,
}

impl CachePolicy {
    pub fn from_hours(hours: u64) -> Option<Self> {
        (hours > 0).then(|| Self {
            max_age: Duration::from_secs(hours * 3600),
        })
    }

    /// Set `Cache-Control` and `Expires` relative to `now`.
    pub fn apply(&self, headers: &mut HeaderMap, now: SystemTime) {
        let control = format!(
            "max-age={}, public, stale-while-revalidate=3600",
            self.max_age.as_secs()
        );
        if let Ok(value) = HeaderValue::from_str(&control) {
            headers.insert(header::CACHE_CONTROL, value);
        }
        let expires = httpdate::fmt_http_date(now + self.max_age);
        if let Ok(value) = HeaderValue::from_str(&expires) {
            headers.insert(header::EXPIRES, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsts_preload_requires_subdomains() {
        let mut hsts = HstsConfig {
            enabled: true,
            include_subdomains: false,
            preload: true,
        };
        assert_eq!(hsts_value(&hsts).unwrap(), "max-age=31536000");

        hsts.include_subdomains = true;
        assert_eq!(hsts_value(&hsts).unwrap(), "max-age=31536000;includeSubDomains;preload");

        hsts.preload = false;
        assert_eq!(hsts_value(&hsts).unwrap(), "max-age=31536000;includeSubDomains");

        hsts.enabled = false;
        assert!(hsts_value(&hsts).is_none());
    }

    #[test]
    fn site_headers_follow_config() {
        let server = ServerConfig {
            name: "edge-1".into(),
            keep_alive_timeout_secs: 30,
            ..ServerConfig::default()
        };
        let mut headers_cfg = HeaderConfig::default();
        headers_cfg.hsts.enabled = true;
        headers_cfg.sameorigin = false;

        let mut headers = HeaderMap::new();
        SiteHeaders::from_config(&server, &headers_cfg, false).apply(&mut headers);

        assert_eq!(headers.get(header::SERVER).unwrap(), "edge-1");
        assert_eq!(headers.get("keep-alive").unwrap(), "timeout=30");
        assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert!(headers.get(header::X_FRAME_OPTIONS).is_none());
        assert!(headers.get(header::STRICT_TRANSPORT_SECURITY).is_none());

        SiteHeaders::from_config(&server, &headers_cfg, true).apply(&mut headers);
        assert_eq!(headers.get(header::STRICT_TRANSPORT_SECURITY).unwrap(), "max-age=31536000");
    }

    #[test]
    fn cache_policy_sets_both_headers() {
        assert!(CachePolicy::from_hours(0).is_none());

        let now = SystemTime::UNIX_EPOCH;
        let mut headers = HeaderMap::new();
        CachePolicy::from_hours(12).unwrap().apply(&mut headers, now);

        assert_eq!(
            headers.get(header::CACHE_CONTROL).unwrap(),
            "max-age=43200, public, stale-while-revalidate=3600"
        );
        assert_eq!(headers.get(header::EXPIRES).unwrap(), "Thu, 01 Jan 1970 12:00:00 GMT");
    }
}
