//! Static site and pull-cache file serving.
//!
//! # Responsibilities
//! - Serve `/cache/<name>` from the cache directory when the pull cache is on
//! - Serve everything else from the host's resolved document root
//! - Answer misses with the `error/NotFound.html` document
//!
//! # Design Decisions
//! - File delivery (ranges, conditional requests, MIME types) is `ServeFile`
//! - Any `..` segment, in the path or in the host, is refused
//! - A directory request without a trailing slash is redirected to add one

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::http::response::CachePolicy;
use crate::observability::metrics;
use crate::routing::matcher::decode_path;
use crate::vhost::{HostResolver, DEFAULT_ROOT};

/// Prefix served from the pull cache.
pub const CACHE_PREFIX: &str = "/cache/";

/// Document served with 404 responses, relative to the server root.
pub const NOT_FOUND_DOCUMENT: &str = "error/NotFound.html";

/// Static file server for all virtual hosts.
pub struct StaticSite {
    root: PathBuf,
    resolver: Arc<HostResolver>,
    cache_enabled: bool,
    caching: Option<CachePolicy>,
}

impl StaticSite {
    pub fn new(
        root: impl Into<PathBuf>,
        resolver: Arc<HostResolver>,
        cache_enabled: bool,
        caching: Option<CachePolicy>,
    ) -> Self {
        Self {
            root: root.into(),
            resolver,
            cache_enabled,
            caching,
        }
    }

    /// Serve `request` for `host`.
    pub async fn serve(&self, host: &str, request: Request<Body>) -> Response {
        let started = Instant::now();
        let response = self.serve_inner(host, request).await;
        metrics::record_request("static", response.status().as_u16(), started);
        response
    }

    async fn serve_inner(&self, host: &str, request: Request<Body>) -> Response {
        let decoded = decode_path(request.uri().path()).into_owned();

        let (base, relative) = match self.locate(host, &decoded).await {
            Some(found) => found,
            None => return (StatusCode::BAD_REQUEST, "invalid URL path").into_response(),
        };

        let mut file = base.join(&relative);
        match tokio::fs::metadata(&file).await {
            Ok(meta) if meta.is_dir() => {
                if !decoded.ends_with('/') {
                    return redirect_to_directory(&request);
                }
                file.push("index.html");
            }
            Ok(_) => {}
            Err(_) => return self.not_found().await,
        }

        let response = match ServeFile::new(&file).oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        if response.status() == StatusCode::NOT_FOUND {
            return self.not_found().await;
        }

        let (mut parts, body) = response.into_parts();
        if let Some(policy) = &self.caching {
            if parts.status.is_success() || parts.status == StatusCode::NOT_MODIFIED {
                policy.apply(&mut parts.headers, SystemTime::now());
            }
        }
        Response::from_parts(parts, Body::new(body))
    }

    /// Base directory and relative file path for a decoded request path.
    async fn locate(&self, host: &str, decoded: &str) -> Option<(PathBuf, PathBuf)> {
        if self.cache_enabled {
            if let Some(rest) = decoded.strip_prefix(CACHE_PREFIX) {
                return Some((self.root.join("cache"), safe_relative(rest)?));
            }
        }

        let base = if host.is_empty() {
            self.root.join(DEFAULT_ROOT)
        } else if is_plain_component(host) {
            self.resolver.resolve(host).await
        } else {
            tracing::debug!(host = %host, "Refusing host that is not a plain directory name");
            return None;
        };
        Some((base, safe_relative(decoded)?))
    }

    async fn not_found(&self) -> Response {
        let document = self.root.join(NOT_FOUND_DOCUMENT);
        match tokio::fs::read(&document).await {
            Ok(bytes) => (
                StatusCode::NOT_FOUND,
                [(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))],
                bytes,
            )
                .into_response(),
            Err(e) => {
                tracing::warn!(path = %document.display(), error = %e, "Error document unavailable");
                (StatusCode::NOT_FOUND, "404 page not found").into_response()
            }
        }
    }
}

impl std::fmt::Debug for StaticSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticSite")
            .field("root", &self.root)
            .field("cache_enabled", &self.cache_enabled)
            .finish_non_exhaustive()
    }
}

/// Relative path made of normal components only; `None` on any `..`.
fn safe_relative(path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." || segment.contains('\\') || segment.contains('\0') {
            return None;
        }
        relative.push(segment);
    }
    Some(relative)
}

/// True when `name` is exactly one normal path component.
fn is_plain_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains('\\')
}

fn redirect_to_directory(request: &Request<Body>) -> Response {
    let uri = request.uri();
    let location = match uri.query() {
        Some(query) => format!("{}/?{}", uri.path(), query),
        None => format!("{}/", uri.path()),
    };
    match HeaderValue::from_str(&location) {
        Ok(value) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_segments_are_refused() {
        assert!(safe_relative("/a/../b").is_none());
        assert!(safe_relative("/..").is_none());
        assert_eq!(safe_relative("/a/./b/").unwrap(), PathBuf::from("a/b"));
        assert_eq!(safe_relative("/").unwrap(), PathBuf::new());
    }

    #[test]
    fn host_must_be_single_component() {
        assert!(is_plain_component("example.com"));
        assert!(is_plain_component("example.com:8080"));
        assert!(!is_plain_component(".."));
        assert!(!is_plain_component("."));
        assert!(!is_plain_component("a/b"));
        assert!(!is_plain_component(""));
    }
}
