//! Route lookup.
//!
//! # Responsibilities
//! - Store the proxy and redirect tables built from config
//! - Look up the route for a request (host first, then first path segment)
//! - Return the matched route or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) lookups via HashMap
//! - Host routes always beat path routes
//! - Duplicate locations: the later entry wins

use std::collections::HashMap;

use crate::config::RouteEntry;
use crate::routing::matcher::RouteKeys;

/// How a route matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The full request host matched.
    Host,
    /// The first path segment matched.
    Path,
}

/// A successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Upstream base URL.
    pub target: String,
    /// Host or segment that matched.
    pub key: String,
    pub kind: MatchKind,
    /// Leading bytes of the escaped path covered by the key (0 for host routes).
    pub strip: usize,
}

/// One location → target map.
#[derive(Debug, Clone, Default)]
struct Table {
    routes: HashMap<String, String>,
}

impl Table {
    fn from_entries(name: &str, entries: &[RouteEntry]) -> Self {
        let mut routes = HashMap::with_capacity(entries.len());
        for entry in entries {
            if let Some(previous) = routes.insert(entry.location.clone(), entry.target.clone()) {
                tracing::warn!(
                    table = name,
                    location = %entry.location,
                    replaced = %previous,
                    target = %entry.target,
                    "Duplicate route location, later entry wins"
                );
            }
        }
        Self { routes }
    }

    /// Match the host first, then the first path segment.
    fn lookup(&self, keys: &RouteKeys<'_>) -> Option<RouteMatch> {
        if let Some(target) = self.routes.get(keys.host) {
            return Some(RouteMatch {
                target: target.clone(),
                key: keys.host.to_string(),
                kind: MatchKind::Host,
                strip: 0,
            });
        }

        let segment = keys.segment.as_ref()?;
        self.routes.get(segment.name.as_ref()).map(|target| RouteMatch {
            target: target.clone(),
            key: segment.name.to_string(),
            kind: MatchKind::Path,
            strip: segment.end,
        })
    }

    fn len(&self) -> usize {
        self.routes.len()
    }
}

/// Proxy and redirect tables, built once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    proxies: Table,
    redirects: Table,
}

impl RouteTable {
    /// Build both tables from configuration entries.
    pub fn from_config(proxies: &[RouteEntry], redirects: &[RouteEntry]) -> Self {
        let table = Self {
            proxies: Table::from_entries("proxy", proxies),
            redirects: Table::from_entries("redirect", redirects),
        };
        tracing::debug!(
            proxy_routes = table.proxies.len(),
            redirect_routes = table.redirects.len(),
            "Route tables built"
        );
        table
    }

    /// Reverse-proxy route for a request, if any.
    pub fn lookup_proxy(&self, keys: &RouteKeys<'_>) -> Option<RouteMatch> {
        self.proxies.lookup(keys)
    }

    /// Redirect route for a request, if any.
    pub fn lookup_redirect(&self, keys: &RouteKeys<'_>) -> Option<RouteMatch> {
        self.redirects.lookup(keys)
    }
}
