//! Upstream URL rewriting.
//!
//! `/<key>/rest?query` on the inbound side becomes `<target>/rest?query`.
//! The escaped bytes the lookup matched on are removed from the front of the
//! request target and the remainder is appended to the route's base URL.

use axum::http::uri::{InvalidUri, Scheme};
use axum::http::Uri;

use crate::routing::router::RouteMatch;

/// Build the upstream URI for a matched route.
///
/// `path_and_query` is the raw (still escaped) request target whose path the
/// route was looked up with.
pub fn rewrite_target(route: &RouteMatch, path_and_query: &str) -> Result<Uri, InvalidUri> {
    let rest = path_and_query.get(route.strip..).unwrap_or(path_and_query);
    join_url(&route.target, rest).parse()
}

/// Turn an `http`/`https` URI into the matching `ws`/`wss` URL.
pub fn websocket_url(uri: &Uri) -> String {
    let scheme = if uri.scheme() == Some(&Scheme::HTTPS) { "wss" } else { "ws" };
    let authority = uri.authority().map(|a| a.as_str()).unwrap_or_default();
    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    format!("{}://{}{}", scheme, authority, path_and_query)
}

fn join_url(base: &str, rest: &str) -> String {
    let base = base.trim_end_matches('/');
    if rest.starts_with('/') {
        format!("{}{}", base, rest)
    } else {
        format!("{}/{}", base, rest)
    }
}
