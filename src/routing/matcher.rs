//! Routing key extraction.
//!
//! # Responsibilities
//! - Pick out the first non-empty segment of the escaped request path
//! - Decode that segment (falling back to the raw form)
//! - Read the request host the way clients sent it
//!
//! # Design Decisions
//! - Host is compared verbatim (port included), as received
//! - The path is split before decoding, so `%2F` never creates a segment
//! - A segment remembers where it ends, and the rewrite strips exactly that
//! - No regex: a key is either the whole host or one segment

use std::borrow::Cow;

use axum::http::{header, HeaderMap, Uri};
use percent_encoding::percent_decode_str;

/// First path segment of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Decoded segment text.
    pub name: Cow<'a, str>,
    /// Byte offset just past the segment in the escaped path.
    pub end: usize,
}

/// The parts of a request a route can match on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteKeys<'a> {
    pub host: &'a str,
    pub segment: Option<Segment<'a>>,
}

impl<'a> RouteKeys<'a> {
    /// Build keys from a host and the escaped request path.
    pub fn new(host: &'a str, escaped_path: &'a str) -> Self {
        Self {
            host,
            segment: first_segment(escaped_path),
        }
    }
}

/// Percent-decode a path; invalid UTF-8 leaves the escaped form untouched.
pub fn decode_path(escaped: &str) -> Cow<'_, str> {
    percent_decode_str(escaped)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(escaped))
}

/// First non-empty `/`-separated segment of an escaped path.
pub fn first_segment(escaped: &str) -> Option<Segment<'_>> {
    let mut start = 0;
    for raw in escaped.split('/') {
        if !raw.is_empty() {
            return Some(Segment {
                name: decode_path(raw),
                end: start + raw.len(),
            });
        }
        start += raw.len() + 1;
    }
    None
}

/// Host as sent by the client: the `Host` header, else the URI authority (HTTP/2).
pub fn request_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> &'a str {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn name(path: &str) -> Option<String> {
        first_segment(path).map(|s| s.name.into_owned())
    }

    #[test]
    fn decodes_escaped_segments() {
        let keys = RouteKeys::new("example.com", "/my%20app/index.html");
        let segment = keys.segment.unwrap();
        assert_eq!(segment.name, "my app");
        assert_eq!(segment.end, "/my%20app".len());
    }

    #[test]
    fn invalid_escape_falls_back_to_raw_segment() {
        assert_eq!(name("/bad%FFpath/x").as_deref(), Some("bad%FFpath"));
    }

    #[test]
    fn first_segment_skips_empty_parts() {
        assert_eq!(name("/"), None);
        assert_eq!(name(""), None);
        assert_eq!(name("/blog"), Some("blog".into()));

        let segment = first_segment("//blog/posts").unwrap();
        assert_eq!(segment.name, "blog");
        assert_eq!(&"//blog/posts"[segment.end..], "/posts");
    }

    #[test]
    fn escaped_slash_stays_inside_the_segment() {
        assert_eq!(name("/blog%2Fx/posts").as_deref(), Some("blog/x"));
    }

    #[test]
    fn host_header_wins_over_authority() {
        let mut headers = HeaderMap::new();
        let uri: Uri = "http://authority.test:8443/x".parse().unwrap();
        assert_eq!(request_host(&headers, &uri), "authority.test:8443");

        headers.insert(header::HOST, HeaderValue::from_static("header.test"));
        assert_eq!(request_host(&headers, &uri), "header.test");

        let bare: Uri = "/x".parse().unwrap();
        assert_eq!(request_host(&HeaderMap::new(), &bare), "");
    }
}
