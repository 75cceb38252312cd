//! Request metadata used to enrich log contexts.
//!
//! # Responsibilities
//! - Capture URL, method and headers of an inbound request
//! - Normalize header names so lookups are case-insensitive
//!
//! # Design Decisions
//! - Captured from `Parts` so the body is never touched
//! - Values that are not valid UTF-8 are skipped

use std::collections::BTreeMap;

use axum::http::request::Parts;
use axum::http::{HeaderMap, Request};

/// Default correlation-id header.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Default account-id header.
pub const X_ACCOUNT_ID: &str = "x-account-id";

/// URL, method and headers of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    pub url: String,
    pub method: String,
    headers: BTreeMap<String, String>,
}

impl RequestMetadata {
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            url: parts.uri.to_string(),
            method: parts.method.to_string(),
            headers: collect_headers(&parts.headers),
        }
    }

    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            url: request.uri().to_string(),
            method: request.method().to_string(),
            headers: collect_headers(request.headers()),
        }
    }

    /// Header value, if present and non-empty.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_from_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/orders?page=2")
            .header("X-Request-ID", "req-1")
            .header("x-account-id", "")
            .body(Body::empty())
            .unwrap();

        let meta = RequestMetadata::from_request(&request);
        assert_eq!(meta.url, "/orders?page=2");
        assert_eq!(meta.method, "POST");
        assert_eq!(meta.header(X_REQUEST_ID), Some("req-1"));
        assert_eq!(meta.header("X-REQUEST-ID"), Some("req-1"));
        assert_eq!(meta.header(X_ACCOUNT_ID), None);
        assert_eq!(meta.header("x-missing"), None);
    }

    #[test]
    fn test_from_parts_matches_request() {
        let request = Request::builder()
            .uri("http://api.local/health")
            .header("x-tenant", "acme")
            .body(())
            .unwrap();
        let expected = RequestMetadata::from_request(&request);
        let (parts, _) = request.into_parts();
        assert_eq!(RequestMetadata::from_parts(&parts), expected);
    }
}
