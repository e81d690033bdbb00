//! Request and response values exchanged between the edge server, the
//! controller, the fetcher and the cache storage.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::hash::compute_request_key;

/// How the caller wants redirects handled.
///
/// Browser navigations arrive with `Manual`; handing such a caller a response
/// that was produced by following a redirect is a fatal network error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectMode {
    #[default]
    Follow,
    Manual,
    Error,
}

/// An outbound request seen by the edge.
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub redirect: RedirectMode,
}

impl EdgeRequest {
    /// A plain `GET` with redirect mode `follow`.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".into(), url, headers: Vec::new(), redirect: RedirectMode::Follow }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_redirect(mut self, redirect: RedirectMode) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Case-insensitive header lookup, first value wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Identity of this request inside a cache store.
    pub fn cache_key(&self) -> String {
        compute_request_key(&self.method, self.url.as_str())
    }
}

/// A response as returned to the caller or kept in a cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Final URL the response was produced from, if it came off the network.
    pub url: Option<String>,
    /// Whether one or more redirects were followed to produce this response.
    pub redirected: bool,
}

impl EdgeResponse {
    pub fn new(status: u16) -> Self {
        Self { status, headers: Vec::new(), body: Bytes::new(), url: None, redirected: false }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn redirected(mut self, redirected: bool) -> Self {
        self.redirected = redirected;
        self
    }

    /// Status in the 200-299 range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only direct, successful responses may be written to a store.
    pub fn is_cacheable(&self) -> bool {
        self.is_ok() && !self.redirected
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
