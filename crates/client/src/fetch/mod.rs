//! Upstream fetch pipeline.
//!
//! ### Strategy fetches
//! - Map the public request URL onto the upstream origin
//! - Follow up to `max_redirects` redirects and record whether any were followed
//! - Decode compressed bodies, enforce `max_bytes`
//!
//! ### Pass-through fetches
//! - Relay method, headers and body untouched
//! - Never follow redirects, never decode, so the browser sees the upstream answer

pub mod error;
pub mod headers;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method};
use std::time::{Duration, Instant};

use campus_edge_core::{AppConfig, EdgeRequest, EdgeResponse};

pub use error::FetchError;
pub use headers::{inbound_response_headers, outbound_request_headers};
pub use url::{same_origin, upstream_target};

/// The network seam of the cache controller.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a request, following redirects.
    ///
    /// The returned response has `redirected` set when any redirect was followed.
    async fn fetch(&self, request: &EdgeRequest) -> Result<EdgeResponse, FetchError>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "campus-edge/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "campus-edge/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// HTTP client bound to one upstream origin.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    direct: Client,
    config: FetchConfig,
    upstream: ::url::Url,
}

impl FetchClient {
    /// Create a new fetch client for the given upstream.
    pub fn new(config: FetchConfig, upstream: ::url::Url) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        let direct = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .use_rustls_tls()
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .build()?;

        Ok(Self { http, direct, config, upstream })
    }

    /// Relay a request upstream exactly as the browser sent it.
    ///
    /// Redirects come back as 3xx responses for the browser to follow.
    pub async fn forward(
        &self, method: &str, url: &::url::Url, headers: &[(String, String)], body: Bytes,
    ) -> Result<EdgeResponse, FetchError> {
        let start = Instant::now();
        let target = upstream_target(&self.upstream, url);
        let method = parse_method(method)?;

        let mut request = self.direct.request(method, target.clone());
        for (name, value) in outbound_request_headers(headers, false) {
            request = request.header(name, value);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = inbound_response_headers(response.headers(), false);
        let body = self.read_body(response).await?;

        tracing::debug!(
            url = %target,
            status,
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "forwarded request upstream"
        );

        Ok(EdgeResponse { status, headers, body, url: Some(target.to_string()), redirected: false })
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<Bytes, FetchError> {
        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(FetchError::TooLarge { size: len, limit: self.config.max_bytes });
        }

        let bytes = response.bytes().await?;

        if bytes.len() > self.config.max_bytes {
            return Err(FetchError::TooLarge { size: bytes.len() as u64, limit: self.config.max_bytes });
        }

        Ok(bytes)
    }

    /// Upstream base URL.
    pub fn upstream(&self) -> &::url::Url {
        &self.upstream
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn parse_method(method: &str) -> Result<Method, FetchError> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| FetchError::InvalidMethod(method.to_string()))
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &EdgeRequest) -> Result<EdgeResponse, FetchError> {
        let start = Instant::now();
        let target = upstream_target(&self.upstream, &request.url);
        let method = parse_method(&request.method)?;

        let mut builder = self.http.request(method, target.clone());
        for (name, value) in outbound_request_headers(&request.headers, true) {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let redirected = final_url != target;
        let headers = inbound_response_headers(response.headers(), true);
        let body = self.read_body(response).await?;

        tracing::debug!(
            url = %target,
            final_url = %final_url,
            status,
            redirected,
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fetched upstream"
        );

        Ok(EdgeResponse { status, headers, body, url: Some(final_url.to_string()), redirected })
    }
}
