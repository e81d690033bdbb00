//! Fetch error types.

use std::sync::Arc;

/// Errors from a network fetch. Every one of these means "the network gave
/// us nothing usable"; the controller turns them into cache fallbacks.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Request URL could not be mapped onto the upstream.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Method token rejected by the HTTP stack.
    #[error("invalid method: {0}")]
    InvalidMethod(String),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Connection refused, DNS failure, reset, ...
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response body over the configured limit.
    #[error("response too large: {size} bytes exceeds {limit}")]
    TooLarge { size: u64, limit: usize },

    /// Scripted or otherwise synthetic failure (offline simulation).
    #[error("offline: {0}")]
    Offline(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { FetchError::Timeout } else { FetchError::Network(Arc::new(err)) }
    }
}

impl From<FetchError> for campus_edge_core::Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidUrl(msg) => campus_edge_core::Error::InvalidUrl(msg),
            other => campus_edge_core::Error::FetchFailed(other.to_string()),
        }
    }
}
