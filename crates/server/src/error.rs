//! Structured errors for the edge server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use campus_edge_client::FetchError;

/// Errors surfaced to the browser by the edge proxy itself.
#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    /// Request could not be turned into something the controller understands.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Request body over the configured limit.
    #[error("PAYLOAD_TOO_LARGE: request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Pass-through request could not reach the upstream.
    #[error("UPSTREAM_FAILED: {0}")]
    Upstream(#[from] FetchError),
}

impl EdgeError {
    pub fn status(&self) -> StatusCode {
        match self {
            EdgeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EdgeError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            EdgeError::Upstream(FetchError::InvalidUrl(_) | FetchError::InvalidMethod(_)) => StatusCode::BAD_REQUEST,
            EdgeError::Upstream(FetchError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            EdgeError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for EdgeError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(status = status.as_u16(), error = %self, "edge error");
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(EdgeError::InvalidInput("bad".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(EdgeError::from(FetchError::Timeout).status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            EdgeError::from(FetchError::Offline("http://127.0.0.1:3000/".into())).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_message_prefix() {
        let err = EdgeError::from(FetchError::Timeout);
        assert!(err.to_string().starts_with("UPSTREAM_FAILED:"));
    }
}
