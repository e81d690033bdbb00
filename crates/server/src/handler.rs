//! HTTP front of the edge.
//!
//! Every request goes through the cache controller first. Whatever the
//! controller declines is relayed upstream untouched, redirects included.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::HeaderName;
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use url::Url;

use campus_edge_client::{CacheController, FetchClient, Interception};
use campus_edge_core::{CacheStorage, EdgeRequest, EdgeResponse, RedirectMode};

use crate::error::EdgeError;
use crate::middleware::request_tracing;

pub const HEALTH_PATH: &str = "/__edge/health";

const SEC_FETCH_MODE: &str = "sec-fetch-mode";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    controller: Arc<CacheController>,
    upstream: Arc<FetchClient>,
    /// Origin request URLs are rebuilt on.
    origin: Url,
    max_body_bytes: usize,
}

impl AppState {
    pub fn new(controller: Arc<CacheController>, upstream: Arc<FetchClient>, origin: Url, max_body_bytes: usize) -> Self {
        Self { controller, upstream, origin, max_body_bytes }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .fallback(proxy)
        .layer(axum::middleware::from_fn(request_tracing))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let controller = &state.controller;
    let store = controller.store_name();
    let stats = match CacheStorage::stats(controller.storage().as_ref(), store).await {
        Ok(stats) => serde_json::json!(stats),
        Err(e) => {
            tracing::warn!(store, error = %e, "store stats unavailable");
            serde_json::Value::Null
        }
    };

    Json(serde_json::json!({
        "status": "ok",
        "cache": store,
        "state": controller.state().await.as_str(),
        "stats": stats,
    }))
}

async fn proxy(State(state): State<AppState>, request: Request<Body>) -> Result<Response, EdgeError> {
    let (parts, body) = request.into_parts();
    let edge_request = to_edge_request(&state.origin, &parts.method, &parts.uri, &parts.headers)?;

    match state.controller.handle_request(&edge_request).await {
        Interception::Respond(response) => Ok(render(response)),
        Interception::PassThrough(reason) => {
            tracing::debug!(url = %edge_request.url, reason = reason.as_str(), "forwarding upstream");
            let body = axum::body::to_bytes(body, state.max_body_bytes)
                .await
                .map_err(|_| EdgeError::PayloadTooLarge(state.max_body_bytes))?;
            let response = state
                .upstream
                .forward(&edge_request.method, &edge_request.url, &edge_request.headers, body)
                .await?;
            Ok(render(response))
        }
    }
}

/// Rebuild the browser's view of the request.
///
/// Origin-form targets (`/path?query`) addressed this edge whatever Host the
/// browser used, so they are placed on `origin`. Only absolute-form targets,
/// as sent to a forward proxy, keep their own origin and may come out
/// cross-origin. Navigations (`Sec-Fetch-Mode: navigate`) get redirect mode
/// `manual`.
pub fn to_edge_request(origin: &Url, method: &Method, uri: &Uri, headers: &HeaderMap) -> Result<EdgeRequest, EdgeError> {
    let url = if uri.scheme().is_some() {
        let target = uri.to_string();
        Url::parse(&target).map_err(|e| EdgeError::InvalidInput(format!("{target}: {e}")))?
    } else {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        origin
            .join(path_and_query)
            .map_err(|e| EdgeError::InvalidInput(format!("{path_and_query}: {e}")))?
    };

    let redirect = match headers.get(SEC_FETCH_MODE).and_then(|v| v.to_str().ok()) {
        Some(mode) if mode.eq_ignore_ascii_case("navigate") => RedirectMode::Manual,
        _ => RedirectMode::Follow,
    };

    let headers = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();

    Ok(EdgeRequest { method: method.as_str().to_string(), url, headers, redirect })
}

/// Turn a cached, synthetic or relayed response into an HTTP response.
///
/// Headers that do not survive the trip into `http` types are dropped.
pub fn render(response: EdgeResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = status;

    for (name, value) in &response.headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().append(name, value);
            }
            _ => tracing::debug!(header = %name, "dropping unrepresentable header"),
        }
    }
    out
}
