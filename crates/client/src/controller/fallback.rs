//! Synthetic responses for when neither the network nor the store can answer.

use campus_edge_core::EdgeResponse;

pub const ASSET_UNAVAILABLE: &str = "Asset not available offline.";
pub const OFFLINE_MESSAGE: &str = "You appear to be offline.";
pub const INLINE_OFFLINE_PAGE: &str = "<h1>You are offline</h1>";

/// Static asset miss while offline.
pub fn asset_unavailable() -> EdgeResponse {
    EdgeResponse::new(503)
        .with_header("content-type", "text/plain; charset=utf-8")
        .with_body(ASSET_UNAVAILABLE)
}

/// API miss while offline: `503 {"error": "..."}`.
pub fn offline_json() -> EdgeResponse {
    let body = serde_json::json!({ "error": OFFLINE_MESSAGE }).to_string();
    EdgeResponse::new(503)
        .with_header("content-type", "application/json")
        .with_body(body)
}

/// Last resort for navigations when the fallback page is not stored either.
pub fn inline_offline_page() -> EdgeResponse {
    EdgeResponse::new(200)
        .with_header("content-type", "text/html")
        .with_body(INLINE_OFFLINE_PAGE)
}
