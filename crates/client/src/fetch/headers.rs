//! Header filtering between the browser, the edge and the upstream.

use reqwest::header::HeaderMap;

/// Connection-scoped headers that must not be relayed (RFC 9110 §7.6.1).
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Request headers relayed upstream.
///
/// `decoded` requests drop `accept-encoding` so the HTTP client negotiates
/// (and transparently decodes) compression itself.
pub fn outbound_request_headers(headers: &[(String, String)], decoded: bool) -> Vec<(&str, &str)> {
    headers
        .iter()
        .filter(|(name, _)| {
            !is_hop_by_hop(name)
                && !name.eq_ignore_ascii_case("host")
                && !name.eq_ignore_ascii_case("content-length")
                && !(decoded && name.eq_ignore_ascii_case("accept-encoding"))
        })
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect()
}

/// Response headers kept on a relayed or cached response.
///
/// Bodies are re-framed by the edge, so length is always dropped; `decoded`
/// bodies also lose their `content-encoding`.
pub fn inbound_response_headers(headers: &HeaderMap, decoded: bool) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| {
            let name = name.as_str();
            !is_hop_by_hop(name)
                && name != "content-length"
                && !(decoded && name == "content-encoding")
        })
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}
