//! URL helpers: origin checks and upstream mapping.

/// Whether two URLs share scheme, host and port.
pub fn same_origin(a: &url::Url, b: &url::Url) -> bool {
    a.origin() == b.origin()
}

/// Map a public request URL onto the upstream server: the upstream's scheme,
/// host and port with the request's path and query.
pub fn upstream_target(upstream: &url::Url, request: &url::Url) -> url::Url {
    let mut target = upstream.clone();
    target.set_path(request.path());
    target.set_query(request.query());
    target.set_fragment(None);
    target
}
