//! Request classification.
//!
//! Every request the edge sees lands in exactly one bucket: passed through
//! untouched, or handled by one of the three caching strategies.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use campus_edge_core::{AppConfig, EdgeRequest};

use crate::fetch::same_origin;

/// Header set by the framework router on server-component payload fetches.
pub const RSC_HEADER: &str = "rsc";
/// Header set by the framework router on link prefetches.
pub const ROUTER_PREFETCH_HEADER: &str = "next-router-prefetch";
/// Header carrying the router's state tree on client-side navigations.
pub const ROUTER_STATE_TREE_HEADER: &str = "next-router-state-tree";

static STATIC_ASSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(?:js|css|png|jpg|jpeg|gif|svg|ico|woff2?|ttf|eot|webp|avif)$")
        .expect("static asset pattern is valid")
});

/// Returns true for file types served cache-first.
pub fn is_static_asset(path: &str) -> bool {
    STATIC_ASSET.is_match(path)
}

/// Caching strategy applied to a handled request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

/// Why a request was left for the network (or the browser) to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    NonGet,
    CrossOrigin,
    FrameworkInternal,
    RouterPayload,
    /// Page fetch with nothing cached came back redirected; the caller must
    /// see the redirect itself.
    RedirectedNavigation,
    /// Live response was redirected and the caller does not follow redirects.
    RedirectNotFollowable,
    /// Controller is not installed.
    Inactive,
}

impl PassReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassReason::NonGet => "non_get",
            PassReason::CrossOrigin => "cross_origin",
            PassReason::FrameworkInternal => "framework_internal",
            PassReason::RouterPayload => "router_payload",
            PassReason::RedirectedNavigation => "redirected_navigation",
            PassReason::RedirectNotFollowable => "redirect_not_followable",
            PassReason::Inactive => "inactive",
        }
    }
}

/// Outcome of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    PassThrough(PassReason),
    Handle(Strategy),
}

/// Path prefixes that drive classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRules {
    pub api_prefix: String,
    pub framework_prefix: String,
    pub framework_static_prefix: String,
}

impl Default for RouteRules {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for RouteRules {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_prefix: config.api_prefix.clone(),
            framework_prefix: config.framework_prefix.clone(),
            framework_static_prefix: config.framework_static_prefix.clone(),
        }
    }
}

impl RouteRules {
    /// Classify a request made from a page served at `origin`.
    pub fn classify(&self, origin: &Url, request: &EdgeRequest) -> Route {
        if !request.is_get() {
            return Route::PassThrough(PassReason::NonGet);
        }

        if !same_origin(origin, &request.url) {
            return Route::PassThrough(PassReason::CrossOrigin);
        }

        let path = request.url.path();

        if path.starts_with(&self.framework_prefix) {
            if path.starts_with(&self.framework_static_prefix) {
                return Route::Handle(Strategy::CacheFirst);
            }
            return Route::PassThrough(PassReason::FrameworkInternal);
        }

        // Router payload fetches may run with a non-follow redirect mode.
        if request.header(RSC_HEADER) == Some("1")
            || request.header(ROUTER_PREFETCH_HEADER) == Some("1")
            || request.header(ROUTER_STATE_TREE_HEADER).is_some()
        {
            return Route::PassThrough(PassReason::RouterPayload);
        }

        if path.starts_with(&self.api_prefix) {
            return Route::Handle(Strategy::NetworkFirst);
        }

        if is_static_asset(path) {
            return Route::Handle(Strategy::CacheFirst);
        }

        Route::Handle(Strategy::StaleWhileRevalidate)
    }
}
