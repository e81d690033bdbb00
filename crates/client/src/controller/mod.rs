//! The cache controller.
//!
//! Decides, for each intercepted request, whether to answer from the cache,
//! the network, or both, and never hands a redirected response to a caller
//! that does not follow redirects.
//!
//! ### Routing
//! - non-GET, cross-origin, framework internals, router payloads: pass through
//! - `/api/*`: network-first
//! - static asset extensions and hashed framework bundles: cache-first
//! - everything else: stale-while-revalidate
//!
//! ### Lifecycle
//! `install` precaches into `<app-name>-<version>`; `activate` deletes every
//! other store. Until a controller is installed every request passes through.

pub mod fallback;
pub mod lifecycle;
pub mod routes;
pub mod strategy;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use url::Url;

use campus_edge_core::cache::store_name;
use campus_edge_core::{AppConfig, CacheStorage, ConfigError, EdgeRequest, EdgeResponse, Error, RedirectMode};

use crate::fetch::Fetcher;

pub use lifecycle::{Backoff, LifecycleState};
pub use routes::{PassReason, Route, RouteRules, Strategy, is_static_asset};

/// Explicit controller configuration; no process-wide state.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub app_name: String,
    pub version_tag: String,
    /// Paths fetched and stored on install.
    pub precache_urls: Vec<String>,
    /// Page served to offline navigations.
    pub fallback_path: String,
    /// Origin the application is served from.
    pub origin: Url,
    pub routes: RouteRules,
}

impl ControllerConfig {
    pub fn new(app_name: impl Into<String>, version_tag: impl Into<String>, origin: Url) -> Self {
        Self {
            app_name: app_name.into(),
            version_tag: version_tag.into(),
            precache_urls: vec!["/offline".into()],
            fallback_path: "/offline".into(),
            origin,
            routes: RouteRules::default(),
        }
    }

    pub fn with_precache(mut self, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.precache_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fallback_path(mut self, path: impl Into<String>) -> Self {
        self.fallback_path = path.into();
        self
    }

    pub fn store_name(&self) -> String {
        store_name(&self.app_name, &self.version_tag)
    }
}

impl TryFrom<&AppConfig> for ControllerConfig {
    type Error = ConfigError;

    fn try_from(config: &AppConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            app_name: config.app_name.clone(),
            version_tag: config.cache_version.clone(),
            precache_urls: config.precache_urls.clone(),
            fallback_path: config.fallback_path.clone(),
            origin: config.origin()?,
            routes: RouteRules::from(config),
        })
    }
}

/// What the caller should do with an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Let the request reach the network untouched.
    PassThrough(PassReason),
    /// Answer with this response.
    Respond(EdgeResponse),
}

impl Interception {
    pub fn response(&self) -> Option<&EdgeResponse> {
        match self {
            Interception::Respond(response) => Some(response),
            Interception::PassThrough(_) => None,
        }
    }
}

/// Versioned, multi-strategy response cache in front of a [`Fetcher`].
pub struct CacheController {
    config: ControllerConfig,
    store: String,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    state: RwLock<LifecycleState>,
    transition: Mutex<()>,
}

impl CacheController {
    pub fn new(config: ControllerConfig, storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        let store = config.store_name();
        Self {
            config,
            store,
            storage,
            fetcher,
            state: RwLock::new(LifecycleState::Parsed),
            transition: Mutex::new(()),
        }
    }

    /// Name of the store this controller reads and writes.
    pub fn store_name(&self) -> &str {
        &self.store
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Handle one intercepted request. Never fails: the worst case is a
    /// synthetic offline response.
    pub async fn handle_request(&self, request: &EdgeRequest) -> Interception {
        let state = self.state().await;
        if !state.is_serving() {
            tracing::trace!(url = %request.url, state = state.as_str(), "not installed; passing through");
            return Interception::PassThrough(PassReason::Inactive);
        }

        match self.config.routes.classify(&self.config.origin, request) {
            Route::PassThrough(reason) => {
                tracing::trace!(url = %request.url, reason = reason.as_str(), "passing through");
                Interception::PassThrough(reason)
            }
            Route::Handle(strategy) => {
                tracing::debug!(url = %request.url, ?strategy, "intercepted");
                match strategy {
                    Strategy::CacheFirst => self.cache_first(request).await,
                    Strategy::NetworkFirst => self.network_first(request).await,
                    Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
                }
            }
        }
    }

    /// Absolute URL for a configured path on the application origin.
    pub(crate) fn resolve(&self, path: &str) -> Result<Url, Error> {
        Ok(self.config.origin.join(path)?)
    }

    /// Cache lookup; a storage failure counts as a miss.
    pub(crate) async fn lookup(&self, request: &EdgeRequest) -> Option<EdgeResponse> {
        match self.storage.match_request(&self.store, request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed; treating as miss");
                None
            }
        }
    }
}

/// Write a response if, and only if, it is a direct success.
pub(crate) async fn store_if_cacheable(
    storage: &dyn CacheStorage, store: &str, request: &EdgeRequest, response: &EdgeResponse,
) {
    if !response.is_cacheable() {
        tracing::debug!(
            url = %request.url,
            status = response.status,
            redirected = response.redirected,
            "not caching response"
        );
        return;
    }

    if let Err(e) = storage.put(store, request, response).await {
        tracing::warn!(url = %request.url, error = %e, "cache write failed");
    }
}

/// Return a live response unless it was redirected and the caller forbids that.
pub(crate) fn deliver(request: &EdgeRequest, response: EdgeResponse) -> Interception {
    if response.redirected && request.redirect != RedirectMode::Follow {
        tracing::debug!(url = %request.url, redirect = ?request.redirect, "redirected response not returnable");
        return Interception::PassThrough(PassReason::RedirectNotFollowable);
    }
    Interception::Respond(response)
}
