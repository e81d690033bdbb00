//! The three caching strategies.

use std::sync::Arc;

use campus_edge_core::{CacheStorage, EdgeRequest, EdgeResponse};

use super::{CacheController, Interception, PassReason, deliver, fallback, store_if_cacheable};
use crate::fetch::{FetchError, Fetcher};

impl CacheController {
    /// Cache-first: a hit never touches the network.
    ///
    /// Used for immutable, hash-named assets.
    pub async fn cache_first(&self, request: &EdgeRequest) -> Interception {
        if let Some(cached) = self.lookup(request).await {
            tracing::debug!(url = %request.url, "cache hit");
            return Interception::Respond(cached);
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                store_if_cacheable(self.storage.as_ref(), &self.store, request, &response).await;
                deliver(request, response)
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "asset fetch failed with nothing cached");
                Interception::Respond(fallback::asset_unavailable())
            }
        }
    }

    /// Network-first: the store is only a degraded-mode fallback.
    ///
    /// Used for API routes.
    pub async fn network_first(&self, request: &EdgeRequest) -> Interception {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                store_if_cacheable(self.storage.as_ref(), &self.store, request, &response).await;
                deliver(request, response)
            }
            Err(e) => match self.lookup(request).await {
                Some(cached) => {
                    tracing::info!(url = %request.url, error = %e, "network failed; serving cached copy");
                    Interception::Respond(cached)
                }
                None => {
                    tracing::warn!(url = %request.url, error = %e, "network failed with nothing cached");
                    Interception::Respond(fallback::offline_json())
                }
            },
        }
    }

    /// Stale-while-revalidate: answer from the store at once and refresh it
    /// in the background.
    ///
    /// With nothing stored the caller waits for the network. A redirected
    /// answer is then handed back as a pass-through so the redirect reaches
    /// the browser instead of the followed body.
    pub async fn stale_while_revalidate(&self, request: &EdgeRequest) -> Interception {
        let cached = self.lookup(request).await;

        let revalidation = tokio::spawn(revalidate(
            Arc::clone(&self.storage),
            Arc::clone(&self.fetcher),
            self.store.clone(),
            request.clone(),
        ));

        if let Some(cached) = cached {
            tracing::debug!(url = %request.url, "serving stale copy; revalidating in background");
            return Interception::Respond(cached);
        }

        match revalidation.await {
            Ok(Ok(response)) if response.redirected => {
                tracing::debug!(url = %request.url, final_url = ?response.url, "uncached page redirected");
                Interception::PassThrough(PassReason::RedirectedNavigation)
            }
            Ok(Ok(response)) => Interception::Respond(response),
            Ok(Err(e)) => {
                tracing::warn!(url = %request.url, error = %e, "page fetch failed with nothing cached");
                Interception::Respond(self.offline_page().await)
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "revalidation task aborted");
                Interception::Respond(self.offline_page().await)
            }
        }
    }

    /// The stored fallback page, else the inline one.
    async fn offline_page(&self) -> EdgeResponse {
        match self.resolve(&self.config.fallback_path) {
            Ok(url) => {
                if let Some(page) = self.lookup(&EdgeRequest::get(url)).await {
                    return page;
                }
            }
            Err(e) => tracing::warn!(error = %e, "fallback path does not resolve"),
        }
        fallback::inline_offline_page()
    }
}

async fn revalidate(
    storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>, store: String, request: EdgeRequest,
) -> Result<EdgeResponse, FetchError> {
    let response = fetcher.fetch(&request).await?;
    store_if_cacheable(storage.as_ref(), &store, &request, &response).await;
    Ok(response)
}
