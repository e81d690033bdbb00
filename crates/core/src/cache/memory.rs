//! In-memory [`CacheStorage`], used by tests and ephemeral deployments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::storage::{CacheStorage, StoreStats, ensure_storable};
use crate::Error;
use crate::model::{EdgeRequest, EdgeResponse};

#[derive(Debug, Default)]
struct MemoryStore {
    seq: u64,
    entries: HashMap<String, (String, EdgeResponse)>,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    stores: HashMap<String, MemoryStore>,
}

impl Inner {
    fn store_mut(&mut self, name: &str) -> &mut MemoryStore {
        let next_seq = &mut self.next_seq;
        self.stores.entry(name.to_string()).or_insert_with(|| {
            let seq = *next_seq;
            *next_seq += 1;
            MemoryStore { seq, entries: HashMap::new() }
        })
    }
}

/// Stores held in a `HashMap` behind a tokio `RwLock`. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.inner.write().await.store_mut(name);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let inner = self.inner.read().await;
        let mut stores: Vec<(&String, u64)> = inner.stores.iter().map(|(name, s)| (name, s.seq)).collect();
        stores.sort_by_key(|(_, seq)| *seq);
        Ok(stores.into_iter().map(|(name, _)| name.clone()).collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        Ok(self.inner.write().await.stores.remove(name).is_some())
    }

    async fn match_request(&self, name: &str, request: &EdgeRequest) -> Result<Option<EdgeResponse>, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .stores
            .get(name)
            .and_then(|s| s.entries.get(&request.cache_key()))
            .map(|(_, response)| response.clone()))
    }

    async fn put(&self, name: &str, request: &EdgeRequest, response: &EdgeResponse) -> Result<(), Error> {
        ensure_storable(request, response)?;
        let mut inner = self.inner.write().await;
        inner
            .store_mut(name)
            .entries
            .insert(request.cache_key(), (request.url.to_string(), response.clone()));
        Ok(())
    }

    async fn urls(&self, name: &str) -> Result<Vec<String>, Error> {
        let inner = self.inner.read().await;
        let mut urls: Vec<String> = inner
            .stores
            .get(name)
            .map(|s| s.entries.values().map(|(url, _)| url.clone()).collect())
            .unwrap_or_default();
        urls.sort();
        Ok(urls)
    }

    async fn stats(&self, name: &str) -> Result<StoreStats, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .stores
            .get(name)
            .map(|s| StoreStats {
                entries: s.entries.len() as u64,
                bytes: s.entries.values().map(|(_, r)| r.body.len() as u64).sum(),
            })
            .unwrap_or_default())
    }
}
