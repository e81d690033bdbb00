//! The storage seam behind the cache controller.
//!
//! A storage holds any number of named stores; each store maps a request
//! identity to a response. Store names carry the version tag, so upgrading is
//! a matter of writing into a new store and deleting the old ones.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::model::{EdgeRequest, EdgeResponse};

/// Size summary of a single store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub entries: u64,
    pub bytes: u64,
}

/// Named, versioned response stores.
///
/// Writes are last-writer-wins; there is no per-entry eviction.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the store if it does not exist yet.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Names of all existing stores, oldest first.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a store and every entry in it. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Look up the stored response for a request identity.
    async fn match_request(&self, name: &str, request: &EdgeRequest) -> Result<Option<EdgeResponse>, Error>;

    /// Insert or overwrite the entry for a request identity, creating the store if needed.
    ///
    /// Redirected responses are rejected with [`Error::InvalidInput`].
    async fn put(&self, name: &str, request: &EdgeRequest, response: &EdgeResponse) -> Result<(), Error>;

    /// URLs with an entry in the store, sorted.
    async fn urls(&self, name: &str) -> Result<Vec<String>, Error>;

    async fn stats(&self, name: &str) -> Result<StoreStats, Error>;
}

/// Shared write guard for storage implementations.
pub(crate) fn ensure_storable(request: &EdgeRequest, response: &EdgeResponse) -> Result<(), Error> {
    if response.redirected {
        return Err(Error::InvalidInput(format!("refusing to store redirected response for {}", request.url)));
    }
    Ok(())
}
