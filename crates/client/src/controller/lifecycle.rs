//! Install and activate.
//!
//! ```text
//! Parsed ─install─▶ Installing ─▶ Installed ─activate─▶ Activating ─▶ Active
//!                        └─(precache failed)─▶ Redundant ─(retry)─▶ Installing
//! ```
//!
//! Only `Installed`, `Activating` and `Active` controllers answer requests.
//! Re-installing while serving keeps the current state.

use std::time::Duration;

use tokio::sync::MutexGuard;

use campus_edge_core::{AppConfig, EdgeRequest, EdgeResponse, Error};

use super::CacheController;

/// Where a controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Parsed,
    Installing,
    /// Precache complete; takes over without waiting for old clients.
    Installed,
    Activating,
    /// Stale stores purged and clients claimed.
    Active,
    /// Install failed; requests pass straight through until a retry succeeds.
    Redundant,
}

impl LifecycleState {
    /// Whether a controller in this state answers requests.
    pub fn is_serving(self) -> bool {
        matches!(self, LifecycleState::Installed | LifecycleState::Activating | LifecycleState::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        }
    }
}

/// Doubling delay between install attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max: max.max(initial) }
    }

    pub(super) fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

impl From<&AppConfig> for Backoff {
    fn from(config: &AppConfig) -> Self {
        Self::new(
            Duration::from_millis(config.install_retry_ms),
            Duration::from_millis(config.install_retry_max_ms),
        )
    }
}

impl CacheController {
    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub(super) async fn set_state(&self, state: LifecycleState) {
        *self.state.write().await = state;
    }

    /// Exclusive right to run one lifecycle transition.
    fn begin_transition(&self) -> Result<MutexGuard<'_, ()>, Error> {
        self.transition
            .try_lock()
            .map_err(|_| Error::InvalidState("lifecycle transition already running".into()))
    }

    /// Open the current store and fill it with the precache set.
    ///
    /// All precache URLs are fetched before anything is written, so a failed
    /// install never leaves a partially filled store. Re-running is harmless:
    /// entries are upserts keyed by request identity.
    pub async fn install(&self) -> Result<usize, Error> {
        let _transition = self.begin_transition()?;
        let previous = {
            let mut state = self.state.write().await;
            let previous = *state;
            if !previous.is_serving() {
                *state = LifecycleState::Installing;
            }
            previous
        };

        tracing::info!(store = %self.store, urls = self.config.precache_urls.len(), "installing");

        match self.precache().await {
            Ok(count) => {
                if !previous.is_serving() {
                    self.set_state(LifecycleState::Installed).await;
                }
                tracing::info!(store = %self.store, precached = count, "installed; skipping wait");
                Ok(count)
            }
            Err(e) => {
                let next = if previous.is_serving() { previous } else { LifecycleState::Redundant };
                self.set_state(next).await;
                tracing::error!(store = %self.store, error = %e, state = next.as_str(), "install failed");
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        self.storage.open(&self.store).await?;

        let mut fetched: Vec<(EdgeRequest, EdgeResponse)> = Vec::with_capacity(self.config.precache_urls.len());
        for path in &self.config.precache_urls {
            let request = EdgeRequest::get(self.resolve(path)?);
            let response = self
                .fetcher
                .fetch(&request)
                .await
                .map_err(|e| Error::PrecacheFailed { url: path.clone(), reason: e.to_string() })?;

            if response.redirected {
                return Err(Error::PrecacheFailed {
                    url: path.clone(),
                    reason: format!("redirected to {}", response.url.as_deref().unwrap_or("?")),
                });
            }
            if !response.is_ok() {
                return Err(Error::PrecacheFailed { url: path.clone(), reason: format!("status {}", response.status) });
            }
            fetched.push((request, response));
        }

        for (request, response) in &fetched {
            self.storage.put(&self.store, request, response).await?;
        }

        Ok(fetched.len())
    }

    /// Take over a store an earlier run already filled for this version.
    ///
    /// Returns `false` when the store is missing or lacks a precached entry.
    pub async fn resume(&self) -> Result<bool, Error> {
        let _transition = self.begin_transition()?;
        if self.state().await.is_serving() {
            return Ok(true);
        }

        if !self.storage.keys().await?.iter().any(|name| name == &self.store) {
            return Ok(false);
        }

        let stored = self.storage.urls(&self.store).await?;
        for path in &self.config.precache_urls {
            let url = self.resolve(path)?;
            if !stored.iter().any(|u| u == url.as_str()) {
                tracing::debug!(store = %self.store, missing = %url, "stored copy incomplete");
                return Ok(false);
            }
        }

        self.set_state(LifecycleState::Installed).await;
        tracing::info!(store = %self.store, "resumed stored copy");
        Ok(true)
    }

    /// Delete every store except the current one and take control.
    ///
    /// Returns the names of the deleted stores.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        let _transition = self.begin_transition()?;
        let previous = {
            let mut state = self.state.write().await;
            let previous = *state;
            if !matches!(previous, LifecycleState::Installed | LifecycleState::Active) {
                return Err(Error::InvalidState(format!("activate called while {previous:?}")));
            }
            *state = LifecycleState::Activating;
            previous
        };

        match self.purge_stale_stores().await {
            Ok(deleted) => {
                self.set_state(LifecycleState::Active).await;
                tracing::info!(store = %self.store, deleted = ?deleted, "activated; clients claimed");
                Ok(deleted)
            }
            Err(e) => {
                self.set_state(previous).await;
                tracing::error!(store = %self.store, error = %e, "activation failed");
                Err(e)
            }
        }
    }

    async fn purge_stale_stores(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if name != self.store && self.storage.delete(&name).await? {
                tracing::info!(store = %name, "deleted stale store");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Install and activate, retrying failed installs until one succeeds.
    ///
    /// After the first failure a complete store from an earlier run is
    /// resumed and activated, so it keeps serving while retries continue.
    pub async fn boot(&self, backoff: Backoff) {
        let mut delay = backoff.initial;
        let mut tried_resume = false;

        while let Err(e) = self.install().await {
            if !tried_resume {
                tried_resume = true;
                match self.resume().await {
                    Ok(true) => self.activate_logged().await,
                    Ok(false) => {}
                    Err(e) => tracing::warn!(error = %e, "could not inspect stored copy"),
                }
            }

            let state = self.state().await;
            tracing::warn!(
                error = %e,
                retry_in_ms = delay.as_millis() as u64,
                state = state.as_str(),
                "install failed; retrying"
            );
            tokio::time::sleep(delay).await;
            delay = backoff.next(delay);
        }

        self.activate_logged().await;
    }

    async fn activate_logged(&self) {
        if let Err(e) = self.activate().await {
            tracing::warn!(error = %e, "activation failed; older stores kept");
        }
    }
}
