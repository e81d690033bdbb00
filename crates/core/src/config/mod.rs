//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CAMPUS_EDGE_*)
//! 2. TOML config file (if CAMPUS_EDGE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::store_name;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CAMPUS_EDGE_*)
/// 2. TOML config file (if CAMPUS_EDGE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name, the first half of every store name.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Version tag. Bump it whenever caching behaviour changes so that
    /// activation purges the stores written by older versions.
    ///
    /// Set via CAMPUS_EDGE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Paths fetched and stored on install.
    ///
    /// Each must answer a direct 200: no redirect, no auth.
    #[serde(default = "default_precache_urls")]
    pub precache_urls: Vec<String>,

    /// Page served when a navigation cannot reach the network.
    #[serde(default = "default_fallback_path")]
    pub fallback_path: String,

    /// Paths under this prefix are API routes (network-first).
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Prefix reserved for the frontend framework's own runtime traffic.
    #[serde(default = "default_framework_prefix")]
    pub framework_prefix: String,

    /// Hashed bundle prefix inside `framework_prefix`; still cache-first.
    #[serde(default = "default_framework_static_prefix")]
    pub framework_static_prefix: String,

    /// Origin of the application server being fronted.
    ///
    /// Set via CAMPUS_EDGE_UPSTREAM_URL environment variable.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Public origin browsers use to reach the edge. Request URLs are rebuilt
    /// on it, so it is also the origin of every stored entry. Defaults to the
    /// upstream origin.
    #[serde(default)]
    pub public_origin: Option<String>,

    /// Socket address the edge server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path to SQLite cache database (`:memory:` for a throwaway database).
    ///
    /// Set via CAMPUS_EDGE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for upstream requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to accept per upstream response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Maximum redirects followed when fetching on behalf of a strategy.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// First delay before retrying a failed install, in milliseconds.
    #[serde(default = "default_install_retry_ms")]
    pub install_retry_ms: u64,

    /// Ceiling for the doubling install retry delay, in milliseconds.
    #[serde(default = "default_install_retry_max_ms")]
    pub install_retry_max_ms: u64,
}

fn default_app_name() -> String {
    "campus-engage".into()
}

fn default_cache_version() -> String {
    "v2".into()
}

fn default_precache_urls() -> Vec<String> {
    vec!["/offline".into()]
}

fn default_fallback_path() -> String {
    "/offline".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_framework_prefix() -> String {
    "/_next/".into()
}

fn default_framework_static_prefix() -> String {
    "/_next/static/".into()
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:3000".into()
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./campus-edge-cache.sqlite")
}

fn default_user_agent() -> String {
    "campus-edge/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_max_redirects() -> usize {
    5
}

fn default_install_retry_ms() -> u64 {
    1_000
}

fn default_install_retry_max_ms() -> u64 {
    60_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            cache_version: default_cache_version(),
            precache_urls: default_precache_urls(),
            fallback_path: default_fallback_path(),
            api_prefix: default_api_prefix(),
            framework_prefix: default_framework_prefix(),
            framework_static_prefix: default_framework_static_prefix(),
            upstream_url: default_upstream_url(),
            public_origin: None,
            listen_addr: default_listen_addr(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            max_redirects: default_max_redirects(),
            install_retry_ms: default_install_retry_ms(),
            install_retry_max_ms: default_install_retry_max_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the store this configuration writes to.
    pub fn store_name(&self) -> String {
        store_name(&self.app_name, &self.cache_version)
    }

    /// Parsed upstream base URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `upstream_url` does not parse.
    pub fn upstream(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.upstream_url)
            .map_err(|e| ConfigError::Invalid { field: "upstream_url".into(), reason: e.to_string() })
    }

    /// Origin requests must share to be intercepted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the configured origin does not parse.
    pub fn origin(&self) -> Result<Url, ConfigError> {
        match &self.public_origin {
            Some(origin) => Url::parse(origin)
                .map_err(|e| ConfigError::Invalid { field: "public_origin".into(), reason: e.to_string() }),
            None => self.upstream(),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CAMPUS_EDGE_`
    /// 2. TOML file from `CAMPUS_EDGE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CAMPUS_EDGE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("CAMPUS_EDGE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
