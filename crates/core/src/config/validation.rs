//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn require_path(field: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with('/') {
        return Err(invalid(field, format!("must be an absolute path, got {value:?}")));
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `app_name` or `cache_version` is empty or contains whitespace
    /// - a precache entry, the fallback path, or a route prefix is not an absolute path
    /// - `upstream_url` or `public_origin` does not parse as an http(s) URL
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_redirects` exceeds 20
    /// - `install_retry_ms` is below 10ms or above `install_retry_max_ms`
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("app_name", &self.app_name), ("cache_version", &self.cache_version)] {
            if value.is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
            if value.chars().any(char::is_whitespace) {
                return Err(invalid(field, "must not contain whitespace"));
            }
        }

        for path in &self.precache_urls {
            require_path("precache_urls", path)?;
        }
        require_path("fallback_path", &self.fallback_path)?;
        require_path("api_prefix", &self.api_prefix)?;
        require_path("framework_prefix", &self.framework_prefix)?;
        require_path("framework_static_prefix", &self.framework_static_prefix)?;

        if !self.framework_static_prefix.starts_with(&self.framework_prefix) {
            return Err(invalid("framework_static_prefix", "must live under framework_prefix"));
        }

        if !self.precache_urls.contains(&self.fallback_path) {
            tracing::warn!(
                fallback_path = %self.fallback_path,
                "fallback_path is not precached; offline navigations will get the inline page"
            );
        }

        for (field, url) in [("upstream_url", self.upstream()?), ("public_origin", self.origin()?)] {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(invalid(field, format!("unsupported scheme: {}", url.scheme())));
            }
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_redirects > 20 {
            return Err(invalid("max_redirects", "must not exceed 20"));
        }

        if self.install_retry_ms < 10 {
            return Err(invalid("install_retry_ms", "must be at least 10ms"));
        }
        if self.install_retry_max_ms < self.install_retry_ms {
            return Err(invalid("install_retry_max_ms", "must not be below install_retry_ms"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        Ok(())
    }
}
