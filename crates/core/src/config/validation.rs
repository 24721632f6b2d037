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

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `cache_version`, `runtime_version` or a store purpose is empty
    /// - a manifest entry is relative or duplicated
    /// - a route prefix does not start with `/`
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or `sync_tag` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an http(s) URL".into() });
        }

        for (field, value) in [("shell_store", &self.shell_store), ("runtime_store", &self.runtime_store)] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not be empty".into() });
            }
        }
        if self.shell_store == self.runtime_store && self.runtime_version.is_none() {
            return Err(ConfigError::Invalid {
                field: "runtime_store".into(),
                reason: "must differ from shell_store".into(),
            });
        }

        let layout = self.store_layout()?;
        if layout.shell == layout.runtime {
            return Err(ConfigError::Invalid {
                field: "runtime_store".into(),
                reason: "shell and runtime stores resolve to the same name".into(),
            });
        }

        let manifest = self.manifest()?;

        for rule in &self.routes {
            if !rule.prefix.starts_with('/') {
                return Err(ConfigError::Invalid {
                    field: "routes".into(),
                    reason: format!("prefix must start with '/': {}", rule.prefix),
                });
            }
        }

        for (field, fallback) in
            [("offline_document", &self.offline_document), ("placeholder_image", &self.placeholder_image)]
        {
            if let Some(path) = fallback
                && !manifest.contains(path)
            {
                tracing::warn!(field, path = %path, "fallback is not in the manifest and may not be cached");
            }
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }
        if self.sync_tag.is_empty() {
            return Err(ConfigError::Invalid { field: "sync_tag".into(), reason: "must not be empty".into() });
        }

        Ok(())
    }
}
