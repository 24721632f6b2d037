//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{CacheVersion, Manifest, RouteRule, RouteTable, StoreLayout, Strategy};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite store database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin of the application being served, e.g. `https://app.example`.
    ///
    /// Manifest paths and relative request URLs resolve against it; responses
    /// from it are same-origin.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Current generation of the app shell. Bumping it prunes older shell stores.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Purpose prefix of the store holding manifest entries.
    #[serde(default = "default_shell_store")]
    pub shell_store: String,

    /// Purpose prefix of the store holding entries fetched at runtime.
    #[serde(default = "default_runtime_store")]
    pub runtime_store: String,

    /// Generation of the runtime store; defaults to `cache_version`.
    #[serde(default)]
    pub runtime_version: Option<String>,

    /// Store names activation never deletes.
    #[serde(default)]
    pub retained_stores: Vec<String>,

    /// Paths that must be available offline after install.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Strategy overrides by path prefix. Unmatched paths are cache-first.
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteRule>,

    /// Served to navigations when both cache and network miss.
    #[serde(default = "default_offline_document")]
    pub offline_document: Option<String>,

    /// Served to image requests when both cache and network miss.
    #[serde(default)]
    pub placeholder_image: Option<String>,

    /// URL schemes that are never intercepted.
    #[serde(default = "default_excluded_schemes")]
    pub excluded_schemes: Vec<String>,

    /// Send cross-origin requests straight to the network.
    #[serde(default)]
    pub bypass_cross_origin: bool,

    /// Activate right after a successful install instead of waiting.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Control existing clients immediately on activation.
    #[serde(default = "default_true")]
    pub claim_clients: bool,

    /// Tag of the background sync signal handled by the default task.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// Maximum body bytes a single store may hold.
    #[serde(default)]
    pub store_quota_bytes: Option<u64>,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:5000".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_shell_store() -> String {
    "app-shell".into()
}

fn default_runtime_store() -> String {
    "data".into()
}

fn default_manifest() -> Vec<String> {
    vec!["/".into(), "/index.html".into(), "/offline.html".into()]
}

fn default_routes() -> Vec<RouteRule> {
    vec![RouteRule::new("/api/", Strategy::NetworkFirst)]
}

fn default_offline_document() -> Option<String> {
    Some("/offline.html".into())
}

fn default_excluded_schemes() -> Vec<String> {
    vec!["chrome-extension".into(), "moz-extension".into(), "safari-extension".into()]
}

fn default_sync_tag() -> String {
    "background-sync".into()
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_version: default_cache_version(),
            shell_store: default_shell_store(),
            runtime_store: default_runtime_store(),
            runtime_version: None,
            retained_stores: Vec::new(),
            manifest: default_manifest(),
            routes: default_routes(),
            offline_document: default_offline_document(),
            placeholder_image: None,
            excluded_schemes: default_excluded_schemes(),
            bypass_cross_origin: false,
            skip_waiting: true,
            claim_clients: true,
            sync_tag: default_sync_tag(),
            store_quota_bytes: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELLCACHE_`
    /// 2. TOML file from `SHELLCACHE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parsed application origin.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    pub fn version(&self) -> Result<CacheVersion, ConfigError> {
        CacheVersion::new(self.cache_version.clone())
            .map_err(|e| ConfigError::Invalid { field: "cache_version".into(), reason: e.to_string() })
    }

    pub fn manifest(&self) -> Result<Manifest, ConfigError> {
        Manifest::new(self.manifest.iter().cloned())
            .map_err(|e| ConfigError::Invalid { field: "manifest".into(), reason: e.to_string() })
    }

    /// Active store names derived from purposes and versions.
    pub fn store_layout(&self) -> Result<StoreLayout, ConfigError> {
        let version = self.version()?;
        let runtime_version = match &self.runtime_version {
            Some(v) => CacheVersion::new(v.clone())
                .map_err(|e| ConfigError::Invalid { field: "runtime_version".into(), reason: e.to_string() })?,
            None => version.clone(),
        };
        Ok(StoreLayout::new(&self.shell_store, &version, &self.runtime_store, &runtime_version)
            .with_retained(self.retained_stores.iter().cloned()))
    }

    pub fn route_table(&self) -> RouteTable {
        RouteTable::new(self.routes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./shellcache.sqlite"));
        assert_eq!(config.user_agent, "shellcache/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.sync_tag, "background-sync");
        assert!(config.skip_waiting);
        assert!(config.claim_clients);
        assert!(!config.bypass_cross_origin);
        assert!(config.store_quota_bytes.is_none());
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_store_layout_defaults_runtime_version() {
        let config = AppConfig { cache_version: "v3".into(), ..Default::default() };
        let layout = config.store_layout().unwrap();
        assert_eq!(layout.shell, "app-shell-v3");
        assert_eq!(layout.runtime, "data-v3");
    }

    #[test]
    fn test_store_layout_independent_runtime_version() {
        let config = AppConfig {
            cache_version: "v2".into(),
            runtime_version: Some("v1".into()),
            retained_stores: vec!["fonts".into()],
            ..Default::default()
        };
        let layout = config.store_layout().unwrap();
        assert_eq!(layout.shell, "app-shell-v2");
        assert_eq!(layout.runtime, "data-v1");
        assert!(layout.is_retained("fonts"));
    }

    #[test]
    fn test_default_routes() {
        let table = AppConfig::default().route_table();
        assert_eq!(table.strategy_for("/api/items"), Strategy::NetworkFirst);
        assert_eq!(table.strategy_for("/index.html"), Strategy::CacheFirst);
    }

    #[test]
    fn test_routes_from_toml() {
        let toml = r#"
            origin = "https://app.example"
            manifest = ["/", "/offline.html"]

            [[routes]]
            prefix = "/feeds/"
            strategy = "network_first"
        "#;
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap();

        assert_eq!(config.origin, "https://app.example");
        assert_eq!(config.routes, vec![RouteRule::new("/feeds/", Strategy::NetworkFirst)]);
        assert_eq!(config.manifest().unwrap().len(), 2);
    }
}
