//! The offline asset cache.
//!
//! One configurable worker covers every variant of the offline-first policy:
//!
//! - **install** pre-caches the app-shell manifest into the shell store,
//!   all-or-nothing.
//! - **activate** prunes every store that does not belong to the current
//!   generation or the retention allow-list.
//! - **decide** answers an intercepted request from the store or the network
//!   according to the route table, or tells the runtime to bypass it.
//!
//! Lifecycle ordering (install before activate, activate before interception)
//! is enforced by the hosting runtime, not here.

pub mod fallback;
mod strategy;

use std::sync::Arc;

use futures_util::future::try_join_all;
use schemars::JsonSchema;
use serde::Serialize;
use shellcache_core::config::ConfigError;
use shellcache_core::{
    AppConfig, CacheDb, CacheVersion, Error, Manifest, ResourceRequest, Response, RouteTable, StoreLayout,
};
use url::Url;

use crate::fetch::{Fetcher, resolve, same_origin};

/// Everything the worker needs to know about the application it caches.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub origin: Url,
    pub version: CacheVersion,
    pub manifest: Manifest,
    pub layout: StoreLayout,
    pub routes: RouteTable,
    pub offline_document: Option<String>,
    pub placeholder_image: Option<String>,
    pub excluded_schemes: Vec<String>,
    pub bypass_cross_origin: bool,
}

impl WorkerConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            origin: config.origin_url()?,
            version: config.version()?,
            manifest: config.manifest()?,
            layout: config.store_layout()?,
            routes: config.route_table(),
            offline_document: config.offline_document.clone(),
            placeholder_image: config.placeholder_image.clone(),
            excluded_schemes: config.excluded_schemes.clone(),
            bypass_cross_origin: config.bypass_cross_origin,
        })
    }
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ServedFrom {
    Cache,
    Network,
    /// Offline document, placeholder image or synthesized 503.
    Fallback,
    /// Not intercepted; the runtime went to the network directly.
    Bypass,
}

impl ServedFrom {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServedFrom::Cache => "cache",
            ServedFrom::Network => "network",
            ServedFrom::Fallback => "fallback",
            ServedFrom::Bypass => "bypass",
        }
    }
}

/// A response together with its provenance.
#[derive(Debug)]
pub struct Served {
    pub response: Response,
    pub source: ServedFrom,
}

impl Served {
    pub fn new(response: Response, source: ServedFrom) -> Self {
        Self { response, source }
    }
}

/// Why a request was not intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// Only GET is intercepted.
    Method,
    /// Non-http(s) or explicitly excluded scheme.
    Scheme,
    /// Cross-origin request while `bypass_cross_origin` is set.
    CrossOrigin,
}

/// Outcome of the fetch/intercept decision.
#[derive(Debug)]
pub enum FetchDecision {
    /// Let the request go straight to the network untouched.
    Bypass(BypassReason),
    /// Answer the request with this response.
    Respond(Served),
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct InstallReport {
    pub store: String,
    pub version: String,
    pub cached: Vec<String>,
}

/// Result of an activation pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, JsonSchema)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub kept: Vec<String>,
}

/// Offline-first resource cache bound to one store database and one network.
pub struct OfflineAssetCache {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    config: WorkerConfig,
}

impl OfflineAssetCache {
    pub fn new(db: CacheDb, fetcher: Arc<dyn Fetcher>, config: WorkerConfig) -> Self {
        Self { db, fetcher, config }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.config.layout
    }

    /// Resolve a path or URL against the application origin.
    pub fn resolve(&self, target: &str) -> Result<Url, Error> {
        resolve(&self.config.origin, target).map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    /// Fetch every manifest entry and store them in the shell store.
    ///
    /// All entries are fetched concurrently. If any request fails, or answers
    /// with anything but a same-origin 200, nothing is written and the install
    /// fails naming that entry.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let store = self.config.layout.shell.clone();
        tracing::info!(store = %store, entries = self.config.manifest.len(), "installing app shell");

        let fetches = self.config.manifest.entries().iter().map(|path| async move {
            let url = self.resolve(path).map_err(|e| install_failed(path, e))?;
            let request = ResourceRequest::get(url);
            let response = self
                .fetcher
                .fetch(&request)
                .await
                .map_err(|e| install_failed(path, e))?;
            if !response.is_storable() {
                return Err(Error::InstallFailed {
                    path: path.clone(),
                    reason: format!("status {} ({})", response.status, response.response_type.as_str()),
                });
            }
            Ok((request, response))
        });

        let entries = try_join_all(fetches).await.inspect_err(|e| {
            tracing::error!(store = %store, error = %e, "app shell install failed");
        })?;

        self.db
            .put_entries(&store, entries)
            .await
            .map_err(|e| Error::InstallFailed { path: store.clone(), reason: e.to_string() })?;

        tracing::info!(store = %store, "app shell cached");

        Ok(InstallReport {
            store,
            version: self.config.version.to_string(),
            cached: self.config.manifest.entries().to_vec(),
        })
    }

    /// Delete every store that activation does not retain.
    ///
    /// Running it again with nothing stale is a no-op.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let names = self.db.store_names().await?;
        let (kept, stale): (Vec<String>, Vec<String>) =
            names.into_iter().partition(|name| self.config.layout.is_retained(name));

        try_join_all(stale.iter().map(|name| async move {
            tracing::info!(store = %name, "deleting stale store");
            self.db.delete_store(name).await
        }))
        .await?;

        tracing::info!(deleted = stale.len(), kept = kept.len(), "store cleanup completed");

        Ok(ActivateReport { deleted: stale, kept })
    }

    /// Decide how an intercepted request is answered.
    ///
    /// Network failures on cache-first routes turn into fallbacks.
    /// Network-first routes fail on a network failure only when nothing is
    /// stored for the request. Any other fetch error is returned as is.
    pub async fn decide(&self, request: &ResourceRequest) -> Result<FetchDecision, Error> {
        if let Some(reason) = self.bypass_reason(request) {
            tracing::debug!(method = %request.method, url = %request.url, ?reason, "bypassing request");
            return Ok(FetchDecision::Bypass(reason));
        }

        let strategy = self.config.routes.strategy_for(request.path());
        tracing::debug!(url = %request.url, ?strategy, "intercepting request");

        let served = match strategy {
            shellcache_core::Strategy::CacheFirst => self.cache_first(request).await?,
            shellcache_core::Strategy::NetworkFirst => self.network_first(request).await?,
        };
        Ok(FetchDecision::Respond(served))
    }

    fn bypass_reason(&self, request: &ResourceRequest) -> Option<BypassReason> {
        if !request.is_get() {
            return Some(BypassReason::Method);
        }
        let scheme = request.url.scheme();
        if !request.is_http() || self.config.excluded_schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
            return Some(BypassReason::Scheme);
        }
        if self.config.bypass_cross_origin && !same_origin(&self.config.origin, &request.url) {
            return Some(BypassReason::CrossOrigin);
        }
        None
    }

    /// Store a duplicate of `response`, leaving the original for the caller.
    ///
    /// Failures are logged and swallowed: the response is already in hand.
    async fn store_copy(&self, store: &str, request: &ResourceRequest, response: &Response) {
        let copy = match response.try_clone() {
            Ok(copy) => copy,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cannot duplicate response for storage");
                return;
            }
        };
        if let Err(e) = self.db.put_entry(store, request, copy).await {
            tracing::warn!(store, url = %request.url, error = %e, "store write failed");
        }
    }
}

fn install_failed(path: &str, err: Error) -> Error {
    Error::InstallFailed { path: path.to_string(), reason: err.to_string() }
}
