//! shellcache server entry point.
//!
//! Boots the offline cache runtime and serves it over MCP on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{FetchClient, FetchConfig, OfflineAssetCache, Runtime, RuntimeOptions, WorkerConfig};
use shellcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        origin = %config.origin,
        version = %config.cache_version,
        db = %config.db_path.display(),
        "Starting shellcache server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path)
        .await?
        .with_quota(config.store_quota_bytes);
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from_app_config(&config))?);
    let worker = OfflineAssetCache::new(db, fetcher, WorkerConfig::from_app_config(&config)?);
    let runtime = Arc::new(Runtime::new(worker, RuntimeOptions::from_app_config(&config)));

    match runtime.register().await {
        Ok(registration) => tracing::info!(
            store = %registration.install.store,
            cached = registration.install.cached.len(),
            state = %registration.state,
            "worker registered"
        ),
        Err(e) => tracing::error!(
            error = %e,
            state = %runtime.state(),
            active = ?runtime.active_version(),
            "worker registration failed"
        ),
    }

    let handler = handler::ShellCacheServer::new(runtime);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
