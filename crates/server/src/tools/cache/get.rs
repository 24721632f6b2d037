//! cache_get tool implementation.
//!
//! Reads one stored response back out of a named store.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::Runtime;
use shellcache_core::Error;

use crate::tools::{ResponseView, json_result};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Store name, e.g. "app-shell-v1".
    pub store: String,

    /// Absolute URL or path relative to the application origin.
    pub url: String,

    /// Request method the entry was stored under (default: GET).
    #[serde(default)]
    pub method: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub store: String,
    pub url: String,
    /// The stored response.
    pub response: ResponseView,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(runtime: &Runtime, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = runtime.worker().resolve(&params.url)?;
    let method = params.method.as_deref().unwrap_or("GET").to_ascii_uppercase();

    let response = runtime
        .worker()
        .db()
        .match_entry(&params.store, &method, &url)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{method} {url} in {}", params.store)))?;

    let output =
        CacheGetOutput { store: params.store, url: url.to_string(), response: ResponseView::from_response(response)? };
    json_result(&output)
}
