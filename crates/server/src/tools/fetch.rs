//! sw_fetch tool implementation.
//!
//! Sends a request through the runtime exactly as a controlled page would.

use std::collections::BTreeMap;

use chrono::Utc;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::Runtime;
use shellcache_core::{Destination, Error, ResourceRequest};

use super::{ResponseView, json_result};

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL or path relative to the application origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET is ever answered from a store.
    #[serde(default)]
    pub method: Option<String>,

    /// What the request is for: document, image, script, style, ...
    /// `document` marks a navigation.
    #[serde(default)]
    pub destination: Option<Destination>,

    /// Extra request headers.
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// The resolved request URL.
    pub url: String,
    pub method: String,
    /// cache, network, fallback or bypass.
    pub served_from: String,
    pub response: ResponseView,
    pub fetched_at: String,
}

pub async fn fetch_impl(runtime: &Runtime, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let url = runtime.worker().resolve(&params.url)?;
    let mut request = ResourceRequest::get(url)
        .with_method(params.method.as_deref().unwrap_or("GET"))
        .with_destination(params.destination.unwrap_or_default());
    for (name, value) in params.headers.unwrap_or_default() {
        request = request.with_header(name, value);
    }

    let url = request.url.to_string();
    let method = request.method.clone();
    let served = runtime.fetch(request).await?;
    tracing::debug!(%url, %method, source = served.source.as_str(), "sw_fetch answered");

    let output = SwFetchOutput {
        url,
        method,
        served_from: served.source.as_str().to_string(),
        response: ResponseView::from_response(served.response)?,
        fetched_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    };
    json_result(&output)
}
