//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheGetParams, get_impl, stores_impl};
use crate::tools::fetch::{SwFetchParams, fetch_impl};
use crate::tools::lifecycle::{activate_impl, install_impl, status_impl};
use crate::tools::sync::{BackgroundSyncParams, sync_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shellcache_client::Runtime;

/// The main MCP server handler for shellcache.
#[derive(Clone)]
pub struct ShellCacheServer {
    tool_router: ToolRouter<Self>,
    runtime: Arc<Runtime>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ShellCacheServer {
    /// Create a new server handler around a registered runtime.
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { tool_router: Self::tool_router(), runtime }
    }

    /// Send a request through the offline cache.
    ///
    /// Returns the response together with where it came from: a store, the
    /// network, an offline fallback, or a bypass straight to the network.
    #[tool(
        description = "Fetch a URL or app path through the offline cache. Returns status, headers, body and served_from (cache, network, fallback, bypass)."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.runtime, params.0).await
    }

    #[tool(description = "Install the app shell into the current shell store; activates immediately when skip_waiting is set.")]
    async fn lifecycle_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.runtime).await
    }

    #[tool(description = "Activate a waiting worker, deleting stores from older cache versions.")]
    async fn lifecycle_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.runtime).await
    }

    #[tool(description = "Report worker state, cache version, store layout and whether clients are controlled.")]
    async fn lifecycle_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.runtime).await
    }

    #[tool(description = "Deliver a background sync signal for a tag. Each signal id runs at most once.")]
    async fn background_sync(&self, params: Parameters<BackgroundSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.runtime, params.0).await
    }

    #[tool(description = "List every response store with its entries and total size.")]
    async fn cache_stores(&self) -> Result<CallToolResult, McpError> {
        stores_impl(&self.runtime).await
    }

    #[tool(description = "Read one stored response back from a named store.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.runtime, params.0).await
    }
}

impl ServerHandler for ShellCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Offline-first resource cache. Use sw_fetch to request resources as a controlled page would.".into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{app_shell, test_runtime};

    #[tokio::test]
    async fn test_lists_every_tool() {
        let server = ShellCacheServer::new(Arc::new(test_runtime(app_shell()).await));
        let names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();

        for expected in [
            "sw_fetch",
            "lifecycle_install",
            "lifecycle_activate",
            "lifecycle_status",
            "background_sync",
            "cache_stores",
            "cache_get",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing tool {expected}");
        }
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = ShellCacheServer::new(Arc::new(test_runtime(app_shell()).await));
        assert_eq!(server.get_info().server_info.name, "shellcache");
    }
}
