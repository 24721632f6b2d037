//! background_sync tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{Runtime, SyncSignal};
use shellcache_core::Error;

use super::json_result;

/// Input parameters for the background_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackgroundSyncParams {
    /// Sync tag, e.g. "background-sync".
    pub tag: String,

    /// Signal id. Delivering the same id twice runs nothing the second time.
    /// A fresh id is assigned when omitted.
    #[serde(default)]
    pub signal_id: Option<u64>,
}

pub async fn sync_impl(runtime: &Runtime, params: BackgroundSyncParams) -> Result<CallToolResult, McpError> {
    if params.tag.trim().is_empty() {
        return Err(Error::InvalidInput("tag cannot be empty".into()).into());
    }

    let report = match params.signal_id {
        Some(id) => runtime.deliver_sync(SyncSignal::host(id, params.tag)).await?,
        None => runtime.sync(&params.tag).await?,
    };
    json_result(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{app_shell, output, test_runtime};
    use serde_json::Value;

    fn params(tag: &str, signal_id: Option<u64>) -> BackgroundSyncParams {
        BackgroundSyncParams { tag: tag.into(), signal_id }
    }

    #[tokio::test]
    async fn test_sync_requires_active_worker() {
        let runtime = test_runtime(app_shell()).await;
        let err = sync_impl(&runtime, params("background-sync", None)).await.unwrap_err();
        assert!(err.message.contains("INVALID_STATE"));
    }

    #[tokio::test]
    async fn test_repeated_signal_is_duplicate() {
        let runtime = test_runtime(app_shell()).await;
        runtime.register().await.unwrap();

        let first: Value = output(&sync_impl(&runtime, params("background-sync", Some(5))).await.unwrap());
        let second: Value = output(&sync_impl(&runtime, params("background-sync", Some(5))).await.unwrap());

        assert_eq!(first["outcome"]["status"], "completed");
        assert_eq!(first["task"], "log-sync");
        assert_eq!(second["outcome"]["status"], "duplicate");
    }

    #[tokio::test]
    async fn test_generated_id_does_not_collide_with_host_id() {
        let runtime = test_runtime(app_shell()).await;
        runtime.register().await.unwrap();

        sync_impl(&runtime, params("background-sync", Some(1))).await.unwrap();
        let out: Value = output(&sync_impl(&runtime, params("background-sync", None)).await.unwrap());
        assert_eq!(out["signal_id"], 1);
        assert_eq!(out["source"], "runtime");
        assert_eq!(out["outcome"]["status"], "completed");
    }

    #[tokio::test]
    async fn test_unknown_tag_ignored() {
        let runtime = test_runtime(app_shell()).await;
        runtime.register().await.unwrap();

        let out: Value = output(&sync_impl(&runtime, params("nightly", None)).await.unwrap());
        assert_eq!(out["outcome"]["status"], "ignored");
    }

    #[tokio::test]
    async fn test_empty_tag_rejected() {
        let runtime = test_runtime(app_shell()).await;
        let err = sync_impl(&runtime, params(" ", None)).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
