//! Lifecycle tools: install, activate and status.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use shellcache_client::Runtime;

use super::json_result;

/// Install the configured version as a new worker, activating right away
/// when skip_waiting is set. The active worker keeps serving until then, and
/// an earlier failed attempt does not block a retry.
pub async fn install_impl(runtime: &Runtime) -> Result<CallToolResult, McpError> {
    let registration = runtime.register().await?;
    json_result(&registration)
}

/// Activate a worker that is waiting after install.
pub async fn activate_impl(runtime: &Runtime) -> Result<CallToolResult, McpError> {
    let report = runtime.activate().await?;
    json_result(&report)
}

pub async fn status_impl(runtime: &Runtime) -> Result<CallToolResult, McpError> {
    json_result(&runtime.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{app_shell, output, test_runtime};
    use serde_json::Value;

    #[tokio::test]
    async fn test_install_reports_cached_entries() {
        let runtime = test_runtime(app_shell()).await;

        let out: Value = output(&install_impl(&runtime).await.unwrap());
        assert_eq!(out["install"]["store"], "app-shell-v1");
        assert_eq!(out["install"]["cached"].as_array().unwrap().len(), 3);
        assert_eq!(out["state"], "active");
    }

    #[tokio::test]
    async fn test_install_after_startup_registration() {
        let runtime = test_runtime(app_shell()).await;
        runtime.register().await.unwrap();

        let out: Value = output(&install_impl(&runtime).await.unwrap());
        assert_eq!(out["install"]["store"], "app-shell-v1");
        assert_eq!(out["state"], "active");
    }

    #[tokio::test]
    async fn test_install_retries_after_failed_startup() {
        let network = app_shell();
        network.set_online(false);
        let runtime = test_runtime(network.clone()).await;
        assert!(runtime.register().await.is_err());

        let err = install_impl(&runtime).await.unwrap_err();
        assert!(err.message.contains("INSTALL_FAILED"));

        network.set_online(true);
        let out: Value = output(&install_impl(&runtime).await.unwrap());
        assert_eq!(out["state"], "active");

        let status: Value = output(&status_impl(&runtime).await.unwrap());
        assert_eq!(status["active_version"], "v1");
        assert_eq!(status["pending_state"], Value::Null);
    }

    #[tokio::test]
    async fn test_activate_without_install_fails() {
        let runtime = test_runtime(app_shell()).await;
        let err = activate_impl(&runtime).await.unwrap_err();
        assert_eq!(err.code.0, -32010);
    }

    #[tokio::test]
    async fn test_status_before_and_after_install() {
        let runtime = test_runtime(app_shell()).await;

        let before: Value = output(&status_impl(&runtime).await.unwrap());
        assert_eq!(before["state"], "uninstalled");
        assert_eq!(before["controlling"], false);

        install_impl(&runtime).await.unwrap();
        let after: Value = output(&status_impl(&runtime).await.unwrap());
        assert_eq!(after["state"], "active");
        assert_eq!(after["controlling"], true);
        assert_eq!(after["shell_store"], "app-shell-v1");
        assert_eq!(after["runtime_store"], "data-v1");
    }
}
