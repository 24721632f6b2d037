//! MCP tool implementations.
//!
//! This module contains all tools exposed by the shellcache server.

pub mod cache;
pub mod fetch;
pub mod lifecycle;
pub mod sync;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{Error, Response};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

/// A response as reported to the caller. Consumes the body.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResponseView {
    pub status: u16,
    pub status_text: String,
    /// basic, cors, opaque or default.
    pub response_type: String,
    /// Final URL, when known.
    pub url: Option<String>,
    pub headers: Vec<HeaderEntry>,
    /// Body decoded as UTF-8, lossy.
    pub body: String,
    /// Exact body length in bytes.
    pub body_bytes: usize,
}

impl ResponseView {
    pub fn from_response(response: Response) -> Result<Self, Error> {
        let status = response.status;
        let status_text = response.status_text.clone();
        let response_type = response.response_type.as_str().to_string();
        let url = response.url.clone();
        let headers = response
            .headers
            .iter()
            .map(|(name, value)| HeaderEntry { name: name.clone(), value: value.clone() })
            .collect();
        let bytes = response.bytes()?;

        Ok(Self {
            status,
            status_text,
            response_type,
            url,
            headers,
            body: String::from_utf8_lossy(&bytes).to_string(),
            body_bytes: bytes.len(),
        })
    }
}

/// Pretty JSON text result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use shellcache_client::{Fetcher, OfflineAssetCache, Runtime, RuntimeOptions, WorkerConfig};
    use shellcache_core::{AppConfig, CacheDb, Error, ResourceRequest, Response, ResponseType};

    pub const ORIGIN: &str = "https://app.test";

    /// Serves fixed bodies for paths under the test origin.
    pub struct StubNetwork {
        bodies: Mutex<HashMap<String, String>>,
        online: AtomicBool,
    }

    impl StubNetwork {
        pub fn new(paths: &[(&str, &str)]) -> Self {
            let bodies = paths
                .iter()
                .map(|(path, body)| (format!("{ORIGIN}{path}"), body.to_string()))
                .collect();
            Self { bodies: Mutex::new(bodies), online: AtomicBool::new(true) }
        }

        pub fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Fetcher for StubNetwork {
        async fn fetch(&self, request: &ResourceRequest) -> Result<Response, Error> {
            if !self.online.load(Ordering::SeqCst) {
                return Err(Error::Network("offline".into()));
            }
            let body = self.bodies.lock().unwrap().get(request.url.as_str()).cloned();
            Ok(match body {
                Some(body) => Response::new(200, "OK", body)
                    .with_header("Content-Type", "text/html")
                    .with_type(ResponseType::Basic)
                    .with_url(request.url.to_string()),
                None => Response::new(404, "Not Found", "").with_type(ResponseType::Basic),
            })
        }
    }

    pub fn app_config() -> AppConfig {
        AppConfig { origin: ORIGIN.into(), ..Default::default() }
    }

    /// Runtime over an in-memory store and a network serving the default app shell.
    pub async fn test_runtime(network: std::sync::Arc<StubNetwork>) -> Runtime {
        let config = app_config();
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = OfflineAssetCache::new(db, network, WorkerConfig::from_app_config(&config).unwrap());
        Runtime::new(worker, RuntimeOptions::from_app_config(&config))
    }

    pub fn app_shell() -> std::sync::Arc<StubNetwork> {
        std::sync::Arc::new(StubNetwork::new(&[
            ("/", "<html>home</html>"),
            ("/index.html", "<html>home</html>"),
            ("/offline.html", "<html>offline</html>"),
        ]))
    }

    /// Decode the JSON text of the first result item.
    pub fn output<T: serde::de::DeserializeOwned>(result: &rmcp::model::CallToolResult) -> T {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
