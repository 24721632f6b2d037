//! Test doubles shared by the worker and runtime tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use shellcache_core::{AppConfig, CacheDb, Error, ResourceRequest, Response, ResponseType};
use url::Url;

use crate::fetch::Fetcher;
use crate::worker::{OfflineAssetCache, WorkerConfig};

pub const ORIGIN: &str = "https://app.test";

#[derive(Clone)]
struct Route {
    body: Vec<u8>,
    content_type: &'static str,
    response_type: ResponseType,
}

/// In-memory network that can be switched off and counts every request.
pub struct StubFetcher {
    routes: Mutex<HashMap<String, Route>>,
    online: AtomicBool,
    rejected: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            rejected: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Serves the default manifest: `/`, `/index.html`, `/offline.html`.
    pub fn with_app_shell() -> Arc<Self> {
        let stub = Self::new();
        stub.serve("/", "<html>home</html>");
        stub.serve("/index.html", "<html>home</html>");
        stub.serve("/offline.html", "<html>offline</html>");
        stub
    }

    pub fn serve(&self, path: &str, body: &str) {
        self.insert(path, body, ResponseType::Basic);
    }

    /// Serve `path` as if it redirected to another origin.
    pub fn serve_cross_origin(&self, path: &str, body: &str) {
        self.insert(path, body, ResponseType::Cors);
    }

    fn insert(&self, path: &str, body: &str, response_type: ResponseType) {
        let content_type = if path.ends_with(".html") || path.ends_with('/') { "text/html" } else { "text/plain" };
        self.routes.lock().unwrap().insert(
            url(path).to_string(),
            Route { body: body.as_bytes().to_vec(), content_type, response_type },
        );
    }

    /// Fail requests for `path` with a non-network error while online.
    pub fn reject(&self, path: &str) {
        self.rejected.lock().unwrap().insert(url(path).to_string());
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        let target = url(path).to_string();
        self.calls.lock().unwrap().iter().filter(|u| **u == target).count()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &ResourceRequest) -> Result<Response, Error> {
        self.calls.lock().unwrap().push(request.url.to_string());

        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network("stub network is offline".into()));
        }
        if self.rejected.lock().unwrap().contains(request.url.as_str()) {
            return Err(Error::InvalidUrl(format!("rejected: {}", request.url)));
        }

        let route = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        Ok(match route {
            Some(route) => Response::new(200, "OK", route.body)
                .with_header("Content-Type", route.content_type)
                .with_type(route.response_type)
                .with_url(request.url.to_string()),
            None => Response::new(404, "Not Found", "not found")
                .with_header("Content-Type", "text/plain")
                .with_type(ResponseType::Basic)
                .with_url(request.url.to_string()),
        })
    }
}

/// Resolve a path against the test origin.
pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Default configuration pointed at the test origin.
pub fn app_config() -> AppConfig {
    AppConfig { origin: ORIGIN.into(), ..Default::default() }
}

/// Worker over a fresh in-memory store.
pub async fn test_worker(fetcher: Arc<StubFetcher>, config: AppConfig) -> OfflineAssetCache {
    let db = CacheDb::open_in_memory()
        .await
        .unwrap()
        .with_quota(config.store_quota_bytes);
    OfflineAssetCache::new(db, fetcher, WorkerConfig::from_app_config(&config).unwrap())
}
