//! Cache-first and network-first answering.

use shellcache_core::{Error, ResourceRequest};

use super::{OfflineAssetCache, Served, ServedFrom};

impl OfflineAssetCache {
    /// Stored copy if present; otherwise the network, storing a same-origin
    /// 200 in the runtime store; otherwise, when the network did not answer,
    /// an offline fallback.
    pub(crate) async fn cache_first(&self, request: &ResourceRequest) -> Result<Served, Error> {
        match self.db.match_any("GET", &request.url).await {
            Ok(Some(response)) => {
                tracing::debug!(url = %request.url, "cache hit");
                return Ok(Served::new(response, ServedFrom::Cache));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(url = %request.url, error = %e, "store lookup failed, trying network"),
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_storable() {
                    self.store_copy(&self.config.layout.runtime, request, &response).await;
                }
                Ok(Served::new(response, ServedFrom::Network))
            }
            Err(e) if e.is_network_failure() => {
                tracing::warn!(url = %request.url, error = %e, "network unavailable, serving fallback");
                Ok(self.offline_fallback(request).await)
            }
            Err(e) => Err(e),
        }
    }

    /// Live network response, refreshing the runtime store; the stored copy
    /// only when the network did not answer.
    pub(crate) async fn network_first(&self, request: &ResourceRequest) -> Result<Served, Error> {
        let err = match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_storable() {
                    self.store_copy(&self.config.layout.runtime, request, &response).await;
                }
                return Ok(Served::new(response, ServedFrom::Network));
            }
            Err(e) if e.is_network_failure() => e,
            Err(e) => return Err(e),
        };

        match self.db.match_any("GET", &request.url).await {
            Ok(Some(response)) => {
                tracing::debug!(url = %request.url, error = %err, "network failed, serving stored copy");
                Ok(Served::new(response, ServedFrom::Cache))
            }
            Ok(None) => Err(err),
            Err(lookup) => {
                tracing::warn!(url = %request.url, error = %lookup, "store lookup failed");
                Err(err)
            }
        }
    }
}
