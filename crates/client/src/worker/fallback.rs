//! Offline fallbacks for cache-first routes.

use shellcache_core::{Destination, ResourceRequest, Response};

use super::{OfflineAssetCache, Served, ServedFrom};

/// Body of the synthesized offline response.
pub const OFFLINE_BODY: &str = "Offline";

impl OfflineAssetCache {
    /// Designated offline document for navigations, placeholder for images,
    /// synthesized 503 for everything else or when the designated resource is
    /// not stored.
    pub(crate) async fn offline_fallback(&self, request: &ResourceRequest) -> Served {
        let designated = match request.destination {
            Destination::Document => self.config.offline_document.as_deref(),
            Destination::Image => self.config.placeholder_image.as_deref(),
            _ => None,
        };

        if let Some(path) = designated {
            match self.stored_fallback(path).await {
                Some(response) => return Served::new(response, ServedFrom::Fallback),
                None => tracing::warn!(path, "designated fallback is not stored"),
            }
        }

        Served::new(Response::service_unavailable(OFFLINE_BODY), ServedFrom::Fallback)
    }

    async fn stored_fallback(&self, path: &str) -> Option<Response> {
        let url = self.resolve(path).ok()?;
        match self.db.match_any("GET", &url).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(path, error = %e, "fallback lookup failed");
                None
            }
        }
    }
}
