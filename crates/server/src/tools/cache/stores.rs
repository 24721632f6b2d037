//! cache_stores tool implementation.
//!
//! Lists every named store with its entries.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::Runtime;
use shellcache_core::EntryKey;

use crate::tools::json_result;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreSummary {
    pub name: String,
    /// Total body bytes held by the store.
    pub size: u64,
    /// Whether activation would keep this store.
    pub retained: bool,
    pub entries: Vec<EntryKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStoresOutput {
    /// Stores in creation order.
    pub stores: Vec<StoreSummary>,
}

pub async fn stores_impl(runtime: &Runtime) -> Result<CallToolResult, McpError> {
    let worker = runtime.worker();
    let db = worker.db();

    let mut stores = Vec::new();
    for name in db.store_names().await? {
        stores.push(StoreSummary {
            size: db.store_size(&name).await?,
            retained: worker.layout().is_retained(&name),
            entries: db.entry_keys(&name).await?,
            name,
        });
    }

    json_result(&CacheStoresOutput { stores })
}
