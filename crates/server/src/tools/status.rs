//! sw_status tool implementation.
//!
//! Reports the active version, lifecycle state and what each partition holds.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::cache::is_current;
use swcache_core::{CacheStorage, Strategy};
use swcache_engine::Engine;

use crate::error::json_result;

/// Summary of one cache partition.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PartitionSummary {
    pub name: String,
    pub entries: usize,
    /// Whether the partition belongs to the active version.
    pub current: bool,
}

/// Output structure for the sw_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwStatusOutput {
    pub version: String,
    pub state: String,
    pub origin: String,
    pub enabled: bool,
    pub default_strategy: Strategy,
    pub rules: usize,
    pub precache: Vec<String>,
    pub offline_fallback: Option<String>,
    pub partitions: Vec<PartitionSummary>,
}

/// Implementation of the sw_status tool.
pub async fn status_impl(engine: &Engine) -> Result<CallToolResult, McpError> {
    let store = engine.store();
    let mut partitions = Vec::new();
    for name in store.keys().await? {
        let entries = store.entries(&name).await?.len();
        let current = is_current(&name, engine.version());
        partitions.push(PartitionSummary { name, entries, current });
    }

    let snapshot = engine.snapshot();
    let output = SwStatusOutput {
        version: engine.version().to_string(),
        state: engine.state().await.to_string(),
        origin: engine.origin().to_string(),
        enabled: snapshot.enabled,
        default_strategy: snapshot.default_strategy,
        rules: snapshot.rules.len(),
        precache: snapshot.precache.clone(),
        offline_fallback: snapshot.offline_fallback.clone(),
        partitions,
    };

    tracing::debug!(version = %output.version, partitions = output.partitions.len(), "status reported");
    json_result(&output)
}
