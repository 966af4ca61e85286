//! Shared fixtures for tool tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::CallToolResult;
use serde::de::DeserializeOwned;
use swcache_core::{CacheDb, CacheRequest, CacheResponse, ConfigSnapshot, Error};
use swcache_engine::{Engine, LocalClients, Network};
use url::Url;

/// Network answering a fixed set of paths; everything else is a 404.
pub(crate) struct StaticNetwork {
    routes: HashMap<String, CacheResponse>,
}

impl StaticNetwork {
    pub(crate) fn new(routes: &[(&str, &str, &str)]) -> Arc<dyn Network> {
        let routes = routes
            .iter()
            .map(|(path, content_type, body)| (path.to_string(), CacheResponse::ok(content_type, body.to_string())))
            .collect();
        Arc::new(Self { routes })
    }
}

#[async_trait]
impl Network for StaticNetwork {
    async fn fetch(&self, request: &CacheRequest) -> Result<CacheResponse, Error> {
        Ok(self
            .routes
            .get(request.path())
            .cloned()
            .unwrap_or_else(|| CacheResponse::new(http::StatusCode::NOT_FOUND, Default::default(), "")))
    }
}

/// An installed and activated engine over an in-memory store.
pub(crate) async fn started_engine(snapshot: ConfigSnapshot, network: &Arc<dyn Network>) -> (Engine, Arc<CacheDb>) {
    let store = Arc::new(CacheDb::open_in_memory().await.unwrap());
    let engine = Engine::new(
        snapshot,
        Url::parse("https://example.com").unwrap(),
        store.clone(),
        network.clone(),
        Arc::new(LocalClients::new()),
    )
    .unwrap();
    engine.install().await.unwrap();
    engine.activate().await.unwrap();
    (engine, store)
}

/// Decode the JSON text a tool returned.
pub(crate) fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
    assert!(!result.is_error.unwrap_or(false));
    let text = result.content.first().and_then(|c| c.as_text()).map(|t| t.text.clone()).unwrap();
    serde_json::from_str(&text).unwrap()
}
