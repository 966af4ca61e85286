//! swcache server entry point.
//!
//! Loads configuration, starts the caching engine and serves it as an MCP
//! server on stdio transport. Logging goes to stderr to avoid interfering
//! with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_core::{AppConfig, CacheDb, CacheStorage};
use swcache_engine::fetch::canonicalize;
use swcache_engine::{ClientHost, Engine, FetchClient, FetchConfig, LocalClients, Network};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = canonicalize(&config.origin)?;

    tracing::info!(db = %config.db_path.display(), origin = %origin, "starting swcache server on stdio transport");

    let store: Arc<dyn CacheStorage> = Arc::new(CacheDb::open(&config.db_path).await?);
    let network: Arc<dyn Network> = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let clients = Arc::new(LocalClients::new());
    clients.connect("mcp-peer", origin.clone()).await;

    let engine = Engine::new(
        config.snapshot.clone(),
        origin,
        store,
        network.clone(),
        clients.clone() as Arc<dyn ClientHost>,
    )?;

    // A failed install leaves the engine inactive; requests then pass straight through.
    match engine.install().await {
        Ok(()) => {
            if let Err(e) = engine.activate().await {
                tracing::error!(error = %e, "activation failed, serving without cache");
            }
        }
        Err(e) => tracing::error!(error = %e, "install failed, serving without cache"),
    }

    let handler = handler::SwCacheServer::new(engine, network);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
