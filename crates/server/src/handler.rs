//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the engine.
use std::sync::Arc;

use crate::tools::fetch::{SwFetchParams, fetch_impl};
use crate::tools::message::{SwMessageParams, message_impl};
use crate::tools::status::status_impl;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use swcache_engine::{Engine, Network};

/// The main MCP server handler for swcache.
#[derive(Clone)]
pub struct SwCacheServer {
    engine: Engine,
    network: Arc<dyn Network>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SwCacheServer {
    /// Create a new server handler around a started engine.
    ///
    /// `network` serves requests the engine declines to intercept.
    pub fn new(engine: Engine, network: Arc<dyn Network>) -> Self {
        Self { engine, network, tool_router: Self::tool_router() }
    }

    /// Fetch a URL through the caching engine.
    #[tool(
        description = "Fetch a URL or origin path through the offline cache. Applies the configured routing rules and strategies; requests the engine does not intercept are fetched directly."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.engine, &self.network, params.0).await
    }

    /// Post a structured message to the engine.
    #[tool(description = "Send a message to the cache engine. Supported: {\"type\": \"GET_CACHED_PAGES\"} lists cached HTML pages.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.engine, params.0).await
    }

    /// Report engine version, lifecycle state and partitions.
    #[tool(description = "Show the active cache version, lifecycle state, configuration summary and stored partitions.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.engine).await
    }
}

impl ServerHandler for SwCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "swcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
