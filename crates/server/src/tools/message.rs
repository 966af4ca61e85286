//! sw_message tool implementation.
//!
//! Posts a structured message to the engine with a dedicated reply port.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_engine::{Engine, MessageEvent};
use tokio::sync::mpsc;

use crate::error::{ToolError, json_result};

/// Input parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message object, e.g. `{"type": "GET_CACHED_PAGES"}`.
    pub message: serde_json::Value,
}

/// Output structure for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageOutput {
    /// Whether the engine recognized the message.
    pub handled: bool,
    /// The reply posted to the port, if any.
    pub reply: Option<serde_json::Value>,
}

/// Implementation of the sw_message tool.
pub async fn message_impl(engine: &Engine, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let (port, mut replies) = mpsc::unbounded_channel();
    let event = MessageEvent::new(params.message).with_port(port);

    let handled = engine.handle_message(&event).await?.is_some();
    drop(event);

    let reply = replies
        .recv()
        .await
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| ToolError::OutputFailed(e.to_string()))?;

    json_result(&SwMessageOutput { handled, reply })
}
