//! sw_fetch tool implementation.
//!
//! Routes a request through the engine the way an intercepted page request
//! would be, falling back to a native fetch when the engine declines it.

use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};
use http::Method;
use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{CacheRequest, Destination, RequestMode};
use swcache_engine::fetch::{canonicalize, resolve_path};
use swcache_engine::{Engine, FetchEvent, Network};
use url::Url;

use crate::error::{ToolError, json_result};

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path such as `/about` resolved against the origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Request mode; `navigate` marks a page navigation.
    #[serde(default)]
    pub mode: Option<RequestMode>,

    /// Request destination, e.g. `image` or `video`.
    #[serde(default)]
    pub destination: Option<Destination>,

    /// Extra request headers as name/value pairs.
    #[serde(default)]
    pub headers: Vec<(String, String)>,

    /// Wait for background cache writes before returning.
    #[serde(default)]
    pub wait: bool,
}

/// Where the response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    /// Answered by the engine (cache, network via a strategy, or fallback).
    Engine,
    /// Not intercepted; fetched natively.
    Passthrough,
}

/// Output structure for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    pub url: String,
    pub status: u16,
    pub source: ResponseSource,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body as text, when it is valid UTF-8.
    pub body: Option<String>,
    pub bytes: usize,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(
    engine: &Engine, network: &Arc<dyn Network>, params: SwFetchParams,
) -> Result<CallToolResult, McpError> {
    let request = build_request(engine.origin(), &params)?;
    let event = FetchEvent::new(request);

    let (response, source) = match engine.handle_fetch(&event).await {
        Some(response) => (response, ResponseSource::Engine),
        None => (network.fetch(&event.request).await?, ResponseSource::Passthrough),
    };

    let url = event.request.url.to_string();
    if params.wait {
        event.settled().await;
    } else {
        tokio::spawn(async move { event.settled().await });
    }

    let output = SwFetchOutput {
        url,
        status: response.status.as_u16(),
        source,
        content_type: response.content_type().map(str::to_string),
        headers: response
            .headers
            .iter()
            .map(|(name, value)| (name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect(),
        body: std::str::from_utf8(&response.body).ok().map(str::to_string),
        bytes: response.body.len(),
    };

    json_result(&output)
}

fn build_request(origin: &Url, params: &SwFetchParams) -> Result<CacheRequest, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }

    let url = if params.url.starts_with('/') {
        resolve_path(origin, &params.url).map_err(swcache_core::Error::from)?
    } else {
        canonicalize(&params.url).map_err(swcache_core::Error::from)?
    };

    let method = match &params.method {
        Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
            .map_err(|_| ToolError::InvalidInput(format!("invalid method: {m}")))?,
        None => Method::GET,
    };

    let mut request = CacheRequest::new(method, url);
    if let Some(mode) = params.mode {
        request = request.with_mode(mode);
    }
    if let Some(destination) = params.destination {
        request = request.with_destination(destination);
    }
    if request.is_navigation() && params.destination.is_none() {
        request = request.with_destination(Destination::Document);
    }

    for (name, value) in &params.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ToolError::InvalidInput(format!("invalid header name: {name}")))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| ToolError::InvalidInput(format!("invalid header value: {value}")))?;
        request = request.with_header(name, value);
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{StaticNetwork, output, started_engine};
    use swcache_core::{CacheStorage, ConfigSnapshot};

    fn origin() -> Url {
        Url::parse("https://example.com").unwrap()
    }

    #[test]
    fn test_build_request_from_path() {
        let params = SwFetchParams { url: "/about".into(), mode: Some(RequestMode::Navigate), ..Default::default() };
        let request = build_request(&origin(), &params).unwrap();
        assert_eq!(request.url.as_str(), "https://example.com/about");
        assert!(request.is_navigation());
        assert_eq!(request.destination, Destination::Document);
    }

    #[test]
    fn test_build_request_rejects_bad_input() {
        let empty = SwFetchParams { url: " ".into(), ..Default::default() };
        assert!(build_request(&origin(), &empty).is_err());

        let method = SwFetchParams { url: "/x".into(), method: Some("GE T".into()), ..Default::default() };
        assert!(build_request(&origin(), &method).is_err());

        let scheme = SwFetchParams { url: "ftp://example.com/x".into(), ..Default::default() };
        assert!(build_request(&origin(), &scheme).is_err());
    }

    #[tokio::test]
    async fn test_fetch_through_engine_caches_page() {
        let network = StaticNetwork::new(&[("/about", "text/html", "about")]);
        let (engine, store) = started_engine(ConfigSnapshot { version: Some("v1".into()), ..Default::default() }, &network).await;

        let params = SwFetchParams { url: "/about".into(), mode: Some(RequestMode::Navigate), wait: true, ..Default::default() };
        let result = fetch_impl(&engine, &network, params).await.unwrap();
        let out: SwFetchOutput = output(&result);

        assert_eq!(out.source, ResponseSource::Engine);
        assert_eq!(out.status, 200);
        assert_eq!(out.body.as_deref(), Some("about"));
        assert!(store.has("pages-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_post_is_passthrough() {
        let network = StaticNetwork::new(&[("/form", "text/plain", "posted")]);
        let (engine, store) = started_engine(ConfigSnapshot { version: Some("v1".into()), ..Default::default() }, &network).await;

        let params = SwFetchParams { url: "/form".into(), method: Some("post".into()), wait: true, ..Default::default() };
        let out: SwFetchOutput = output(&fetch_impl(&engine, &network, params).await.unwrap());

        assert_eq!(out.source, ResponseSource::Passthrough);
        assert_eq!(out.body.as_deref(), Some("posted"));
        assert_eq!(store.keys().await.unwrap(), vec!["core-v1"]);
    }
}
