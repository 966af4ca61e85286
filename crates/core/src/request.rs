//! Request and response model shared by the store and the engine.
//!
//! These mirror what an intercepting client hands to the engine: a URL, a
//! method, the request mode (navigation or not) and its destination.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, VARY};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// How the request was initiated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    #[default]
    SameOrigin,
    NoCors,
    Cors,
}

/// What the requested resource will be used for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Image,
    Audio,
    Video,
    Script,
    Style,
    Font,
    Manifest,
    #[default]
    Empty,
}

impl Destination {
    /// Audio and video are range-request driven and never cached.
    pub fn is_media(self) -> bool {
        matches!(self, Destination::Audio | Destination::Video)
    }
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct CacheRequest {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
    pub destination: Destination,
    pub headers: HeaderMap,
}

impl CacheRequest {
    /// A plain `GET` for the given URL. The fragment is dropped.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// A request with the given method. The fragment is dropped.
    pub fn new(method: Method, mut url: Url) -> Self {
        url.set_fragment(None);
        Self { method, url, mode: RequestMode::default(), destination: Destination::default(), headers: HeaderMap::new() }
    }

    /// Parse an absolute URL into a `GET` request.
    pub fn parse(url: &str) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::get(url))
    }

    /// A top-level navigation to the given URL.
    pub fn navigate(url: Url) -> Self {
        Self { mode: RequestMode::Navigate, destination: Destination::Document, ..Self::get(url) }
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    /// URL path, e.g. `/app.css`.
    pub fn path(&self) -> &str {
        self.url.path()
    }
}

/// A response, either from the network or replayed from a partition.
///
/// Cloning is cheap: the body is reference counted.
#[derive(Debug, Clone)]
pub struct CacheResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CacheResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into() }
    }

    /// 200 response with a content type.
    pub fn ok(content_type: &str, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        Self::new(StatusCode::OK, headers, body)
    }

    /// Empty 503 used when nothing else can answer.
    pub fn offline() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, HeaderMap::new(), Bytes::new())
    }

    /// Inline SVG placeholder.
    pub fn svg(markup: &str) -> Self {
        Self::ok("image/svg+xml", Bytes::copy_from_slice(markup.as_bytes()))
    }

    /// True for 2xx statuses.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn is_html(&self) -> bool {
        self.content_type().is_some_and(|ct| ct.contains("text/html"))
    }

    /// Header names listed in `Vary`, lowercased.
    pub fn vary(&self) -> Vec<String> {
        self.headers
            .get_all(VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Serialize a header map to `[name, value]` pairs.
pub fn headers_to_json(headers: &HeaderMap) -> Result<String, Error> {
    let pairs: Vec<(&str, String)> = headers
        .iter()
        .map(|(name, value)| (name.as_str(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect();
    Ok(serde_json::to_string(&pairs)?)
}

/// Inverse of [`headers_to_json`]. Pairs that are no longer valid headers are skipped.
pub fn headers_from_json(json: &str) -> Result<HeaderMap, Error> {
    let pairs: Vec<(String, String)> = serde_json::from_str(json)?;
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            headers.append(name, value);
        }
    }
    Ok(headers)
}
