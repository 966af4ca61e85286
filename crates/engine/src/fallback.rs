//! Last-resort answers when neither network nor cache could respond.

use swcache_core::cache::MatchOptions;
use swcache_core::{CacheRequest, CacheResponse, Destination};

use crate::engine::{Engine, trace_event};
use crate::fetch::resolve_path;

impl Engine {
    /// Resolve the offline answer for a failed request. Never touches the network.
    ///
    /// Navigations get the cached fallback page from any partition, images get
    /// the placeholder SVG, everything else an empty 503.
    pub async fn offline_fallback(&self, request: &CacheRequest) -> CacheResponse {
        if request.is_navigation()
            && let Some(path) = &self.inner.snapshot.offline_fallback
        {
            if let Some(page) = self.cached_fallback(request, path).await {
                trace_event!(self, url = %request.url, fallback = %path, "offline:page");
                return page;
            }
            trace_event!(self, url = %request.url, fallback = %path, "offline:page-missing");
        }

        if request.destination == Destination::Image {
            trace_event!(self, url = %request.url, "offline:image");
            return CacheResponse::svg(&self.inner.snapshot.offline_image);
        }

        CacheResponse::offline()
    }

    async fn cached_fallback(&self, request: &CacheRequest, path: &str) -> Option<CacheResponse> {
        let url = match resolve_path(&request.url, path) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(fallback = %path, error = %e, "unusable offline fallback path");
                return None;
            }
        };

        match self.inner.store.lookup_any(&CacheRequest::get(url), MatchOptions::ignoring_vary()).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(fallback = %path, error = %e, "offline fallback lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FetchEvent;
    use crate::testing::{Harness, html, snapshot, url};
    use http::StatusCode;
    use swcache_core::{CacheStorage, DEFAULT_OFFLINE_SVG};

    async fn offline_harness(fallback: Option<&str>, precache: &[&str]) -> Harness {
        let mut config = snapshot("v1");
        config.offline_fallback = fallback.map(str::to_string);
        config.precache = precache.iter().map(|p| p.to_string()).collect();
        let harness = Harness::new(config).await;
        harness.network.serve("/offline", html("<h1>offline</h1>"));
        harness.start().await;
        harness.network.set_offline(true);
        harness
    }

    #[tokio::test]
    async fn test_navigation_gets_cached_fallback_page() {
        let harness = offline_harness(Some("/offline"), &["/offline"]).await;

        let event = FetchEvent::new(CacheRequest::navigate(url("/blog/post")));
        let response = harness.engine.handle_fetch(&event).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "<h1>offline</h1>");
    }

    #[tokio::test]
    async fn test_fallback_found_in_runtime_partition() {
        let harness = offline_harness(Some("/offline"), &[]).await;
        let request = CacheRequest::get(url("/offline"));
        harness.store.put("pages-v1", &request, &html("runtime copy")).await.unwrap();

        let response = harness.engine.offline_fallback(&CacheRequest::navigate(url("/x"))).await;
        assert_eq!(response.text(), "runtime copy");
    }

    #[tokio::test]
    async fn test_missing_fallback_page_is_503() {
        let harness = offline_harness(Some("/offline"), &[]).await;

        let response = harness.engine.offline_fallback(&CacheRequest::navigate(url("/x"))).await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_image_gets_placeholder_svg() {
        let harness = offline_harness(Some("/offline"), &["/offline"]).await;

        let request = CacheRequest::get(url("/photo.jpg")).with_destination(Destination::Image);
        let response = harness.engine.handle_fetch(&FetchEvent::new(request)).await.unwrap();
        assert_eq!(response.content_type(), Some("image/svg+xml"));
        assert_eq!(response.text(), DEFAULT_OFFLINE_SVG);
    }

    #[tokio::test]
    async fn test_custom_offline_image() {
        let mut config = snapshot("v1");
        config.offline_image = "<svg id=\"custom\"/>".into();
        let harness = Harness::activated(config).await;

        let request = CacheRequest::get(url("/a.png")).with_destination(Destination::Image);
        assert_eq!(harness.engine.offline_fallback(&request).await.text(), "<svg id=\"custom\"/>");
    }

    #[tokio::test]
    async fn test_other_requests_get_empty_503() {
        let harness = offline_harness(Some("/offline"), &["/offline"]).await;

        let event = FetchEvent::new(CacheRequest::get(url("/data.json")));
        let response = harness.engine.handle_fetch(&event).await.unwrap();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_never_hits_network() {
        let harness = offline_harness(Some("/offline"), &["/offline"]).await;
        let before = harness.network.total_calls();

        harness.engine.offline_fallback(&CacheRequest::navigate(url("/x"))).await;
        harness.engine.offline_fallback(&CacheRequest::get(url("/y.png")).with_destination(Destination::Image)).await;
        assert_eq!(harness.network.total_calls(), before);
    }
}
