//! The four resolution strategies.
//!
//! Every strategy reads the target partition before the precache partition,
//! and only writes back 2xx responses for paths that are not precached, so a
//! precached asset lives in exactly one partition.

use std::sync::Arc;

use swcache_core::cache::MatchOptions;
use swcache_core::{CacheRequest, CacheResponse, CacheStorage, Strategy};

use crate::engine::{Engine, trace_event};
use crate::fetch::Network;
use crate::pending::PendingWork;

impl Engine {
    /// Resolve a routed request. Always produces a response.
    pub(crate) async fn run_strategy(
        &self, strategy: Strategy, request: &CacheRequest, cache_name: &str, pending: &PendingWork,
    ) -> CacheResponse {
        let partition = self.partition(cache_name);
        match strategy {
            Strategy::CacheFirst => self.cache_first(request, &partition, pending).await,
            Strategy::NetworkFirst => self.network_first(request, &partition, pending).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request, &partition, pending).await,
            // destruct never reaches routing; treat a stray one as uncached
            Strategy::NetworkOnly | Strategy::Destruct => self.network_only(request).await,
        }
    }

    async fn cache_first(&self, request: &CacheRequest, partition: &str, pending: &PendingWork) -> CacheResponse {
        if let Some(cached) = self.match_cached(request, partition).await {
            trace_event!(self, url = %request.url, cache = partition, "cacheFirst:hit");
            return cached;
        }

        match self.inner.network.fetch(request).await {
            Ok(response) => {
                trace_event!(self, url = %request.url, status = response.status.as_u16(), "cacheFirst:network");
                self.write_back(request, &response, partition, pending).await;
                response
            }
            Err(e) => {
                trace_event!(self, url = %request.url, error = %e, "cacheFirst:offline");
                self.offline_fallback(request).await
            }
        }
    }

    async fn network_first(&self, request: &CacheRequest, partition: &str, pending: &PendingWork) -> CacheResponse {
        match self.inner.network.fetch(request).await {
            Ok(response) => {
                trace_event!(self, url = %request.url, status = response.status.as_u16(), "networkFirst:network");
                self.write_back(request, &response, partition, pending).await;
                response
            }
            Err(e) => {
                trace_event!(self, url = %request.url, error = %e, "networkFirst:offline");
                match self.match_cached(request, partition).await {
                    Some(cached) => cached,
                    None => self.offline_fallback(request).await,
                }
            }
        }
    }

    async fn stale_while_revalidate(
        &self, request: &CacheRequest, partition: &str, pending: &PendingWork,
    ) -> CacheResponse {
        if let Some(cached) = self.match_cached(request, partition).await {
            trace_event!(self, url = %request.url, cache = partition, "staleWhileRevalidate:hit");
            self.revalidate(request, partition, pending).await;
            return cached;
        }

        match self.inner.network.fetch(request).await {
            Ok(response) => {
                trace_event!(self, url = %request.url, status = response.status.as_u16(), "staleWhileRevalidate:network");
                self.write_back(request, &response, partition, pending).await;
                response
            }
            Err(e) => {
                trace_event!(self, url = %request.url, error = %e, "staleWhileRevalidate:offline");
                self.offline_fallback(request).await
            }
        }
    }

    async fn network_only(&self, request: &CacheRequest) -> CacheResponse {
        match self.inner.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                trace_event!(self, url = %request.url, error = %e, "networkOnly:offline");
                self.offline_fallback(request).await
            }
        }
    }

    /// Target partition first, then the precache partition.
    ///
    /// A read failure is logged and treated as a miss.
    pub(crate) async fn match_cached(&self, request: &CacheRequest, partition: &str) -> Option<CacheResponse> {
        let core = self.core_partition();
        let mut order = vec![partition];
        if partition != core {
            order.push(core.as_str());
        }

        for name in order {
            match self.inner.store.lookup(name, request, MatchOptions::ignoring_vary()).await {
                Ok(Some(response)) => return Some(response),
                Ok(None) => {}
                Err(e) => tracing::warn!(partition = %name, url = %request.url, error = %e, "cache read failed"),
            }
        }
        None
    }

    fn should_store(&self, request: &CacheRequest, response: &CacheResponse) -> bool {
        response.is_ok() && !self.inner.snapshot.is_precached(request.path())
    }

    /// Store a copy of the response in the background.
    async fn write_back(&self, request: &CacheRequest, response: &CacheResponse, partition: &str, pending: &PendingWork) {
        if !self.should_store(request, response) {
            return;
        }

        let store = Arc::clone(&self.inner.store);
        let partition = partition.to_string();
        let request = request.clone();
        let response = response.clone();
        pending.spawn(async move { store_copy(store.as_ref(), &partition, &request, &response).await }).await;
    }

    /// Refresh a cached entry without holding up the caller.
    async fn revalidate(&self, request: &CacheRequest, partition: &str, pending: &PendingWork) {
        let network = Arc::clone(&self.inner.network);
        let store = Arc::clone(&self.inner.store);
        let partition = partition.to_string();
        let request = request.clone();
        let cacheable_path = !self.inner.snapshot.is_precached(request.path());

        pending
            .spawn(async move { refresh(network.as_ref(), store.as_ref(), &partition, &request, cacheable_path).await })
            .await;
    }
}

async fn store_copy(store: &dyn CacheStorage, partition: &str, request: &CacheRequest, response: &CacheResponse) {
    if let Err(e) = store.put(partition, request, response).await {
        tracing::warn!(partition, url = %request.url, error = %e, "cache write failed");
    }
}

async fn refresh(
    network: &dyn Network, store: &dyn CacheStorage, partition: &str, request: &CacheRequest, cacheable_path: bool,
) {
    match network.fetch(request).await {
        Ok(response) if response.is_ok() && cacheable_path => store_copy(store, partition, request, &response).await,
        Ok(response) => {
            tracing::debug!(url = %request.url, status = response.status.as_u16(), "revalidation not stored");
        }
        Err(e) => tracing::debug!(url = %request.url, error = %e, "revalidation failed"),
    }
}
