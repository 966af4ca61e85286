//! The engine instance and its fetch entry point.

use std::sync::Arc;

use swcache_core::cache::{CORE_PARTITION, partition_name};
use swcache_core::{CacheRequest, CacheResponse, CacheStorage, ConfigSnapshot, Error};
use tokio::sync::RwLock;
use url::Url;

use crate::clients::ClientHost;
use crate::fetch::Network;
use crate::lifecycle::LifecycleState;
use crate::pending::PendingWork;
use crate::router::{Route, Router};

/// Emit a diagnostic event when the snapshot asked for verbose output.
///
/// The check happens at runtime against a flag resolved once at startup.
macro_rules! trace_event {
    ($engine:expr, $($arg:tt)+) => {
        if $engine.verbose() {
            tracing::debug!($($arg)+);
        }
    };
}
pub(crate) use trace_event;

/// An intercepted request together with the work it leaves behind.
#[derive(Debug)]
pub struct FetchEvent {
    pub request: CacheRequest,
    pending: PendingWork,
}

impl FetchEvent {
    pub fn new(request: CacheRequest) -> Self {
        Self { request, pending: PendingWork::new() }
    }

    /// Background work spawned while answering this event.
    pub fn pending(&self) -> &PendingWork {
        &self.pending
    }

    /// Wait until every background write or revalidation has landed.
    pub async fn settled(&self) {
        self.pending.settled().await;
    }
}

pub(crate) struct Inner {
    pub(crate) snapshot: ConfigSnapshot,
    pub(crate) version: String,
    pub(crate) origin: Url,
    pub(crate) verbose: bool,
    pub(crate) router: Router,
    pub(crate) store: Arc<dyn CacheStorage>,
    pub(crate) network: Arc<dyn Network>,
    pub(crate) clients: Arc<dyn ClientHost>,
    pub(crate) state: RwLock<LifecycleState>,
}

/// One running copy of the caching agent.
///
/// Cheap to clone; clones share the same instance.
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<Inner>,
}

impl Engine {
    /// Build an instance from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if a rule pattern does not compile.
    pub fn new(
        snapshot: ConfigSnapshot, origin: Url, store: Arc<dyn CacheStorage>, network: Arc<dyn Network>,
        clients: Arc<dyn ClientHost>,
    ) -> Result<Self, Error> {
        let router = Router::new(&snapshot)?;
        let version = snapshot.resolved_version();
        let verbose = snapshot.debug;

        tracing::info!(version = %version, rules = snapshot.rules.len(), "engine created");

        Ok(Self {
            inner: Arc::new(Inner {
                snapshot,
                version,
                origin,
                verbose,
                router,
                store,
                network,
                clients,
                state: RwLock::new(LifecycleState::Parsed),
            }),
        })
    }

    /// Active version tag shared by every partition this instance writes.
    pub fn version(&self) -> &str {
        &self.inner.version
    }

    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.inner.snapshot
    }

    pub fn origin(&self) -> &Url {
        &self.inner.origin
    }

    pub fn store(&self) -> &Arc<dyn CacheStorage> {
        &self.inner.store
    }

    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    pub(crate) fn verbose(&self) -> bool {
        self.inner.verbose
    }

    /// `<prefix>-<version>`.
    pub fn partition(&self, prefix: &str) -> String {
        partition_name(prefix, &self.inner.version)
    }

    pub fn core_partition(&self) -> String {
        self.partition(CORE_PARTITION)
    }

    /// Answer an intercepted request.
    ///
    /// Returns `None` when the request is not intercepted and should be
    /// handled natively. Never fails: the worst case is an empty 503.
    pub async fn handle_fetch(&self, event: &FetchEvent) -> Option<CacheResponse> {
        let request = &event.request;
        trace_event!(self, method = %request.method, url = %request.url, mode = ?request.mode, "REQUEST");

        let state = self.state().await;
        if state != LifecycleState::Activated {
            trace_event!(self, url = %request.url, state = %state, "fetch:not-active");
            return None;
        }

        match self.inner.router.route(request) {
            Route::Bypass(reason) => {
                trace_event!(self, url = %request.url, reason = ?reason, "fetch:ignored");
                None
            }
            Route::Media => {
                trace_event!(self, url = %request.url, destination = ?request.destination, "fetch:media");
                Some(self.fetch_media(request).await)
            }
            Route::Cached { strategy, cache_name, rule } => {
                trace_event!(
                    self,
                    url = %request.url,
                    strategy = %strategy,
                    cache = %cache_name,
                    rule = ?rule,
                    "fetch:route"
                );
                Some(self.run_strategy(strategy, request, &cache_name, event.pending()).await)
            }
        }
    }

    /// Range-driven media is never cached or replayed.
    async fn fetch_media(&self, request: &CacheRequest) -> CacheResponse {
        match self.inner.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                trace_event!(self, url = %request.url, error = %e, "fetch:media-offline");
                CacheResponse::offline()
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("version", &self.inner.version)
            .field("origin", &self.inner.origin.as_str())
            .finish_non_exhaustive()
    }
}
