//! In-process doubles for engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use swcache_core::{CacheDb, CacheRequest, CacheResponse, CacheStorage, CachedEntry, ConfigSnapshot, Error, MatchOptions};
use tokio::sync::Notify;
use url::Url;

use crate::clients::LocalClients;
use crate::engine::Engine;
use crate::fetch::Network;

pub(crate) const ORIGIN: &str = "https://example.com";

/// Network that answers from a fixed table keyed by URL.
#[derive(Default)]
pub(crate) struct ScriptedNetwork {
    routes: Mutex<HashMap<String, CacheResponse>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `response` for `path` under [`ORIGIN`].
    pub(crate) fn serve(&self, path: &str, response: CacheResponse) {
        self.routes.lock().unwrap().insert(url(path).to_string(), response);
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Hold fetches of `path` until the returned handle is notified.
    pub(crate) fn hold(&self, path: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(url(path).to_string(), gate.clone());
        gate
    }

    /// Number of fetches issued for `path`.
    pub(crate) fn calls_to(&self, path: &str) -> usize {
        let target = url(path).to_string();
        self.calls.lock().unwrap().iter().filter(|c| **c == target).count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &CacheRequest) -> Result<CacheResponse, Error> {
        let key = request.url.to_string();
        self.calls.lock().unwrap().push(key.clone());

        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {key}")));
        }

        let response = self.routes.lock().unwrap().get(&key).cloned();
        Ok(response.unwrap_or_else(|| CacheResponse::new(http::StatusCode::NOT_FOUND, Default::default(), "")))
    }
}

pub(crate) fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub(crate) fn html(body: &str) -> CacheResponse {
    CacheResponse::ok("text/html; charset=utf-8", body.to_string())
}

/// Store that fails reads or writes on demand and otherwise defers to SQLite.
pub(crate) struct FailingStore {
    inner: CacheDb,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FailingStore {
    pub(crate) async fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: CacheDb::open_in_memory().await.unwrap(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        })
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn read(&self) -> Result<(), Error> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::StoreRead("boom".into()));
        }
        Ok(())
    }

    fn write(&self) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::StoreWrite("boom".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for FailingStore {
    async fn open(&self, partition: &str) -> Result<(), Error> {
        self.write()?;
        self.inner.open(partition).await
    }

    async fn has(&self, partition: &str) -> Result<bool, Error> {
        self.read()?;
        self.inner.has(partition).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.read()?;
        self.inner.keys().await
    }

    async fn delete(&self, partition: &str) -> Result<bool, Error> {
        self.write()?;
        self.inner.delete(partition).await
    }

    async fn put(&self, partition: &str, request: &CacheRequest, response: &CacheResponse) -> Result<(), Error> {
        self.write()?;
        self.inner.put(partition, request, response).await
    }

    async fn put_all(&self, partition: &str, entries: &[CachedEntry]) -> Result<(), Error> {
        self.write()?;
        self.inner.put_all(partition, entries).await
    }

    async fn lookup(
        &self, partition: &str, request: &CacheRequest, options: MatchOptions,
    ) -> Result<Option<CacheResponse>, Error> {
        self.read()?;
        self.inner.lookup(partition, request, options).await
    }

    async fn lookup_any(&self, request: &CacheRequest, options: MatchOptions) -> Result<Option<CacheResponse>, Error> {
        self.read()?;
        self.inner.lookup_any(request, options).await
    }

    async fn entries(&self, partition: &str) -> Result<Vec<CachedEntry>, Error> {
        self.read()?;
        self.inner.entries(partition).await
    }
}

/// An engine over a store, with scripted network and clients.
pub(crate) struct Harness<S = CacheDb> {
    pub engine: Engine,
    pub store: Arc<S>,
    pub network: Arc<ScriptedNetwork>,
    pub clients: Arc<LocalClients>,
}

impl Harness {
    /// Fresh in-memory store.
    pub(crate) async fn new(snapshot: ConfigSnapshot) -> Self {
        Self::with_store(snapshot, Arc::new(CacheDb::open_in_memory().await.unwrap()), ScriptedNetwork::new()).await
    }

    /// Install and activate, panicking on failure.
    pub(crate) async fn activated(snapshot: ConfigSnapshot) -> Self {
        let harness = Self::new(snapshot).await;
        harness.start().await;
        harness
    }
}

impl<S: CacheStorage + 'static> Harness<S> {
    pub(crate) async fn with_store(snapshot: ConfigSnapshot, store: Arc<S>, network: Arc<ScriptedNetwork>) -> Self {
        let clients = Arc::new(LocalClients::new());
        let engine = Engine::new(
            snapshot,
            Url::parse(ORIGIN).unwrap(),
            store.clone() as Arc<dyn CacheStorage>,
            network.clone(),
            clients.clone(),
        )
        .unwrap();
        Self { engine, store, network, clients }
    }

    pub(crate) async fn start(&self) {
        self.engine.install().await.unwrap();
        self.engine.activate().await.unwrap();
    }
}

/// An engine over a [`FailingStore`] that starts out healthy.
pub(crate) async fn failing(snapshot: ConfigSnapshot) -> Harness<FailingStore> {
    Harness::with_store(snapshot, FailingStore::new().await, ScriptedNetwork::new()).await
}

/// Versioned snapshot with no rules.
pub(crate) fn snapshot(version: &str) -> ConfigSnapshot {
    ConfigSnapshot { version: Some(version.into()), rules: vec![], ..Default::default() }
}
