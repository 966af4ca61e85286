//! Install and activate.
//!
//! Install fills `core-<version>` with the precache set in one transaction and
//! asks to take over immediately. Activate evicts every partition belonging to
//! another version, then claims the open clients. Destruct mode replaces both
//! with a self-unregister.

use futures_util::future::try_join_all;
use swcache_core::cache::{CachedEntry, is_current};
use swcache_core::{CacheRequest, Error};

use crate::engine::{Engine, trace_event};
use crate::fetch::resolve_path;

/// Where an engine instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Failed install, or destruct mode finished. Never intercepts again.
    Redundant,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What activation did, for callers that report it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    /// Partitions deleted because they belonged to another version.
    pub evicted: Vec<String>,
    /// Partitions left in place.
    pub kept: Vec<String>,
    /// Clients navigated away in destruct mode.
    pub reloaded: usize,
}

impl Engine {
    pub async fn state(&self) -> LifecycleState {
        *self.inner.state.read().await
    }

    async fn set_state(&self, state: LifecycleState) {
        *self.inner.state.write().await = state;
    }

    /// Move from `expected` to `next`, or fail if the instance is elsewhere.
    async fn transition(&self, expected: LifecycleState, next: LifecycleState) -> Result<(), Error> {
        let mut state = self.inner.state.write().await;
        if *state != expected {
            return Err(Error::InvalidState { expected: expected.to_string(), actual: state.to_string() });
        }
        *state = next;
        Ok(())
    }

    /// Populate the precache partition and request immediate activation.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless the instance is freshly parsed, and
    /// `Error::PrecacheFailure` if any entry cannot be fetched or stored; the
    /// instance is then redundant.
    pub async fn install(&self) -> Result<(), Error> {
        self.transition(LifecycleState::Parsed, LifecycleState::Installing).await?;
        trace_event!(self, version = %self.version(), "install");

        let snapshot = &self.inner.snapshot;
        if snapshot.enabled
            && !snapshot.is_destruct()
            && let Err(e) = self.precache().await
        {
            tracing::error!(version = %self.version(), error = %e, "install failed");
            self.set_state(LifecycleState::Redundant).await;
            return Err(e);
        }

        if let Err(e) = self.inner.clients.skip_waiting().await {
            self.set_state(LifecycleState::Redundant).await;
            return Err(e);
        }

        self.set_state(LifecycleState::Installed).await;
        tracing::info!(version = %self.version(), entries = snapshot.precache.len(), "installed");
        Ok(())
    }

    async fn precache(&self) -> Result<(), Error> {
        let paths = &self.inner.snapshot.precache;

        let fetches = paths.iter().map(|path| async move {
            let failure = |reason: String| Error::PrecacheFailure { path: path.clone(), reason };

            let url = resolve_path(&self.inner.origin, path).map_err(|e| failure(e.to_string()))?;
            let request = CacheRequest::get(url);
            let response = self.inner.network.fetch(&request).await.map_err(|e| failure(e.to_string()))?;
            if !response.is_ok() {
                return Err(failure(format!("status {}", response.status.as_u16())));
            }

            trace_event!(self, path = %path, status = response.status.as_u16(), "precache:fetched");
            Ok(CachedEntry { request, response })
        });
        let entries = try_join_all(fetches).await?;

        let core = self.core_partition();
        self.inner
            .store
            .put_all(&core, &entries)
            .await
            .map_err(|e| Error::PrecacheFailure { path: core.clone(), reason: e.to_string() })
    }

    /// Evict stale partitions and take control of open clients.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless installed, and `Error::StoreRead`
    /// if partitions cannot be enumerated or deleted; the instance then stays
    /// installed.
    pub async fn activate(&self) -> Result<Activation, Error> {
        self.transition(LifecycleState::Installed, LifecycleState::Activating).await?;
        trace_event!(self, version = %self.version(), "activate");

        let snapshot = &self.inner.snapshot;
        if !snapshot.enabled {
            self.set_state(LifecycleState::Activated).await;
            tracing::info!(version = %self.version(), "activated (disabled)");
            return Ok(Activation::default());
        }

        if snapshot.is_destruct() {
            return self.destruct().await;
        }

        match self.evict_and_claim().await {
            Ok(activation) => {
                self.set_state(LifecycleState::Activated).await;
                tracing::info!(
                    version = %self.version(),
                    evicted = activation.evicted.len(),
                    kept = activation.kept.len(),
                    "activated"
                );
                Ok(activation)
            }
            Err(e) => {
                tracing::error!(version = %self.version(), error = %e, "activation failed");
                self.set_state(LifecycleState::Installed).await;
                Err(e)
            }
        }
    }

    async fn evict_and_claim(&self) -> Result<Activation, Error> {
        let version = self.version();
        let names = self.inner.store.keys().await.map_err(as_read_failure)?;

        let mut activation = Activation::default();
        for name in names {
            if is_current(&name, version) {
                activation.kept.push(name);
                continue;
            }
            self.inner.store.delete(&name).await.map_err(as_read_failure)?;
            trace_event!(self, partition = %name, "activate:evicted");
            activation.evicted.push(name);
        }

        self.inner.clients.claim().await?;
        Ok(activation)
    }

    /// Unregister, then reload every open client at its current URL.
    async fn destruct(&self) -> Result<Activation, Error> {
        let result = async {
            let unregistered = self.inner.clients.unregister().await?;
            trace_event!(self, unregistered, "destruct:unregister");

            let clients = self.inner.clients.match_all().await?;
            for client in &clients {
                self.inner.clients.navigate(client, &client.url).await?;
            }
            Ok::<_, Error>(clients.len())
        }
        .await;

        self.set_state(LifecycleState::Redundant).await;
        let reloaded = result?;
        tracing::info!(version = %self.version(), reloaded, "destructed");
        Ok(Activation { reloaded, ..Default::default() })
    }
}

fn as_read_failure(err: Error) -> Error {
    match err {
        Error::StoreRead(_) => err,
        other => Error::StoreRead(other.to_string()),
    }
}
