//! Clients the engine controls and the registration it runs under.
//!
//! The host owns the open pages; the engine only asks it to skip waiting,
//! claim clients, navigate them, or unregister the engine.

use async_trait::async_trait;
use swcache_core::Error;
use tokio::sync::Mutex;
use url::Url;

/// An open page the engine may control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: String,
    pub url: Url,
}

/// Host capabilities over registration and open clients.
#[async_trait]
pub trait ClientHost: Send + Sync {
    /// Activate without waiting for the previous instance's clients to close.
    async fn skip_waiting(&self) -> Result<(), Error>;

    /// Become the controller of every open client.
    async fn claim(&self) -> Result<(), Error>;

    /// Every open client.
    async fn match_all(&self) -> Result<Vec<ClientInfo>, Error>;

    /// Load `url` in the given client.
    async fn navigate(&self, client: &ClientInfo, url: &Url) -> Result<(), Error>;

    /// Remove the engine's registration. Returns false if it was not registered.
    async fn unregister(&self) -> Result<bool, Error>;
}

#[derive(Debug, Default)]
struct LocalState {
    clients: Vec<ClientInfo>,
    controlled: Vec<String>,
    navigations: Vec<(String, Url)>,
    skipped_waiting: bool,
    unregistered: bool,
}

/// In-process client registry.
///
/// Used by the server, where the MCP peer is the only client, and by tests
/// to observe what the lifecycle asked of the host.
#[derive(Debug, Default)]
pub struct LocalClients {
    state: Mutex<LocalState>,
}

impl LocalClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open client.
    pub async fn connect(&self, id: impl Into<String>, url: Url) {
        self.state.lock().await.clients.push(ClientInfo { id: id.into(), url });
    }

    pub async fn is_controlled(&self, id: &str) -> bool {
        self.state.lock().await.controlled.iter().any(|c| c == id)
    }

    pub async fn navigations(&self) -> Vec<(String, Url)> {
        self.state.lock().await.navigations.clone()
    }

    pub async fn skipped_waiting(&self) -> bool {
        self.state.lock().await.skipped_waiting
    }

    pub async fn is_unregistered(&self) -> bool {
        self.state.lock().await.unregistered
    }
}

#[async_trait]
impl ClientHost for LocalClients {
    async fn skip_waiting(&self) -> Result<(), Error> {
        self.state.lock().await.skipped_waiting = true;
        Ok(())
    }

    async fn claim(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        state.controlled = state.clients.iter().map(|c| c.id.clone()).collect();
        Ok(())
    }

    async fn match_all(&self) -> Result<Vec<ClientInfo>, Error> {
        Ok(self.state.lock().await.clients.clone())
    }

    async fn navigate(&self, client: &ClientInfo, url: &Url) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if let Some(open) = state.clients.iter_mut().find(|c| c.id == client.id) {
            open.url = url.clone();
        }
        state.navigations.push((client.id.clone(), url.clone()));
        Ok(())
    }

    async fn unregister(&self) -> Result<bool, Error> {
        let mut state = self.state.lock().await;
        let was_registered = !state.unregistered;
        state.unregistered = true;
        state.controlled.clear();
        Ok(was_registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_claim_controls_open_clients() {
        let clients = LocalClients::new();
        clients.connect("a", url("https://example.com/")).await;
        clients.connect("b", url("https://example.com/blog")).await;

        assert!(!clients.is_controlled("a").await);
        clients.claim().await.unwrap();
        assert!(clients.is_controlled("a").await);
        assert!(clients.is_controlled("b").await);
    }

    #[tokio::test]
    async fn test_unregister_once() {
        let clients = LocalClients::new();
        assert!(clients.unregister().await.unwrap());
        assert!(!clients.unregister().await.unwrap());
        assert!(clients.is_unregistered().await);
    }

    #[tokio::test]
    async fn test_navigate_records() {
        let clients = LocalClients::new();
        clients.connect("a", url("https://example.com/x")).await;
        let open = clients.match_all().await.unwrap();
        clients.navigate(&open[0], &open[0].url).await.unwrap();
        assert_eq!(clients.navigations().await, vec![("a".to_string(), url("https://example.com/x"))]);
    }
}
