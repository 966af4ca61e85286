//! Structured messages from controlling clients.
//!
//! The message table is a closed enum; anything it does not name is dropped
//! without a reply.

use serde::{Deserialize, Serialize};
use swcache_core::Error;
use swcache_core::cache::{is_core, is_current};
use tokio::sync::mpsc;

use crate::engine::{Engine, trace_event};

/// A recognized incoming message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "GET_CACHED_PAGES")]
    GetCachedPages,
}

/// A reply sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Reply {
    #[serde(rename = "CACHED_PAGES")]
    CachedPages { pages: Vec<String> },
}

/// Channel a reply is posted to.
pub type ReplyPort = mpsc::UnboundedSender<Reply>;

/// An incoming message with its reply channels.
#[derive(Debug, Default)]
pub struct MessageEvent {
    pub data: serde_json::Value,
    /// Dedicated reply channels; the first one is used when present.
    pub ports: Vec<ReplyPort>,
    /// The sender's own channel.
    pub source: Option<ReplyPort>,
}

impl MessageEvent {
    pub fn new(data: serde_json::Value) -> Self {
        Self { data, ..Default::default() }
    }

    pub fn with_port(mut self, port: ReplyPort) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_source(mut self, source: ReplyPort) -> Self {
        self.source = Some(source);
        self
    }

    fn reply_to(&self) -> Option<&ReplyPort> {
        self.ports.first().or(self.source.as_ref())
    }
}

impl Engine {
    /// Handle a message and post the reply, if any.
    ///
    /// Returns the reply that was sent. Unknown or malformed messages yield
    /// `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreRead` if the store cannot be enumerated.
    pub async fn handle_message(&self, event: &MessageEvent) -> Result<Option<Reply>, Error> {
        let message = match serde_json::from_value::<Message>(event.data.clone()) {
            Ok(message) => message,
            Err(e) => {
                trace_event!(self, data = %event.data, error = %e, "message:ignored");
                return Ok(None);
            }
        };

        let reply = match message {
            Message::GetCachedPages => Reply::CachedPages { pages: self.cached_pages().await? },
        };

        match event.reply_to() {
            Some(port) => {
                if port.send(reply.clone()).is_err() {
                    tracing::debug!("reply channel closed before the reply was sent");
                }
            }
            None => trace_event!(self, "message:no-reply-channel"),
        }

        Ok(Some(reply))
    }

    /// Distinct HTML paths cached under the active version.
    ///
    /// Runtime partitions come first so their pages win over precached copies;
    /// the offline fallback page is never listed.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreRead` if partitions or entries cannot be read.
    pub async fn cached_pages(&self) -> Result<Vec<String>, Error> {
        let version = self.version();
        let names = self.inner.store.keys().await.map_err(read_failure)?;

        let (core, runtime): (Vec<String>, Vec<String>) =
            names.into_iter().filter(|name| is_current(name, version)).partition(|name| is_core(name));

        let excluded = self.inner.snapshot.offline_fallback.as_deref();
        let mut pages: Vec<String> = Vec::new();

        for partition in runtime.iter().chain(core.iter()) {
            let entries = self.inner.store.entries(partition).await.map_err(read_failure)?;
            for entry in entries {
                if !entry.response.is_html() {
                    continue;
                }
                let path = entry.request.path();
                if Some(path) == excluded || pages.iter().any(|p| p == path) {
                    continue;
                }
                pages.push(path.to_string());
            }
        }

        trace_event!(self, count = pages.len(), "message:cached-pages");
        Ok(pages)
    }
}

fn read_failure(err: Error) -> Error {
    match err {
        Error::StoreRead(_) => err,
        other => Error::StoreRead(other.to_string()),
    }
}
