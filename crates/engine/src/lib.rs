//! The offline caching engine.
//!
//! This crate provides the request router, the caching strategies, the
//! install/activate lifecycle, offline fallbacks and the cached-pages query,
//! written against the store in `swcache-core` and a pluggable network.

pub mod clients;
pub mod engine;
pub mod fallback;
pub mod fetch;
pub mod lifecycle;
pub mod pending;
pub mod query;
pub mod router;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use clients::{ClientHost, ClientInfo, LocalClients};
pub use engine::{Engine, FetchEvent};
pub use fetch::{FetchClient, FetchConfig, Network};
pub use lifecycle::{Activation, LifecycleState};
pub use pending::PendingWork;
pub use query::{Message, MessageEvent, Reply, ReplyPort};
pub use router::{Bypass, Route, Router};
