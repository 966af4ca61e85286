//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Cache store with SQLite backend
//! - Request/response model
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;

pub use cache::{CacheDb, CacheStorage, CachedEntry, MatchOptions};
pub use config::{AppConfig, ConfigSnapshot, DEFAULT_OFFLINE_SVG, Rule, Strategy};
pub use error::Error;
pub use request::{CacheRequest, CacheResponse, Destination, RequestMode};
