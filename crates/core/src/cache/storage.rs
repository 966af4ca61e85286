//! The cache store capability the engine is written against.
//!
//! A store holds named partitions, each mapping a `GET` request to the
//! response recorded for it. Opening a partition is idempotent, so callers
//! never need to hold a partition handle across writers.

use async_trait::async_trait;

use crate::Error;
use crate::request::{CacheRequest, CacheResponse};

/// Prefix of the partition holding the precache set.
pub const CORE_PARTITION: &str = "core";

/// Versioned partition name, e.g. `assets-3f2a91c0`.
pub fn partition_name(prefix: &str, version: &str) -> String {
    format!("{prefix}-{version}")
}

/// Whether a partition belongs to the given version.
pub fn is_current(name: &str, version: &str) -> bool {
    name.strip_suffix(version).is_some_and(|rest| rest.ends_with('-'))
}

/// Whether a partition is the precache partition of some version.
pub fn is_core(name: &str) -> bool {
    name.starts_with("core-")
}

/// Options controlling how a stored request is matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Match regardless of the headers named by the stored response's `Vary`.
    pub ignore_vary: bool,
}

impl MatchOptions {
    /// Options used by the routing strategies.
    pub fn ignoring_vary() -> Self {
        Self { ignore_vary: true }
    }
}

/// A stored request/response pair.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub request: CacheRequest,
    pub response: CacheResponse,
}

/// Key-value store of named request/response partitions.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the partition if it does not exist.
    async fn open(&self, partition: &str) -> Result<(), Error>;

    /// Whether the partition exists.
    async fn has(&self, partition: &str) -> Result<bool, Error>;

    /// Partition names in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a partition and everything in it. Returns false if it did not exist.
    async fn delete(&self, partition: &str) -> Result<bool, Error>;

    /// Store a response for a request, replacing any previous match.
    async fn put(&self, partition: &str, request: &CacheRequest, response: &CacheResponse) -> Result<(), Error>;

    /// Store all pairs or none of them.
    async fn put_all(&self, partition: &str, entries: &[CachedEntry]) -> Result<(), Error>;

    /// First stored response matching the request in one partition.
    async fn lookup(
        &self, partition: &str, request: &CacheRequest, options: MatchOptions,
    ) -> Result<Option<CacheResponse>, Error>;

    /// First stored response matching the request in any partition, in creation order.
    async fn lookup_any(&self, request: &CacheRequest, options: MatchOptions) -> Result<Option<CacheResponse>, Error>;

    /// Every pair stored in the partition, in insertion order.
    async fn entries(&self, partition: &str) -> Result<Vec<CachedEntry>, Error>;
}
