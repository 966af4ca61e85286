//! SQLite-backed store of versioned cache partitions.
//!
//! This module provides the persistent request/response store the engine
//! reads and writes, using SQLite with async access via tokio-rusqlite. It
//! supports:
//!
//! - Named partitions created lazily and deleted as a unit
//! - Content-addressed entry keys using SHA-256 hashing
//! - `Vary`-aware or `Vary`-agnostic lookups
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod partitions;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use storage::{CORE_PARTITION, CacheStorage, CachedEntry, MatchOptions, is_core, is_current, partition_name};
