//! MCP tool implementations.
//!
//! This module contains all tools exposed by the swcache server.

pub mod fetch;
pub mod message;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use fetch::{SwFetchOutput, SwFetchParams};
pub use message::{SwMessageOutput, SwMessageParams};
pub use status::SwStatusOutput;
