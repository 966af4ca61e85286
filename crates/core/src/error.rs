//! Unified error types for swcache.
//!
//! Every variant carries a stable code prefix so that failures surfaced over
//! the MCP transport can be matched by clients.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the caching engine and its store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL or path.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// A routing rule pattern failed to compile.
    #[error("INVALID_PATTERN: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A lifecycle step was requested in the wrong state.
    #[error("INVALID_STATE: expected {expected}, found {actual}")]
    InvalidState { expected: String, actual: String },

    /// The request cannot participate in caching (e.g., non-GET put).
    #[error("UNSUPPORTED_REQUEST: {0}")]
    UnsupportedRequest(String),

    /// A precache entry could not be fetched or stored during install.
    #[error("PRECACHE_FAILED: {path}: {reason}")]
    PrecacheFailure { path: String, reason: String },

    /// The network could not produce a response.
    #[error("NETWORK_FAILURE: {0}")]
    Network(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Reading or enumerating the cache store failed.
    #[error("STORE_READ_FAILED: {0}")]
    StoreRead(String),

    /// Writing to the cache store failed.
    #[error("STORE_WRITE_FAILED: {0}")]
    StoreWrite(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Whether this error came from the network layer.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::FetchTooLarge(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::InvalidPattern { .. } => (-32602, err.to_string()),
            Error::InvalidState { .. } => (-32013, err.to_string()),
            Error::UnsupportedRequest(msg) => (-32014, msg.clone()),
            Error::PrecacheFailure { .. } => (-32015, err.to_string()),
            Error::Network(msg) => (-32008, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::StoreRead(msg) => (-32001, msg.clone()),
            Error::StoreWrite(msg) => (-32001, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PrecacheFailure { path: "/app.css".to_string(), reason: "status 404".to_string() };
        assert!(err.to_string().contains("PRECACHE_FAILED"));
        assert!(err.to_string().contains("/app.css"));
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::StoreRead("keys".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32001);
    }

    #[test]
    fn test_is_network() {
        assert!(Error::Network("offline".into()).is_network());
        assert!(Error::FetchTooLarge("big".into()).is_network());
        assert!(!Error::StoreWrite("disk".into()).is_network());
    }
}
