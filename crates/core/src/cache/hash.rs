//! Content-addressed keys for stored requests and derived version tags.

use sha2::{Digest, Sha256};

use crate::config::ConfigSnapshot;

/// Length of a derived version tag in hex characters.
const VERSION_LEN: usize = 16;

/// Compute the key a request is stored under inside a partition.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derive a version tag from the snapshot options and its precache list.
///
/// Any explicit `version` is ignored so the tag only depends on what the
/// engine would actually do.
pub fn compute_version(snapshot: &ConfigSnapshot) -> String {
    let options = ConfigSnapshot { version: None, ..snapshot.clone() };

    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_string(&options).unwrap_or_default().as_bytes());
    hasher.update(serde_json::to_string(&options.precache).unwrap_or_default().as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(VERSION_LEN);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let key1 = compute_cache_key("GET", "https://example.com/");
        let key2 = compute_cache_key("GET", "https://example.com/");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_different_method() {
        let get = compute_cache_key("GET", "https://example.com/");
        let head = compute_cache_key("HEAD", "https://example.com/");
        assert_ne!(get, head);
    }

    #[test]
    fn test_key_format() {
        let key = compute_cache_key("GET", "https://example.com/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_version_format() {
        let version = compute_version(&ConfigSnapshot::default());
        assert_eq!(version.len(), VERSION_LEN);
        assert!(version.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_version_ignores_explicit_version() {
        let a = ConfigSnapshot::default();
        let b = ConfigSnapshot { version: Some("manual".into()), ..Default::default() };
        assert_eq!(compute_version(&a), compute_version(&b));
    }

    #[test]
    fn test_version_tracks_options() {
        let a = ConfigSnapshot::default();
        let b = ConfigSnapshot { offline_fallback: Some("/offline".into()), ..Default::default() };
        assert_ne!(compute_version(&a), compute_version(&b));
    }
}
