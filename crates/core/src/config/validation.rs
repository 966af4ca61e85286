//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, ConfigSnapshot, Strategy};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `origin` is not an http(s) URL
    /// - the snapshot is invalid (see [`ConfigSnapshot::validate`])
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") => {}
            Ok(origin) => {
                return Err(ConfigError::Invalid {
                    field: "origin".into(),
                    reason: format!("unsupported scheme: {}", origin.scheme()),
                });
            }
            Err(e) => return Err(ConfigError::Invalid { field: "origin".into(), reason: e.to_string() }),
        }

        self.snapshot.validate()
    }
}

impl ConfigSnapshot {
    /// Validate the engine snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - an explicit `version` is empty or contains whitespace
    /// - a precache entry is not an absolute path
    /// - a rule pattern does not compile or a rule uses `destruct`
    /// - a rule has an empty `cacheName`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(version) = &self.version
            && (version.is_empty() || version.chars().any(char::is_whitespace))
        {
            return Err(ConfigError::Invalid {
                field: "snapshot.version".into(),
                reason: "must be non-empty and contain no whitespace".into(),
            });
        }

        if let Some(path) = self.precache.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid {
                field: "snapshot.precache".into(),
                reason: format!("entry '{path}' must be an absolute path"),
            });
        }

        for (i, rule) in self.rules.iter().enumerate() {
            if let Err(e) = regex::Regex::new(&rule.url_pattern) {
                return Err(ConfigError::Invalid { field: format!("snapshot.rules[{i}].urlPattern"), reason: e.to_string() });
            }
            if rule.strategy == Some(Strategy::Destruct) {
                return Err(ConfigError::Invalid {
                    field: format!("snapshot.rules[{i}].strategy"),
                    reason: "destruct is only valid as defaultStrategy".into(),
                });
            }
            if rule.cache_name.is_empty() {
                return Err(ConfigError::Invalid {
                    field: format!("snapshot.rules[{i}].cacheName"),
                    reason: "must not be empty".into(),
                });
            }
        }

        if let Some(fallback) = &self.offline_fallback
            && !self.is_precached(fallback)
        {
            tracing::warn!(
                offline_fallback = %fallback,
                "offlineFallback is not in precache; it is only served once cached at runtime"
            );
        }

        Ok(())
    }
}
