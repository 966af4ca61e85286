//! The configuration snapshot an engine instance is built from.

use serde::{Deserialize, Serialize};

use crate::cache::hash::compute_version;

/// Grey placeholder shown in place of images that could not be loaded.
pub const DEFAULT_OFFLINE_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 200 200"><path fill="rgba(0,0,0,.2)" d="M0 0h200v200H0z"/><path fill="none" stroke="rgba(0,0,0,.8)" stroke-linecap="round" stroke-linejoin="round" stroke-width="2" d="M98.11 92.46A15 15 0 0 1 100 90a10 10 0 0 1 9.31 13.64m-5.75-.08A14.5 14.5 0 0 1 100 110a10 10 0 0 1-7.07-17.07M103.9 98.23A14.5 14.5 0 0 0 100 90a10 10 0 0 0-3.64.69m9.3 9.31H110m-2.93 7.07A10 10 0 0 1 100 110a14.5 14.5 0 0 1-3.56-13.55M90 100h10M90 90l20 20"/></svg>"#;

/// Caching strategy applied to a routed request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    CacheFirst,
    #[default]
    NetworkFirst,
    StaleWhileRevalidate,
    NetworkOnly,
    /// Kill switch: the engine unregisters itself and reloads its clients.
    Destruct,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cacheFirst",
            Strategy::NetworkFirst => "networkFirst",
            Strategy::StaleWhileRevalidate => "staleWhileRevalidate",
            Strategy::NetworkOnly => "networkOnly",
            Strategy::Destruct => "destruct",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A runtime caching rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Regular expression tested against the full request URL.
    pub url_pattern: String,

    /// Strategy to apply; the snapshot's default strategy when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,

    /// Partition prefix the strategy reads and writes.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,
}

impl Rule {
    pub fn new(url_pattern: impl Into<String>, strategy: Strategy, cache_name: impl Into<String>) -> Self {
        Self { url_pattern: url_pattern.into(), strategy: Some(strategy), cache_name: cache_name.into() }
    }
}

fn default_cache_name() -> String {
    "site".into()
}

/// Immutable configuration handed to the engine at startup.
///
/// Serialized with camelCase keys so the same document can be shared with
/// the script that registers the engine on the host page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    /// Partition suffix. Derived from the rest of the snapshot when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// When false, nothing is intercepted and the store is never touched.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Absolute paths stored in the core partition at install.
    #[serde(default)]
    pub precache: Vec<String>,

    /// Runtime rules, first match wins.
    #[serde(default = "default_rules")]
    pub rules: Vec<Rule>,

    #[serde(default)]
    pub default_strategy: Strategy,

    /// Precached page served when a navigation fails.
    #[serde(default)]
    pub offline_fallback: Option<String>,

    /// SVG markup served when an image request fails.
    #[serde(default = "default_offline_image")]
    pub offline_image: String,

    /// Admin interface slug excluded from interception.
    #[serde(default = "default_panel_path")]
    pub panel_path: String,

    /// Emit per-request diagnostics.
    #[serde(default)]
    pub debug: bool,
}

fn default_true() -> bool {
    true
}

fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(r"\.(png|jpg|jpeg|svg|webp|avif|woff|woff2|eot|ttf|otf)$", Strategy::CacheFirst, "images"),
        Rule::new(r"\.(js|css)$", Strategy::CacheFirst, "assets"),
    ]
}

fn default_offline_image() -> String {
    DEFAULT_OFFLINE_SVG.into()
}

fn default_panel_path() -> String {
    "panel".into()
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            version: None,
            enabled: true,
            precache: Vec::new(),
            rules: default_rules(),
            default_strategy: Strategy::default(),
            offline_fallback: None,
            offline_image: default_offline_image(),
            panel_path: default_panel_path(),
            debug: false,
        }
    }
}

impl ConfigSnapshot {
    /// The explicit version, or one derived from the snapshot contents.
    pub fn resolved_version(&self) -> String {
        match &self.version {
            Some(v) => v.clone(),
            None => compute_version(self),
        }
    }

    /// Admin prefix with exactly one leading slash, e.g. `/panel`.
    pub fn panel_prefix(&self) -> String {
        format!("/{}", self.panel_path.trim_start_matches('/'))
    }

    pub fn is_destruct(&self) -> bool {
        self.default_strategy == Strategy::Destruct
    }

    pub fn is_precached(&self, path: &str) -> bool {
        self.precache.iter().any(|p| p == path)
    }
}
