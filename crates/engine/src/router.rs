//! Routing decision for intercepted requests.
//!
//! Rules are compiled once and scanned in declaration order; the first
//! pattern matching the full URL wins. Requests no rule claims fall back to
//! the navigation default, the media bypass, or the `site` catch-all.

use regex::Regex;
use swcache_core::{CacheRequest, ConfigSnapshot, Error, Strategy};

/// Partition prefix used for navigations no rule matched.
pub const PAGES_PARTITION: &str = "pages";

/// Partition prefix used by the catch-all.
pub const SITE_PARTITION: &str = "site";

/// Fixed API prefix that is never intercepted.
pub const API_PREFIX: &str = "/api";

/// Why a request is left to native handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bypass {
    /// Interception is turned off (disabled or destruct mode).
    Disabled,
    /// Only `GET` participates in caching.
    NotGet,
    /// Admin or API path.
    Excluded,
}

/// Outcome of routing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted.
    Bypass(Bypass),
    /// Audio/video: network only, never cached.
    Media,
    /// Resolve through a strategy against `<cache_name>-<version>`.
    Cached { strategy: Strategy, cache_name: String, rule: Option<usize> },
}

#[derive(Debug)]
struct CompiledRule {
    pattern: Regex,
    strategy: Option<Strategy>,
    cache_name: String,
}

/// Compiled routing table.
#[derive(Debug)]
pub struct Router {
    rules: Vec<CompiledRule>,
    default_strategy: Strategy,
    panel_prefix: String,
    intercepting: bool,
}

impl Router {
    /// Compile the snapshot's rules.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` for the first rule whose pattern does not compile.
    pub fn new(snapshot: &ConfigSnapshot) -> Result<Self, Error> {
        let rules = snapshot
            .rules
            .iter()
            .map(|rule| {
                let pattern = Regex::new(&rule.url_pattern)
                    .map_err(|e| Error::InvalidPattern { pattern: rule.url_pattern.clone(), reason: e.to_string() })?;
                Ok(CompiledRule { pattern, strategy: rule.strategy, cache_name: rule.cache_name.clone() })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self {
            rules,
            default_strategy: snapshot.default_strategy,
            panel_prefix: snapshot.panel_prefix(),
            intercepting: snapshot.enabled && !snapshot.is_destruct(),
        })
    }

    pub fn route(&self, request: &CacheRequest) -> Route {
        if !self.intercepting {
            return Route::Bypass(Bypass::Disabled);
        }

        if !request.is_get() {
            return Route::Bypass(Bypass::NotGet);
        }

        let path = request.path();
        if path.starts_with(&self.panel_prefix) || path.starts_with(API_PREFIX) {
            return Route::Bypass(Bypass::Excluded);
        }

        let url = request.url.as_str();
        if let Some((index, rule)) = self.rules.iter().enumerate().find(|(_, r)| r.pattern.is_match(url)) {
            return Route::Cached {
                strategy: rule.strategy.unwrap_or(self.default_strategy),
                cache_name: rule.cache_name.clone(),
                rule: Some(index),
            };
        }

        if request.is_navigation() {
            return Route::Cached { strategy: self.default_strategy, cache_name: PAGES_PARTITION.into(), rule: None };
        }

        if request.destination.is_media() {
            return Route::Media;
        }

        Route::Cached { strategy: Strategy::CacheFirst, cache_name: SITE_PARTITION.into(), rule: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use swcache_core::{Destination, Rule};
    use url::Url;

    fn get(url: &str) -> CacheRequest {
        CacheRequest::parse(url).unwrap()
    }

    fn router(snapshot: ConfigSnapshot) -> Router {
        Router::new(&snapshot).unwrap()
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let router = router(ConfigSnapshot {
            rules: vec![
                Rule::new(r"\.png$", Strategy::CacheFirst, "images"),
                Rule::new(r"\..*$", Strategy::NetworkOnly, "everything"),
            ],
            ..Default::default()
        });

        let route = router.route(&get("https://example.com/a.png"));
        assert_eq!(
            route,
            Route::Cached { strategy: Strategy::CacheFirst, cache_name: "images".into(), rule: Some(0) }
        );

        let route = router.route(&get("https://example.com/a.txt"));
        assert_eq!(
            route,
            Route::Cached { strategy: Strategy::NetworkOnly, cache_name: "everything".into(), rule: Some(1) }
        );
    }

    #[test]
    fn test_rule_without_strategy_uses_default() {
        let router = router(ConfigSnapshot {
            rules: vec![Rule { url_pattern: r"\.json$".into(), strategy: None, cache_name: "data".into() }],
            default_strategy: Strategy::StaleWhileRevalidate,
            ..Default::default()
        });

        let route = router.route(&get("https://example.com/feed.json"));
        assert_eq!(
            route,
            Route::Cached { strategy: Strategy::StaleWhileRevalidate, cache_name: "data".into(), rule: Some(0) }
        );
    }

    #[test]
    fn test_pattern_matches_full_url() {
        let router = router(ConfigSnapshot {
            rules: vec![Rule::new(r"^https://cdn\.example\.com/", Strategy::CacheFirst, "cdn")],
            ..Default::default()
        });

        let route = router.route(&get("https://cdn.example.com/lib.js"));
        assert!(matches!(route, Route::Cached { cache_name, .. } if cache_name == "cdn"));
    }

    #[test]
    fn test_navigation_uses_default_and_pages() {
        let router = router(ConfigSnapshot { default_strategy: Strategy::NetworkFirst, ..Default::default() });
        let request = CacheRequest::navigate(Url::parse("https://example.com/about").unwrap());

        assert_eq!(
            router.route(&request),
            Route::Cached { strategy: Strategy::NetworkFirst, cache_name: PAGES_PARTITION.into(), rule: None }
        );
    }

    #[test]
    fn test_media_bypasses_cache() {
        let router = router(ConfigSnapshot::default());
        let video = get("https://example.com/clip.mp4").with_destination(Destination::Video);
        let audio = get("https://example.com/song.mp3").with_destination(Destination::Audio);

        assert_eq!(router.route(&video), Route::Media);
        assert_eq!(router.route(&audio), Route::Media);
    }

    #[test]
    fn test_catch_all_is_cache_first_site() {
        let router = router(ConfigSnapshot::default());
        assert_eq!(
            router.route(&get("https://example.com/manifest.webmanifest")),
            Route::Cached { strategy: Strategy::CacheFirst, cache_name: SITE_PARTITION.into(), rule: None }
        );
    }

    #[test]
    fn test_non_get_bypassed() {
        let router = router(ConfigSnapshot::default());
        let post = CacheRequest::new(Method::POST, Url::parse("https://example.com/form").unwrap());
        assert_eq!(router.route(&post), Route::Bypass(Bypass::NotGet));
    }

    #[test]
    fn test_admin_and_api_excluded() {
        let router = router(ConfigSnapshot { panel_path: "/panel".into(), ..Default::default() });
        assert_eq!(router.route(&get("https://example.com/panel/pages")), Route::Bypass(Bypass::Excluded));
        assert_eq!(router.route(&get("https://example.com/api/users")), Route::Bypass(Bypass::Excluded));
        assert_eq!(router.route(&get("https://example.com/panel.css")), Route::Bypass(Bypass::Excluded));
    }

    #[test]
    fn test_exclusion_precedes_rules() {
        let router = router(ConfigSnapshot {
            rules: vec![Rule::new(r"\.js$", Strategy::CacheFirst, "assets")],
            ..Default::default()
        });
        assert_eq!(router.route(&get("https://example.com/api/client.js")), Route::Bypass(Bypass::Excluded));
    }

    #[test]
    fn test_disabled_and_destruct_bypass_everything() {
        let disabled = router(ConfigSnapshot { enabled: false, ..Default::default() });
        let destruct = router(ConfigSnapshot { default_strategy: Strategy::Destruct, ..Default::default() });
        let request = get("https://example.com/app.css");

        assert_eq!(disabled.route(&request), Route::Bypass(Bypass::Disabled));
        assert_eq!(destruct.route(&request), Route::Bypass(Bypass::Disabled));
    }

    #[test]
    fn test_invalid_pattern() {
        let snapshot = ConfigSnapshot { rules: vec![Rule::new("[", Strategy::CacheFirst, "x")], ..Default::default() };
        assert!(matches!(Router::new(&snapshot), Err(Error::InvalidPattern { .. })));
    }
}
