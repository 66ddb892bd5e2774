//! Where rule text comes from
//!
//! A page may embed its own rules in an inline script element. Otherwise rules
//! are looked up on a hub, trying several paths derived from the site's host.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use scraper::Html;
use url::Url;

use crate::config::{Config, HubConfig};
use crate::error::{Error, Result};
use crate::extractors::parse_selector;

/// Hub responses are cached for this long
const CACHE_TTL: Duration = Duration::from_secs(3600);

/// Rules embedded in the page, with character references unescaped and line
/// endings normalized. `None` when the element is missing or blank.
pub fn inline_rules(document: &Html, selector: &str) -> Option<String> {
    let selector = parse_selector(selector, "inline-script")?;
    let script = document.select(&selector).next()?;
    let raw: String = script.text().collect();
    let rules = raw
        .replace("&#10;", "\n")
        .replace("&#13;", "\r")
        .replace("\r\n", "\n")
        .replace('\r', "\n");
    if rules.trim().is_empty() {
        None
    } else {
        Some(rules)
    }
}

/// Lowercased host of a site given as a URL or a bare host, port removed.
pub fn site_host(site: &str) -> Option<String> {
    let site = site.trim();
    if let Ok(url) = Url::parse(site) {
        if let Some(host) = url.host_str() {
            return Some(host.to_ascii_lowercase());
        }
    }
    let authority = site.split(['/', '?', '#']).next()?;
    let host = match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => authority,
    };
    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}

/// `m.example.com` -> `com/example/m`
pub fn domain_to_path(host: &str) -> String {
    host.split('.').rev().collect::<Vec<_>>().join("/")
}

/// Hub resource names to try for a host, in order, without duplicates.
pub fn hub_candidates(host: &str) -> Vec<String> {
    let path = domain_to_path(host);
    let mut candidates = vec![host.to_string()];
    if let Some(bare) = host.strip_prefix("www.") {
        candidates.push(bare.to_string());
    }
    if let Some(bare) = path.strip_suffix("/www") {
        candidates.push(path.clone());
        candidates.push(bare.to_string());
    } else {
        candidates.push(path);
    }

    let mut unique: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !candidate.is_empty() && !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

/// Fetches rule text by URL
pub trait RuleFetcher {
    /// `Ok(None)` when the resource does not exist.
    fn fetch(&self, url: &str) -> Result<Option<String>>;
}

/// Try every hub candidate for `host`; the first non-blank body wins.
pub fn fetch_from_hub(fetcher: &dyn RuleFetcher, hub_base: &str, host: &str) -> Option<String> {
    for candidate in hub_candidates(host) {
        let url = format!("{}{}.dsl", hub_base, candidate);
        match fetcher.fetch(&url) {
            Ok(Some(text)) if !text.trim().is_empty() => {
                tracing::debug!(url = %url, "rules found on hub");
                return Some(text);
            }
            Ok(_) => tracing::debug!(url = %url, "no rules at hub candidate"),
            Err(e) => tracing::warn!(url = %url, error = %e, "hub fetch failed"),
        }
    }
    None
}

/// Rules for a page: the inline script first, then the hub.
pub fn resolve_rules(
    document: &Html,
    site: &str,
    config: &Config,
    fetcher: &dyn RuleFetcher,
) -> Option<String> {
    if let Some(rules) = inline_rules(document, &config.inline_script_selector) {
        tracing::debug!("using inline rules");
        return Some(rules);
    }
    let host = site_host(site)?;
    fetch_from_hub(fetcher, &config.hub.normalized_base(), &host)
}

#[derive(Debug)]
struct CachedRules {
    rules: Option<String>,
    fetched_at: Instant,
}

/// Blocking hub client. Responses, including misses, are cached per URL.
pub struct HubClient {
    agent: ureq::Agent,
    cache: RwLock<HashMap<String, CachedRules>>,
}

impl HubClient {
    pub fn new(config: &HubConfig) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::Agent::config_builder()
                .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
                .user_agent(config.user_agent.as_str())
                .build(),
        );
        Self {
            agent,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, url: &str) -> Result<Option<String>> {
        match self.agent.get(url).header("Accept", "text/plain").call() {
            Ok(resp) if resp.status().is_success() => resp
                .into_body()
                .read_to_string()
                .map(Some)
                .map_err(|e| Error::Fetch {
                    url: url.to_string(),
                    message: e.to_string(),
                }),
            Ok(_) | Err(ureq::Error::StatusCode(_)) => Ok(None),
            Err(e) => Err(Error::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

impl RuleFetcher for HubClient {
    fn fetch(&self, url: &str) -> Result<Option<String>> {
        if let Ok(cache) = self.cache.read() {
            if let Some(cached) = cache.get(url) {
                if cached.fetched_at.elapsed() < CACHE_TTL {
                    return Ok(cached.rules.clone());
                }
            }
        }

        // transport errors are not cached so the next page retries
        let rules = self.get(url)?;
        self.store(url, rules.clone());
        Ok(rules)
    }
}

impl HubClient {
    /// Cache a response, dropping entries that have outlived the TTL.
    fn store(&self, url: &str, rules: Option<String>) {
        if let Ok(mut cache) = self.cache.write() {
            let before = cache.len();
            cache.retain(|_, cached| cached.fetched_at.elapsed() < CACHE_TTL);
            if cache.len() < before {
                tracing::debug!(evicted = before - cache.len(), "expired hub responses dropped");
            }
            cache.insert(
                url.to_string(),
                CachedRules {
                    rules,
                    fetched_at: Instant::now(),
                },
            );
        }
    }
}
