//! Runtime configuration
//!
//! Every field has a default so a config can be built from an empty JSON
//! object, which is how the FFI layer receives it.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_HUB: &str = "https://hub.tvai.tv/";
pub const DEFAULT_INLINE_SCRIPT: &str = r#"script[type="text/plain"][name="tv-like"]"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Base for the `url-join` transform
    pub base_url: Option<String>,
    pub hub: HubConfig,
    /// Element holding rules embedded in the page itself
    pub inline_script_selector: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            hub: HubConfig::default(),
            inline_script_selector: DEFAULT_INLINE_SCRIPT.to_string(),
        }
    }
}

impl Config {
    /// Parse the configured base URL, if any.
    pub fn parsed_base_url(&self) -> Result<Option<Url>> {
        match self.base_url.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Url::parse(raw)
                .map(Some)
                .map_err(|source| Error::InvalidBaseUrl {
                    url: raw.to_string(),
                    source,
                }),
        }
    }
}

/// Where remote rule files live and how to fetch them
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HubConfig {
    pub base: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_HUB.to_string(),
            timeout_secs: 30,
            user_agent: "Mozilla/5.0".to_string(),
        }
    }
}

impl HubConfig {
    /// Hub base with exactly one trailing slash
    pub fn normalized_base(&self) -> String {
        let base = self.base.trim();
        if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.hub.timeout_secs, 30);
        assert_eq!(config.inline_script_selector, DEFAULT_INLINE_SCRIPT);
    }

    #[test]
    fn test_kebab_case_keys() {
        let config: Config = serde_json::from_str(
            r#"{"base-url": "https://example.com/", "hub": {"base": "https://rules.test", "timeout-secs": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://example.com/"));
        assert_eq!(config.hub.timeout_secs, 5);
        assert_eq!(config.hub.user_agent, "Mozilla/5.0");
        assert_eq!(config.hub.normalized_base(), "https://rules.test/");
    }

    #[test]
    fn test_base_url_parsing() {
        let mut config = Config::default();
        assert!(config.parsed_base_url().unwrap().is_none());

        config.base_url = Some("https://example.com/vod/".to_string());
        let base = config.parsed_base_url().unwrap().unwrap();
        assert_eq!(base.as_str(), "https://example.com/vod/");

        config.base_url = Some("not a url".to_string());
        assert!(matches!(
            config.parsed_base_url(),
            Err(Error::InvalidBaseUrl { .. })
        ));
    }
}
