//! Per-field and per-section options
//!
//! An option set keeps its keys in the order they were first written and never
//! lets a later write replace an earlier one.

use serde::Serialize;

pub const ATTR: &str = "attr";
pub const LIMIT: &str = "limit";
pub const INDEX: &str = "index";
pub const TRANSFORM: &str = "transform";
pub const IMG_RATIO: &str = "img-ratio";

/// Key of the wrapped value in a tagged result; never usable as an option.
pub const VALUE: &str = "value";

/// Options consumed during extraction. Everything else is passed through to
/// the output as metadata.
const EXECUTABLE: &[&str] = &[ATTR, LIMIT, INDEX, TRANSFORM];

pub fn is_executable(key: &str) -> bool {
    EXECUTABLE.contains(&key)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Bool(bool),
    List(Vec<String>),
}

impl OptionValue {
    /// Type a raw `key:value` pair. Integer keys that fail to parse yield an
    /// error message and leave the key unset.
    pub fn parse(key: &str, raw: &str) -> Result<OptionValue, String> {
        let raw = unquote(raw.trim());
        match key {
            LIMIT | INDEX => raw
                .parse::<i64>()
                .map(OptionValue::Integer)
                .map_err(|_| format!("option `{}` expects an integer, got `{}`", key, raw)),
            TRANSFORM => Ok(OptionValue::List(
                raw.split('|')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            )),
            _ => Ok(OptionValue::String(raw.to_string())),
        }
    }
}

fn unquote(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    entries: Vec<(String, OptionValue)>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` unless it is already present. Returns whether the value was stored.
    pub fn insert(&mut self, key: impl Into<String>, value: OptionValue) -> bool {
        let key = key.into();
        if self.contains(&key) {
            return false;
        }
        self.entries.push((key, value));
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            OptionValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        match self.get(key)? {
            OptionValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// The `attr` fallback chain, e.g. `data-src|src`
    pub fn attr_chain(&self) -> Option<Vec<&str>> {
        let chain: Vec<&str> = self
            .get_str(ATTR)?
            .split('|')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect();
        if chain.is_empty() {
            None
        } else {
            Some(chain)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Options copied verbatim into extracted output
    pub fn passthrough(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.iter().filter(|(k, _)| !is_executable(k))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
