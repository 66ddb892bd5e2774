//! FFI interface for C/C++ hosts
//!
//! Provides C-compatible functions for scraping HTML with tv-like rules.
//! Requests and results cross the boundary as JSON.

use std::collections::HashMap;
use std::ffi::{c_char, CStr, CString};
use std::hash::Hash;
use std::ptr;
use std::sync::{Arc, Mutex, OnceLock};

use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::config::{Config, HubConfig};
use crate::error::{Error, Result};
use crate::page::{scrape_document, scrape_resolved, PageResult};
use crate::rules::{compile, Diagnostic};
use crate::source::HubClient;

/// Request for `tvlike_extract`
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeRequest {
    /// Page URL; selects the path scope and is the default `url-join` base
    pub url: String,
    /// Rule text. When absent the page's inline rules are used, then the hub.
    #[serde(default)]
    pub dsl: Option<String>,
    #[serde(default)]
    pub config: Config,
}

/// Result struct returned to the host
/// Both pointers are owned by Rust and must be freed via tvlike_free_result
#[repr(C)]
pub struct TvLikeResultFFI {
    /// JSON-serialized result (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message if the call failed (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Scrape HTML according to the request.
///
/// # Arguments
/// * `html_ptr` - Pointer to HTML content (UTF-8, not necessarily null-terminated)
/// * `html_len` - Length of HTML content in bytes
/// * `request_json` - JSON-serialized ScrapeRequest (null-terminated)
///
/// # Returns
/// TvLikeResultFFI with json_ptr set to a serialized PageResult on success,
/// or error_ptr set on failure
///
/// # Safety
/// - `html_ptr` must point to valid memory of at least `html_len` bytes
/// - `request_json` must be a valid null-terminated C string
/// - Caller must free the result via `tvlike_free_result`
#[no_mangle]
pub unsafe extern "C" fn tvlike_extract(
    html_ptr: *const c_char,
    html_len: usize,
    request_json: *const c_char,
) -> TvLikeResultFFI {
    let html = match read_html(html_ptr, html_len) {
        Ok(html) => html,
        Err(e) => return make_error_result(&e.to_string()),
    };

    let request_str = match read_c_str(request_json, "Request JSON") {
        Ok(s) => s,
        Err(e) => return make_error_result(&e.to_string()),
    };

    let request: ScrapeRequest = match serde_json::from_str(request_str) {
        Ok(r) => r,
        Err(e) => {
            return make_error_result(&format!("Failed to parse request JSON: {}", e));
        }
    };

    match perform_scrape(&html, &request) {
        Ok(result) => make_json_result(&result),
        Err(e) => make_error_result(&e.to_string()),
    }
}

/// Summary of compiled rules, for rule authors
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct RulesCheck {
    page_type: Option<String>,
    scopes: Vec<ScopeSummary>,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Serialize)]
struct ScopeSummary {
    pattern: String,
    sections: Vec<String>,
}

/// Compile rule text without scraping and report what was understood.
///
/// # Safety
/// - `dsl` must be a valid null-terminated C string
/// - Caller must free the result via `tvlike_free_result`
#[no_mangle]
pub unsafe extern "C" fn tvlike_check_rules(dsl: *const c_char) -> TvLikeResultFFI {
    let dsl = match read_c_str(dsl, "Rule text") {
        Ok(s) => s,
        Err(e) => return make_error_result(&e.to_string()),
    };

    let compilation = compile(dsl);
    let check = RulesCheck {
        page_type: compilation.page_type,
        scopes: compilation
            .scopes
            .iter()
            .map(|scope| ScopeSummary {
                pattern: scope.pattern().to_string(),
                sections: scope.rules().iter().map(|r| r.name().to_string()).collect(),
            })
            .collect(),
        diagnostics: compilation.diagnostics,
    };
    make_json_result(&check)
}

/// Free a TvLikeResultFFI returned by this module
///
/// # Safety
/// - `result` must have been returned by `tvlike_extract` or `tvlike_check_rules`
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn tvlike_free_result(result: TvLikeResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

unsafe fn read_html(html_ptr: *const c_char, html_len: usize) -> Result<String> {
    if html_ptr.is_null() || html_len == 0 {
        return Ok(String::new());
    }
    let slice = std::slice::from_raw_parts(html_ptr as *const u8, html_len);
    std::str::from_utf8(slice)
        .map(String::from)
        .map_err(|_| Error::InvalidRequest("Invalid UTF-8 in HTML content".into()))
}

unsafe fn read_c_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(Error::InvalidRequest(format!("{} is null", what)));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| Error::InvalidRequest(format!("Invalid UTF-8 in {}", what)))
}

fn make_json_result<T: Serialize>(value: &T) -> TvLikeResultFFI {
    match serde_json::to_string(value) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => TvLikeResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&format!("Failed to serialize result: {}", e)),
    }
}

// Helper to create error result
fn make_error_result(msg: &str) -> TvLikeResultFFI {
    let error_cstr = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    TvLikeResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: error_cstr.into_raw(),
    }
}

/// Distinct hub configurations kept alive at once
const MAX_HUB_CLIENTS: usize = 16;

/// Hub clients live for the whole process so their response caches are
/// shared across calls.
fn hub_client(config: &HubConfig) -> Arc<HubClient> {
    static CLIENTS: OnceLock<Mutex<HashMap<HubConfig, Arc<HubClient>>>> = OnceLock::new();
    let clients = CLIENTS.get_or_init(|| Mutex::new(HashMap::new()));
    match clients.lock() {
        Ok(mut clients) => pooled(&mut clients, config, MAX_HUB_CLIENTS, || HubClient::new(config)),
        Err(_) => Arc::new(HubClient::new(config)),
    }
}

/// Shared value for `key`. A full pool is emptied before a new key goes in;
/// callers still holding an evicted `Arc` keep using it.
fn pooled<K, V>(
    pool: &mut HashMap<K, Arc<V>>,
    key: &K,
    cap: usize,
    make: impl FnOnce() -> V,
) -> Arc<V>
where
    K: Eq + Hash + Clone,
{
    if let Some(value) = pool.get(key) {
        return Arc::clone(value);
    }
    if pool.len() >= cap {
        tracing::debug!(evicted = pool.len(), "hub client pool full; cleared");
        pool.clear();
    }
    let value = Arc::new(make());
    pool.insert(key.clone(), Arc::clone(&value));
    value
}

fn perform_scrape(html: &str, request: &ScrapeRequest) -> Result<PageResult> {
    let document = Html::parse_document(html);
    match request.dsl.as_deref() {
        Some(dsl) if !dsl.trim().is_empty() => {
            scrape_document(&document, &request.url, dsl, &request.config)
        }
        _ => {
            let hub = hub_client(&request.config.hub);
            scrape_resolved(&document, &request.url, &request.config, hub.as_ref())
        }
    }
}
