//! One-call scraping of a page
//!
//! Parses the HTML, compiles the rules, selects the scope for the page's path
//! and extracts.

use scraper::Html;
use serde::Serialize;
use url::Url;

use crate::config::Config;
use crate::error::Result;
use crate::extractors::{Extractor, Record};
use crate::rules::{compile, request_path, Diagnostic};
use crate::source::{resolve_rules, RuleFetcher};

/// Page type reported when the rules do not declare one
pub const DEFAULT_PAGE_TYPE: &str = "generic";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PageResult {
    pub page_type: String,
    /// Request path the rules were selected for
    pub path: String,
    pub records: Vec<Record>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn scrape(html: &str, url: &str, dsl: &str, config: &Config) -> Result<PageResult> {
    let document = Html::parse_document(html);
    scrape_document(&document, url, dsl, config)
}

/// Scrape an already parsed document.
///
/// `url-join` resolves against the configured base URL, or the page URL when
/// none is configured.
pub fn scrape_document(
    document: &Html,
    url: &str,
    dsl: &str,
    config: &Config,
) -> Result<PageResult> {
    let base = match config.parsed_base_url()? {
        Some(base) => Some(base),
        None => Url::parse(url).ok(),
    };
    let path = request_path(url);
    let compilation = compile(dsl);
    let records = Extractor::new(compilation.select(&path))
        .with_base_url(base)
        .extract(document)?;

    tracing::debug!(
        path = %path,
        records = records.len(),
        diagnostics = compilation.diagnostics.len(),
        "page scraped"
    );
    Ok(PageResult {
        page_type: compilation
            .page_type
            .unwrap_or_else(|| DEFAULT_PAGE_TYPE.to_string()),
        path,
        records,
        diagnostics: compilation.diagnostics,
    })
}

/// Scrape with rules found in the page itself or on the hub. A page with no
/// rules anywhere yields no records.
pub fn scrape_resolved(
    document: &Html,
    url: &str,
    config: &Config,
    fetcher: &dyn RuleFetcher,
) -> Result<PageResult> {
    let dsl = resolve_rules(document, url, config, fetcher).unwrap_or_else(|| {
        tracing::debug!(url, "no rules found for page");
        String::new()
    });
    scrape_document(document, url, &dsl, config)
}
