//! CSS selector helpers over a parsed document
//!
//! Uses the scraper crate. Selection is always scoped to one element and, unlike
//! `ElementRef::select`, includes the scope element itself when it matches.

use scraper::{ElementRef, Html, Selector};

use crate::rules::{OptionSet, INDEX, LIMIT};

/// Parse a selector. A selector that fails to parse behaves as "no match",
/// so the failure is only logged.
pub fn parse_selector(selector: &str, rule: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(rule, selector, error = %e, "invalid CSS selector; treated as no match");
            None
        }
    }
}

/// `<body>` of the document, or the root element when there is none
pub fn body(document: &Html) -> ElementRef<'_> {
    let root = document.root_element();
    root.children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "body")
        .unwrap_or(root)
}

/// The scope itself (if it matches) followed by matching descendants in
/// document order.
pub fn select_scoped<'a>(scope: ElementRef<'a>, selector: &Selector) -> Vec<ElementRef<'a>> {
    let mut found = Vec::new();
    if selector.matches(&scope) {
        found.push(scope);
    }
    found.extend(scope.select(selector));
    found
}

/// Narrow candidates with `index` then `limit`.
///
/// An index outside the candidates leaves them unchanged, and a limit of zero
/// or less means no limit.
pub fn slice<T>(mut candidates: Vec<T>, options: Option<&OptionSet>) -> Vec<T> {
    let Some(options) = options else {
        return candidates;
    };
    if let Some(index) = options.get_int(INDEX) {
        if let Ok(index) = usize::try_from(index) {
            if index < candidates.len() {
                candidates = vec![candidates.swap_remove(index)];
            } else {
                tracing::trace!(index, candidates = candidates.len(), "index out of range; candidates kept");
            }
        }
    }
    if let Some(limit) = options.get_int(LIMIT) {
        if let Ok(limit) = usize::try_from(limit) {
            if limit > 0 {
                candidates.truncate(limit);
            }
        }
    }
    candidates
}

/// Visible text with whitespace runs collapsed to single spaces
pub fn text_of(el: ElementRef<'_>) -> String {
    let raw: String = el.text().collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First attribute in `chain` that has a non-blank value, trimmed
pub fn first_attr(el: ElementRef<'_>, chain: &[&str]) -> Option<String> {
    chain
        .iter()
        .filter_map(|name| el.value().attr(name))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(String::from)
}

/// The anchor a link value is read from: the element itself when it is an
/// `<a>`, otherwise its first `<a>` descendant, otherwise the element.
pub fn link_target(el: ElementRef<'_>) -> ElementRef<'_> {
    if el.value().name() == "a" {
        return el;
    }
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|d| d.value().name() == "a")
        .unwrap_or(el)
}
