//! tv-like scraping rules for HTML pages
//!
//! Provides a small rule language and an engine that applies it to parsed HTML:
//! - Rule compiler with path-scoped sections, item templates and options
//! - Path selection by glob over the request path
//! - Extraction of text, image and link values into ordered records
//! - Rule lookup from an inline script or a remote hub
//! - FFI interface for C/C++ hosts

pub mod config;
pub mod error;
pub mod extractors;
pub mod ffi;
pub mod page;
pub mod rules;
pub mod source;

pub use config::{Config, HubConfig};
pub use error::{Error, Result};
pub use extractors::{extract, Extracted, Extractor, Item, Record, Tagged};
pub use page::{scrape, scrape_document, scrape_resolved, PageResult};
pub use rules::{compile, Compilation, Diagnostic, DiagnosticKind, Field, RuleNode};
