//! Error types
//!
//! Bad rules and bad selectors are not errors: the compiler reports them as
//! diagnostics and the extractor treats them as "no match". What remains here
//! are invariant violations and adapter-level failures.

/// Result type for tvlike operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A tagged value already holds `value` and something tried to set it again
    #[error("'value' key is read-only and cannot be overwritten")]
    ValueOverwrite,

    #[error("invalid base URL {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
