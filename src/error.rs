//! Error taxonomy for the scrape pipeline, the stores and the HTTP surface.
//!
//! Every fallible operation in the crate returns [`ScrapeError`]. The variant
//! decides how a failure is reported:
//!
//! | Variant | Raised by | HTTP status |
//! |---------|-----------|-------------|
//! | [`ScrapeError::Network`] | fetch (connect, timeout, non-success status) | 502 |
//! | [`ScrapeError::Parse`] | fetch body / DOM parse | 502 |
//! | [`ScrapeError::Persistence`] | store reads and writes | 500 |
//! | [`ScrapeError::NotFound`] | lookups by id, singleton user | 404 |
//! | [`ScrapeError::InvalidId`] | malformed ids in paths | 400 |
//! | [`ScrapeError::InvalidBody`] | unreadable request bodies | 400 |
//! | [`ScrapeError::Config`] | invalid selectors or client setup | 500 |

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("network error: {0}")]
    Network(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ScrapeError {
    /// Short machine-readable name, used as the `error` field of JSON bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Network(_) => "network",
            ScrapeError::Parse(_) => "parse",
            ScrapeError::Persistence(_) => "persistence",
            ScrapeError::NotFound(_) => "not_found",
            ScrapeError::InvalidId(_) => "invalid_id",
            ScrapeError::InvalidBody(_) => "invalid_body",
            ScrapeError::Config(_) => "config",
        }
    }

    /// Whether retrying the same fetch could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScrapeError::Network(_))
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(e: reqwest::Error) -> Self {
        ScrapeError::Network(e.to_string())
    }
}

impl From<sled::Error> for ScrapeError {
    fn from(e: sled::Error) -> Self {
        ScrapeError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(e: serde_json::Error) -> Self {
        ScrapeError::Persistence(format!("document encoding: {e}"))
    }
}

impl From<uuid::Error> for ScrapeError {
    fn from(e: uuid::Error) -> Self {
        ScrapeError::InvalidId(e.to_string())
    }
}
