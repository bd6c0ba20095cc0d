//! Error types for page fetching and caching.

use std::error::Error as _;
use thiserror::Error;

/// Failures that abort a fetch instead of truncating it.
///
/// Network-level problems never surface here; they end the crawl with a
/// [`TruncationReason`](super::TruncationReason) instead.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to read cached page {page} at '{path}': {source}")]
    CacheRead {
        page: u32,
        path: String,
        source: opendal::Error,
    },

    #[error("Cached page {page} at '{path}' is not a valid record batch: {source}")]
    CorruptCache {
        page: u32,
        path: String,
        source: serde_json::Error,
    },

    #[error("Failed to write page {page} to cache at '{path}': {source}")]
    CacheWrite {
        page: u32,
        path: String,
        source: opendal::Error,
    },

    #[error("Failed to serialize page {page} for caching: {source}")]
    Serialize {
        page: u32,
        source: serde_json::Error,
    },
}

/// Connection-level failure talking to the remote API.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest's Display hides the underlying io error; walk the chain.
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        Self { message }
    }
}
