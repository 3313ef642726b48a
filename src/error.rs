// src/error.rs
// =============================================================================
// Error types for the crawler library.
//
// Only failures that should stop something live here. Per-page outcomes
// (HTTP 404, timeouts, connection resets) are not errors: the fetcher returns
// them as FetchResult variants and the crawl keeps going.
//
// What ends up as a CrawlError:
// - Bad job input (fails the run before any network activity)
// - A 429 loop that used up its retry budget (fails that one fetch)
// - A browser render that failed on every attempt (fails that one render)
// - Filesystem and serialization problems while writing the archive
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// The crawl job itself is unusable (empty storage dir, no valid seeds, ...)
    #[error("invalid crawl job: {0}")]
    InvalidJob(String),

    /// An HTTP verb outside GET/HEAD/POST/PATCH/PUT/DELETE
    #[error("unsupported verb: {0}")]
    UnsupportedVerb(String),

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The server kept answering 429 after every retry
    #[error("max retries reached for {url} after {attempts} attempt(s)")]
    RetriesExhausted { url: String, attempts: u32 },

    #[error("failed to render {url}: {message}")]
    Render { url: String, message: String },

    /// Building a request failed before anything was sent
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrawlError {
    // Attaches the path to an io::Error, used as `.map_err(CrawlError::io(&path))`
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| CrawlError::Io { path, source }
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
